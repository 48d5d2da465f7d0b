//! Keyframed response curves used to shape per-particle coefficients along a chain.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    Constant,
    Linear,
    #[default]
    Hermite,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
    pub in_tangent: f32,
    pub out_tangent: f32,
    /// Interpolation used for the segment leaving this key.
    pub interpolation: Interpolation,
}

impl CurveKey {
    pub const fn new(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
            interpolation: Interpolation::Hermite,
        }
    }

    pub const fn with_tangents(mut self, in_tangent: f32, out_tangent: f32) -> Self {
        self.in_tangent = in_tangent;
        self.out_tangent = out_tangent;
        self
    }

    pub const fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }
}

/// Curve sampled at a particle's normalized distance from its chain root.
///
/// Evaluation clamps to the first/last key outside the keyed range. An empty curve is
/// treated as absent by callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseCurve {
    keys: Vec<CurveKey>,
}

impl ResponseCurve {
    /// Builds a curve from keys in any order.
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.retain(|k| k.time.is_finite() && k.value.is_finite());
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    pub fn constant(value: f32) -> Self {
        Self::new(vec![CurveKey::new(0.0, value)])
    }

    /// Straight line from `(0, start)` to `(1, end)`.
    pub fn linear(start: f32, end: f32) -> Self {
        Self::new(vec![
            CurveKey::new(0.0, start).with_interpolation(Interpolation::Linear),
            CurveKey::new(1.0, end).with_interpolation(Interpolation::Linear),
        ])
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 1.0;
        };
        if t <= first.time {
            return first.value;
        }

        let i = self
            .keys
            .partition_point(|k| k.time <= t)
            .saturating_sub(1);
        if i >= self.keys.len() - 1 {
            return self.keys[self.keys.len() - 1].value;
        }

        evaluate_segment(&self.keys[i], &self.keys[i + 1], t)
    }
}

fn evaluate_segment(start: &CurveKey, end: &CurveKey, t: f32) -> f32 {
    let dt = end.time - start.time;
    if dt <= f32::EPSILON {
        return end.value;
    }
    let u = (t - start.time) / dt;

    match start.interpolation {
        Interpolation::Constant => start.value,
        Interpolation::Linear => start.value + (end.value - start.value) * u,
        Interpolation::Hermite => {
            let u2 = u * u;
            let u3 = u2 * u;
            let h00 = 2.0 * u3 - 3.0 * u2 + 1.0;
            let h10 = u3 - 2.0 * u2 + u;
            let h01 = -2.0 * u3 + 3.0 * u2;
            let h11 = u3 - u2;
            h00 * start.value
                + h10 * dt * start.out_tangent
                + h01 * end.value
                + h11 * dt * end.in_tangent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn empty_curve_is_identity_multiplier() {
        assert_eq!(ResponseCurve::default().evaluate(0.3), 1.0);
    }

    #[test]
    fn linear_curve_interpolates_and_clamps() {
        let curve = ResponseCurve::linear(1.0, 0.0);
        assert_abs_diff_eq!(curve.evaluate(0.25), 0.75, epsilon = 1e-6);
        assert_eq!(curve.evaluate(-1.0), 1.0);
        assert_eq!(curve.evaluate(2.0), 0.0);
    }

    #[test]
    fn hermite_with_flat_tangents_eases_between_keys() {
        let curve = ResponseCurve::new(vec![CurveKey::new(1.0, 2.0), CurveKey::new(0.0, 0.0)]);
        assert_abs_diff_eq!(curve.evaluate(0.5), 1.0, epsilon = 1e-6);
        assert!(curve.evaluate(0.1) < 0.2);
    }

    #[test]
    fn matching_tangents_reproduce_a_line() {
        let curve = ResponseCurve::new(vec![
            CurveKey::new(0.0, 0.0).with_tangents(1.0, 1.0),
            CurveKey::new(1.0, 1.0).with_tangents(1.0, 1.0),
        ]);
        assert_abs_diff_eq!(curve.evaluate(0.3), 0.3, epsilon = 1e-5);
    }
}
