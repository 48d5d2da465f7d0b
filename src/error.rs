//! Error types for slab and scheduler operations.
//!
//! None of these are fatal: the world logs them and keeps simulating whatever it can.

use thiserror::Error;

use crate::core::soa::ChainKey;
use crate::utils::allocator::BoneId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JiggleError {
    #[error("tier {tier} is full ({limit} chains)")]
    CapacityExceeded { tier: usize, limit: usize },

    #[error("chain has {particles} particles, tier ceiling is {limit}")]
    ChainTooLarge { particles: usize, limit: usize },

    #[error("chain {0} is already admitted")]
    AlreadyAdmitted(ChainKey),

    #[error("chain {0} is not admitted")]
    NotAdmitted(ChainKey),

    #[error("unknown bone {0}")]
    UnknownBone(BoneId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, JiggleError>;
