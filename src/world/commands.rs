//! Deferred bone registration. Requests are recorded per bone and collapsed, then applied
//! once per frame at the batch point.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::utils::allocator::BoneId;

/// Net pending operation for one bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingOp {
    Add,
    Remove,
    Update,
    /// Bone must end up admitted with fresh parameters, whether or not it is admitted now.
    Refresh,
}

impl PendingOp {
    /// Folds a newer request into this pending one.
    pub fn then(self, next: PendingOp) -> PendingOp {
        use PendingOp::*;
        match (self, next) {
            (_, Remove) => Remove,
            (Remove, Add) => Refresh,
            (Remove, Update) => Remove,
            (Add, Add) => Add,
            (Update, Update) => Update,
            (Add, Update) | (Update, Add) => Refresh,
            (Refresh, _) => Refresh,
            (Add | Remove | Update, Refresh) => Refresh,
        }
    }
}

/// Pending operations keyed by bone, flushed in handle order.
#[derive(Debug, Default, Clone)]
pub struct CommandQueue {
    pending: BTreeMap<BoneId, PendingOp>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bone: BoneId, op: PendingOp) {
        let merged = match self.pending.get(&bone) {
            Some(&pending) => pending.then(op),
            None => op,
        };
        self.pending.insert(bone, merged);
    }

    pub fn pending(&self, bone: BoneId) -> Option<PendingOp> {
        self.pending.get(&bone).copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> Vec<(BoneId, PendingOp)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Cloneable handle for queueing requests from other threads.
#[derive(Debug, Clone)]
pub struct CommandSender {
    queue: Arc<Mutex<CommandQueue>>,
}

impl CommandSender {
    pub(crate) fn new(queue: Arc<Mutex<CommandQueue>>) -> Self {
        Self { queue }
    }

    pub fn add(&self, bone: BoneId) {
        self.queue.lock().push(bone, PendingOp::Add);
    }

    pub fn remove(&self, bone: BoneId) {
        self.queue.lock().push(bone, PendingOp::Remove);
    }

    pub fn update(&self, bone: BoneId) {
        self.queue.lock().push(bone, PendingOp::Update);
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}
