//! Frame-id replay cache.
//!
//! A fixed-capacity, insertion-ordered set of recently seen frame ids. It
//! serves double duty: suppressing re-processing of flooded frames that
//! loop back, and steering fresh id generation away from values that are
//! still in circulation.

use std::collections::{HashSet, VecDeque};

use rand::Rng;
use weft_core::FrameId;

pub struct FrameIdCache {
    order: VecDeque<FrameId>,
    seen: HashSet<FrameId>,
    capacity: usize,
}

impl FrameIdCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay cache capacity must be positive");
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub fn contains(&self, id: FrameId) -> bool {
        self.seen.contains(&id)
    }

    /// Record an id. Returns `false` if it was already present, in which
    /// case the carrying frame is a replay and must be dropped.
    pub fn insert(&mut self, id: FrameId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    /// Generate a fresh id that does not collide with anything currently
    /// cached, and record it so our own flood is ignored when it loops
    /// back.
    pub fn generate(&mut self, rng: &mut impl Rng) -> FrameId {
        loop {
            let candidate = FrameId::new(rng.gen());
            if self.insert(candidate) {
                return candidate;
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
