//! Liveness Tokens
//!
//! Every attach starts a new generation. Work started under an older
//! generation (pump tasks, in-flight fetches and writes) checks its token
//! before touching list state and backs off when it is stale.
//!
//! Renewal and checks both happen under the reconciler's state lock, so once
//! `detach` has returned no stale fold can slip in.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessToken(u64);

#[derive(Debug, Default)]
pub struct Liveness {
    generation: AtomicU64,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> LivenessToken {
        LivenessToken(self.generation.load(Ordering::SeqCst))
    }

    /// Invalidate every outstanding token and hand out a fresh one
    pub fn renew(&self) -> LivenessToken {
        LivenessToken(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_live(&self, token: LivenessToken) -> bool {
        self.current() == token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renew_invalidates() {
        let liveness = Liveness::new();
        let first = liveness.renew();
        assert!(liveness.is_live(first));

        let second = liveness.renew();
        assert!(!liveness.is_live(first));
        assert!(liveness.is_live(second));
        assert_eq!(liveness.current(), second);
    }
}
