//! Feedback suppression.
//!
//! The controller owns exactly one [`SuppressionGuard`]. A dispatch borrows it through
//! [`SuppressionGuard::engage`], which raises the flag and hands out a
//! [`SuppressionToken`]; dropping the token lowers the flag again. Because the token
//! holds the guard's only mutable borrow, the flag cannot outlive the dispatch and the
//! controller cannot process another event while it is raised.

/// Single-owner "a synthetic emission is in flight" flag.
#[derive(Debug, Default)]
pub struct SuppressionGuard {
    active: bool,
    engaged: u64,
}

impl SuppressionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` only while a [`SuppressionToken`] is alive.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of dispatches that engaged this guard.
    pub fn engaged_count(&self) -> u64 {
        self.engaged
    }

    /// Raise the flag for the lifetime of the returned token.
    pub fn engage(&mut self) -> SuppressionToken<'_> {
        self.active = true;
        self.engaged += 1;
        SuppressionToken { guard: self }
    }
}

/// Proof that suppression is raised. Passed to every
/// [`EventSink::dispatch`](crate::device::EventSink::dispatch).
#[derive(Debug)]
pub struct SuppressionToken<'a> {
    guard: &'a mut SuppressionGuard,
}

impl SuppressionToken<'_> {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.guard.active
    }
}

impl Drop for SuppressionToken<'_> {
    fn drop(&mut self) {
        self.guard.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_scopes_the_flag() {
        let mut guard = SuppressionGuard::new();
        assert!(!guard.is_active());
        {
            let token = guard.engage();
            assert!(token.is_active());
        }
        assert!(!guard.is_active());
        assert_eq!(guard.engaged_count(), 1);
    }

    #[test]
    fn flag_clears_on_unwind() {
        let mut guard = SuppressionGuard::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _token = guard.engage();
            panic!("sink blew up");
        }));
        assert!(result.is_err());
        assert!(!guard.is_active());
    }
}
