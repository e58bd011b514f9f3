//! The bounded-transparent-retry policy for read-only operations (§5).

/// How many times a read-only operation re-runs its transaction after a
/// `ConflictRetryable` before giving up and surfacing the error. Writes
/// never consult this: every write-side conflict is surfaced immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}
