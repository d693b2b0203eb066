/// Classification for retry policy.
///
/// Used by adapters (retry loop) and the provider manager (fallback and
/// health bookkeeping) to decide how to react to an error.
///
/// # Behavior Summary
///
/// | Class | Retried by adapter? | Try next provider? | Health penalty? |
/// |-------|---------------------|--------------------|-----------------|
/// | `Never` | No | No | No |
/// | `WithBackoff` | Yes, until attempts run out | Yes | Yes |
/// | `FailoverWithPenalty` | No | Yes | Yes |
/// | `NextProvider` | No | Yes | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Terminal for this request. Retrying or failing over won't help.
    Never,

    /// Transient failure (network, timeout, 429, 5xx).
    ///
    /// Retried in place with exponential backoff. Once attempts are
    /// exhausted the failure counts against the provider's health and the
    /// manager moves on to the next provider.
    WithBackoff,

    /// The provider answered but the answer is unusable (4xx, bad payload).
    /// Not retried; counts against health and fails over.
    FailoverWithPenalty,

    /// The provider can't serve this request at all (unsupported category).
    /// Fail over without recording any penalty.
    NextProvider,
}

impl RetryClass {
    /// Whether the provider manager should record a health failure.
    pub fn penalizes_provider(&self) -> bool {
        matches!(self, RetryClass::WithBackoff | RetryClass::FailoverWithPenalty)
    }
}
