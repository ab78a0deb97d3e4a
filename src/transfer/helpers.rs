/// Retry configuration for batch operations
pub(crate) mod retry_config {
    use std::time::Duration;

    /// Calculate retry delay with exponential backoff
    ///
    /// # Arguments
    /// * `attempt` - The retry attempt number (0-based)
    /// * `initial` - Initial delay duration
    /// * `max` - Maximum delay duration
    ///
    /// # Returns
    /// Duration to wait before retrying
    pub(crate) fn retry_delay(attempt: usize, initial: Duration, max: Duration) -> Duration {
        let factor = u32::try_from(attempt)
            .ok()
            .and_then(|exp| 2u64.checked_pow(exp))
            .unwrap_or(u64::MAX);
        let initial_ms = u64::try_from(initial.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);

        Duration::from_millis(initial_ms.saturating_mul(factor).min(max_ms))
    }

}
