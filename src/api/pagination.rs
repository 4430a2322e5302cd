use serde::Serialize;

/// Hard ceiling for the exam, attempt and review-queue listings.
pub(crate) const MAX_LIMIT: i64 = 1000;

pub(crate) const fn default_limit() -> i64 {
    100
}

/// Normalizes raw skip/limit query values: negative skips floor at zero,
/// limits stay within `1..=MAX_LIMIT`.
pub(crate) fn window(skip: i64, limit: i64) -> (i64, i64) {
    (skip.max(0), limit.clamp(1, MAX_LIMIT))
}

#[derive(Debug, Serialize)]
pub(crate) struct PaginatedResponse<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total_count: i64,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_clamps_out_of_range_values() {
        assert_eq!(window(-5, 0), (0, 1));
        assert_eq!(window(20, 100), (20, 100));
        assert_eq!(window(0, 100_000), (0, MAX_LIMIT));
    }

    #[test]
    fn default_limit_is_within_the_window() {
        let (_, limit) = window(0, default_limit());
        assert_eq!(limit, default_limit());
    }
}
