use revtrail_database::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// `part / total` with a zero denominator giving `0.0`
pub fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// `part / total * 100` with a zero denominator giving `0.0`
pub fn percentage(part: usize, total: usize) -> f64 {
    ratio(part, total) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_denominators() {
        assert_eq!(ratio(3, 0), 0.0);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(ratio(1, 4), 0.25);
        assert_eq!(percentage(1, 4), 25.0);
    }
}
