//! Timestamp formatting utilities.

use std::time::Duration;

/// Format a duration as `HH:MM:SS`, truncating sub-second precision.
///
/// Hours are not wrapped at 24, so long streams keep increasing.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use ytx_models::timestamp::format_hms;
/// assert_eq!(format_hms(Duration::from_millis(3_723_500)), "01:02:03");
/// ```
pub fn format_hms(offset: Duration) -> String {
    let total = offset.as_secs();
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Convert fractional seconds from an upstream payload to whole milliseconds.
///
/// Negative and non-finite inputs clamp to zero.
pub fn seconds_to_millis(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(Duration::ZERO), "00:00:00");
        assert_eq!(format_hms(Duration::from_secs(59)), "00:00:59");
        assert_eq!(format_hms(Duration::from_secs(3600)), "01:00:00");
        assert_eq!(format_hms(Duration::from_secs(100 * 3600 + 61)), "100:01:01");
    }

    #[test]
    fn test_seconds_to_millis() {
        assert_eq!(seconds_to_millis(1.2345), 1235);
        assert_eq!(seconds_to_millis(-3.0), 0);
        assert_eq!(seconds_to_millis(f64::NAN), 0);
    }
}
