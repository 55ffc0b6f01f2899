/// `m:ss`, minutes unbounded.  Fractions of a second are dropped; negative
/// input counts as zero.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Server durations are milliseconds.
pub fn format_millis(millis: u64) -> String {
    format_duration((millis / 1000) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(125.0), "2:05");
        assert_eq!(format_duration(59.0), "0:59");
        assert_eq!(format_duration(3600.0), "60:00");
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(61.9), "1:01");
        assert_eq!(format_duration(-3.0), "0:00");
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(185_999), "3:05");
    }
}
