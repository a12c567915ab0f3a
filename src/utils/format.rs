/// Format whole seconds as "MM:SS". Minutes are not wrapped at 60 so a
/// 90 minute focus block renders as "90:00".
pub fn format_clock(total_secs: u64) -> String {
    let m = total_secs / 60;
    let s = total_secs % 60;
    format!("{:02}:{:02}", m, s)
}

/// Format a duration for history listings, e.g. "25m" or "1h 05m".
pub fn format_minutes(total_secs: u64) -> String {
    let minutes = total_secs / 60;
    if minutes >= 60 {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(1_500), "25:00");
        assert_eq!(format_clock(299), "04:59");
        assert_eq!(format_clock(5_400), "90:00");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(59), "0m");
        assert_eq!(format_minutes(1_500), "25m");
        assert_eq!(format_minutes(3_900), "1h 05m");
    }
}
