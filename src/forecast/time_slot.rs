use time::Time;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const SLOT_START_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");

/// Start of a time-slot label such as "05:00-06:00" or "5:00".
///
/// Labels that do not parse fall back to midnight. Nothing is logged for
/// them, so a malformed label silently sorts first.
pub fn parse_slot_start(label: &str) -> Time {
    let start = label.split('-').next().unwrap_or_default().trim();
    let padded;
    let start = if start.len() == 4 {
        padded = format!("0{start}");
        padded.as_str()
    } else {
        start
    };
    Time::parse(start, SLOT_START_FORMAT).unwrap_or(Time::MIDNIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::time;

    #[test]
    fn range_label_uses_start_time() {
        assert_eq!(parse_slot_start("05:00-06:00"), time!(5:00));
        assert_eq!(parse_slot_start("17:30 - 18:30"), time!(17:30));
    }

    #[test]
    fn single_digit_hour_is_zero_padded() {
        assert_eq!(parse_slot_start("5:00-6:00"), time!(5:00));
        assert_eq!(parse_slot_start("9:15"), time!(9:15));
    }

    #[test]
    fn malformed_labels_fall_back_to_midnight() {
        assert_eq!(parse_slot_start("TOTAL"), Time::MIDNIGHT);
        assert_eq!(parse_slot_start(""), Time::MIDNIGHT);
        assert_eq!(parse_slot_start("25:00-26:00"), Time::MIDNIGHT);
        assert_eq!(parse_slot_start("05:00:00"), Time::MIDNIGHT);
    }
}
