use chrono::{NaiveDate, NaiveTime};

/// Normalise an admin-entered date to a [`NaiveDate`].
///
/// Dates arrive in `MM/DD/YYYY` or ISO form depending on which admin
/// screen wrote them; both must reduce to the same canonical value
/// before any window comparison. This is part of the clock's contract,
/// not incidental parsing.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%m/%d/%Y") {
        return Some(date);
    }
    // ISO datetimes ("2026-03-15T00:00:00.000Z") normalise via their date prefix.
    let prefix = trimmed.split('T').next()?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Parse an `HH:MM` (or `HH:MM:SS`) time of day.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .ok()
}

/// Default voting start time of day when neither source specifies one.
pub fn default_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).expect("valid constant time")
}

/// Default voting end time of day when neither source specifies one.
pub fn default_end_time() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).expect("valid constant time")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_formats_normalize_to_the_same_date() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(normalize_date("2026-03-15"), Some(expected));
        assert_eq!(normalize_date("03/15/2026"), Some(expected));
        assert_eq!(normalize_date(" 03/15/2026 "), Some(expected));
    }

    #[test]
    fn iso_datetime_normalizes_via_its_date() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(normalize_date("2026-03-15T00:00:00.000Z"), Some(expected));
    }

    #[test]
    fn garbage_dates_are_rejected() {
        assert_eq!(normalize_date("15/03/2026"), None); // no month 15
        assert_eq!(normalize_date("soon"), None);
        assert_eq!(normalize_date(""), None);
    }

    #[test]
    fn times_parse_with_and_without_seconds() {
        let expected = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        assert_eq!(parse_time("08:30"), Some(expected));
        assert_eq!(parse_time("08:30:00"), Some(expected));
        assert_eq!(parse_time("8 am"), None);
    }

    #[test]
    fn default_window_times() {
        assert_eq!(default_start_time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(default_end_time(), NaiveTime::from_hms_opt(17, 0, 0).unwrap());
    }
}
