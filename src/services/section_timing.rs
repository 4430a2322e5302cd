use time::{Duration, PrimitiveDateTime};

/// Deadline for a section opened at `start_time`. Sections with a
/// non-positive duration are untimed and never expire.
pub(crate) fn deadline_for(
    start_time: PrimitiveDateTime,
    duration_minutes: i32,
) -> Option<PrimitiveDateTime> {
    if duration_minutes <= 0 {
        return None;
    }

    Some(start_time + Duration::minutes(duration_minutes as i64))
}

pub(crate) fn is_expired(now: PrimitiveDateTime, end_time: Option<PrimitiveDateTime>) -> bool {
    match end_time {
        Some(deadline) => now > deadline,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Time};

    fn at(hour: u8, minute: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, time::Month::March, 10).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, minute, 0).unwrap())
    }

    #[test]
    fn deadline_adds_duration() {
        assert_eq!(deadline_for(at(10, 0), 45), Some(at(10, 45)));
    }

    #[test]
    fn non_positive_duration_means_untimed() {
        assert_eq!(deadline_for(at(10, 0), 0), None);
        assert_eq!(deadline_for(at(10, 0), -5), None);
        assert!(!is_expired(at(23, 59), None));
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let deadline = Some(at(10, 45));
        assert!(!is_expired(at(10, 44), deadline));
        assert!(!is_expired(at(10, 45), deadline));
        assert!(is_expired(at(10, 46), deadline));
    }
}
