use time::{Duration, PrimitiveDateTime};

/// Outcome of checking a quiz's scheduled window at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowState {
    Open,
    /// start_time is unset; the quiz is deferred until the educator schedules it.
    NotScheduled,
    NotStarted,
    Ended,
}

/// The window is re-evaluated on every start and submit call rather than
/// captured at enrollment time, because a deferred quiz can be scheduled or
/// rescheduled after students have already enrolled.
pub(crate) fn check(
    now: PrimitiveDateTime,
    start_time: Option<PrimitiveDateTime>,
    duration_minutes: i32,
) -> WindowState {
    let Some(start) = start_time else {
        return WindowState::NotScheduled;
    };

    if now < start {
        return WindowState::NotStarted;
    }

    let end = start + Duration::minutes(i64::from(duration_minutes));
    if now > end {
        return WindowState::Ended;
    }

    WindowState::Open
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Month, Time};

    fn at(hour: u8, minute: u8, second: u8) -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, Month::March, 10).unwrap();
        PrimitiveDateTime::new(date, Time::from_hms(hour, minute, second).unwrap())
    }

    #[test]
    fn unscheduled_quiz_is_not_open() {
        assert_eq!(check(at(12, 0, 0), None, 60), WindowState::NotScheduled);
    }

    #[test]
    fn window_boundaries_are_inclusive() {
        let start = at(12, 0, 0);

        assert_eq!(check(start - Duration::milliseconds(1), Some(start), 60), WindowState::NotStarted);
        assert_eq!(check(start, Some(start), 60), WindowState::Open);
        assert_eq!(
            check(start + Duration::minutes(60) - Duration::milliseconds(1), Some(start), 60),
            WindowState::Open
        );
        assert_eq!(check(start + Duration::minutes(60), Some(start), 60), WindowState::Open);
        assert_eq!(
            check(start + Duration::minutes(60) + Duration::milliseconds(1), Some(start), 60),
            WindowState::Ended
        );
    }

    #[test]
    fn long_past_window_reports_ended() {
        let start = at(8, 0, 0);
        assert_eq!(check(at(23, 30, 0), Some(start), 30), WindowState::Ended);
    }
}
