use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

/// Timestamps are stored timezone-less and always mean UTC.
pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// Generation job timestamps are stored as unix seconds; render them as
/// RFC 3339 for API responses.
pub(crate) fn format_unix_seconds(value: i64) -> String {
    match OffsetDateTime::from_unix_timestamp(value) {
        Ok(ts) => ts.format(&Rfc3339).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Time};

    #[test]
    fn format_primitive_outputs_utc_z() {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        let time = Time::from_hms(10, 20, 30).unwrap();
        let value = PrimitiveDateTime::new(date, time);
        assert_eq!(format_primitive(value), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn format_unix_seconds_renders_rfc3339() {
        assert_eq!(format_unix_seconds(1735814430), "2025-01-02T10:40:30Z");
    }

    #[test]
    fn format_unix_seconds_tolerates_out_of_range() {
        assert_eq!(format_unix_seconds(i64::MAX), i64::MAX.to_string());
    }
}
