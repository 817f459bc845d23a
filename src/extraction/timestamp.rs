use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};

/// Best-effort timestamp recovery from the front of a log line.
///
/// Gateway logs mix RFC3339 prefixes with classic syslog `Mon dd HH:MM:SS`
/// stamps that carry no year. Syslog stamps are resolved against the current
/// year; a stamp that would land in the future (log rotated over new year) is
/// pulled back one year.
pub fn parse_line_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let trimmed = line.trim_start();

    // RFC3339 / ISO prefix, e.g. "2024-03-01T12:30:00Z" or with offset
    if let Some(token) = trimmed.split_whitespace().next() {
        if let Ok(ts) = DateTime::parse_from_rfc3339(token) {
            return Some(ts.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S") {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Some(head) = trimmed.get(..19) {
        if let Ok(naive) = NaiveDateTime::parse_from_str(head, "%Y-%m-%d %H:%M:%S") {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    // Syslog prefix, e.g. "Mar  1 12:30:00"
    if let Some(head) = trimmed.get(..15) {
        let now = Utc::now();
        let candidate = format!("{} {}", now.year(), head);
        if let Ok(naive) = NaiveDateTime::parse_from_str(&candidate, "%Y %b %e %H:%M:%S") {
            let ts = Utc.from_utc_datetime(&naive);
            if ts > now + chrono::Duration::days(1) {
                let last_year = format!("{} {}", now.year() - 1, head);
                if let Ok(naive) = NaiveDateTime::parse_from_str(&last_year, "%Y %b %e %H:%M:%S") {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            return Some(ts);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_rfc3339_prefix() {
        let ts = parse_line_timestamp("2024-03-01T12:30:00Z some message").unwrap();
        assert_eq!(ts.hour(), 12);
        assert_eq!(ts.minute(), 30);
    }

    #[test]
    fn parses_space_separated_iso() {
        let ts = parse_line_timestamp("2024-03-01 12:30:00 some message").unwrap();
        assert_eq!(ts.hour(), 12);
    }

    #[test]
    fn parses_syslog_prefix() {
        let ts = parse_line_timestamp("Mar  1 12:30:00 gateway kernel: ...").unwrap();
        assert_eq!(ts.hour(), 12);
        assert_eq!(ts.second(), 0);
    }

    #[test]
    fn garbage_yields_none() {
        assert!(parse_line_timestamp("no timestamp here").is_none());
        assert!(parse_line_timestamp("").is_none());
    }
}
