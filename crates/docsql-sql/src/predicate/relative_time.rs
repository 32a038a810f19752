//! Relative time expressions: `"in 2 days"`, `"3 hours ago"`, `"now"`.

use chrono::{DateTime, Duration, Utc};

/// Resolves a relative time expression against `now`.
///
/// Returns a human-readable reason on failure.
pub fn relative_time_to_date(text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let text = text.to_lowercase();
    let mut parts: Vec<&str> = text.split(' ').filter(|part| !part.is_empty()).collect();

    let future = parts.first() == Some(&"in");
    let past = parts.last() == Some(&"ago");

    if !future && !past && text != "now" {
        return Err("Time should either start with 'in' or end with 'ago'".to_string());
    }
    if future && past {
        return Err("Time cannot have both 'in' and 'ago'".to_string());
    }

    if future {
        parts.remove(0);
    } else {
        parts.pop();
    }

    if parts.len() % 2 != 0 {
        return Err("Invalid time string. Dangling unit or number.".to_string());
    }

    let mut seconds: i64 = 0;
    for pair in parts.chunks(2) {
        let (num, interval) = (pair[0], pair[1]);
        let Ok(value) = num.parse::<i64>() else {
            return Err(format!("'{num}' is not an integer."));
        };

        let unit = match interval {
            "yr" | "yrs" | "year" | "years" => 31_536_000,
            "wk" | "wks" | "week" | "weeks" => 604_800,
            "d" | "day" | "days" => 86_400,
            "hr" | "hrs" | "hour" | "hours" => 3_600,
            "min" | "mins" | "minute" | "minutes" => 60,
            "sec" | "secs" | "second" | "seconds" => 1,
            _ => return Err(format!("Invalid interval: '{interval}'")),
        };
        seconds += value * unit;
    }

    let offset = Duration::seconds(seconds);
    Ok(if future {
        now + offset
    } else if past {
        now - offset
    } else {
        now
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn future_and_past() {
        assert_eq!(
            relative_time_to_date("in 2 days 3 hours", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 3, 15, 0, 0).unwrap()
        );
        assert_eq!(
            relative_time_to_date("1 week ago", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 25, 12, 0, 0).unwrap()
        );
        assert_eq!(relative_time_to_date("NOW", now()).unwrap(), now());
    }

    #[test]
    fn malformed() {
        assert_eq!(
            relative_time_to_date("2 days", now()).unwrap_err(),
            "Time should either start with 'in' or end with 'ago'"
        );
        assert_eq!(
            relative_time_to_date("in 2 days ago", now()).unwrap_err(),
            "Time cannot have both 'in' and 'ago'"
        );
        assert_eq!(
            relative_time_to_date("in 2", now()).unwrap_err(),
            "Invalid time string. Dangling unit or number."
        );
        assert_eq!(
            relative_time_to_date("in 1.5 days", now()).unwrap_err(),
            "'1.5' is not an integer."
        );
        assert_eq!(
            relative_time_to_date("in 3 fortnights", now()).unwrap_err(),
            "Invalid interval: 'fortnights'"
        );
    }
}
