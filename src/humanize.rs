//! Pure presentation formatting: IEC byte counts, snapshot recency,
//! ratio/percentage strings. No state, no I/O.

use chrono::{DateTime, Utc};

const UNIT: f64 = 1024.0;

/// Renders a byte count in IEC units, e.g. `999 B`, `1.00 KiB`, `635.09 GiB`.
pub fn human_bytes(bytes: u64) -> String {
    if (bytes as f64) < UNIT {
        return format!("{bytes} B");
    }
    let exp = ((bytes as f64).ln() / UNIT.ln()) as u32;
    let prefix = b"KMGTPE"[(exp - 1) as usize] as char;
    let value = bytes as f64 / UNIT.powi(exp as i32);
    format!("{value:.2} {prefix}iB")
}

/// Renders how long ago `then` was, relative to `now`.
///
/// Under a minute is "just now", under an hour whole minutes, under a day
/// hours to one decimal, anything older an absolute date. The epoch zero
/// timestamp takes the absolute-date branch like any other old timestamp.
pub fn human_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - then).num_seconds();
    if elapsed < 60 {
        "just now".to_owned()
    } else if elapsed < 3600 {
        format!("{} min ago", elapsed / 60)
    } else if elapsed < 86_400 {
        format!("{:.1} h ago", elapsed as f64 / 3600.0)
    } else {
        then.format("%Y-%m-%d %H:%M").to_string()
    }
}

pub fn human_ratio(ratio: f64) -> String {
    format!("{ratio:.2}")
}

pub fn human_percent(percent: f64) -> String {
    format!("{percent:.2}%")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn bytes_below_one_kib_stay_integral() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(999), "999 B");
        assert_eq!(human_bytes(1023), "1023 B");
    }

    #[test]
    fn bytes_scale_through_iec_units() {
        assert_eq!(human_bytes(1024), "1.00 KiB");
        assert_eq!(human_bytes(1536), "1.50 KiB");
        assert_eq!(human_bytes(1024 * 1024), "1.00 MiB");
        assert_eq!(human_bytes(681_918_411_961), "635.09 GiB");
        assert_eq!(human_bytes(1 << 40), "1.00 TiB");
    }

    #[test]
    fn age_boundaries() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        assert_eq!(human_age(now - chrono::Duration::seconds(30), now), "just now");
        assert_eq!(
            human_age(now - chrono::Duration::minutes(15), now),
            "15 min ago"
        );
        assert_eq!(
            human_age(now - chrono::Duration::minutes(2 * 60 + 18), now),
            "2.3 h ago"
        );
        assert_eq!(
            human_age(now - chrono::Duration::hours(30), now),
            "2024-05-31 06:00"
        );
    }

    #[test]
    fn epoch_renders_as_absolute_date() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(human_age(DateTime::UNIX_EPOCH, now), "1970-01-01 00:00");
    }

    #[test]
    fn ratio_and_percent_are_two_decimal() {
        assert_eq!(human_ratio(1.3333), "1.33");
        assert_eq!(human_percent(24.5), "24.50%");
        assert_eq!(human_percent(0.0), "0.00%");
    }
}
