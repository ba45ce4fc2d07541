/// Formats a track length for display: `03m 05s`, or `1h 02m 03s` past an hour.
pub fn format_duration_ms(ms: u64) -> String {
    let total = (ms / 1000) % (24 * 3600);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else {
        format!("{:02}m {:02}s", minutes, seconds)
    }
}

/// Parses the ISO-8601 durations the YouTube Data API returns (`PT1H2M3S`,
/// `P1DT4M`) into milliseconds.
pub fn parse_iso8601_duration(input: &str) -> Option<u64> {
    let rest = input.strip_prefix('P')?;
    let mut total_secs: u64 = 0;
    let mut number = String::new();
    let mut in_time = false;
    let mut seen_unit = false;

    for c in rest.chars() {
        match c {
            'T' if !in_time && number.is_empty() => in_time = true,
            '0'..='9' => number.push(c),
            unit => {
                let value: u64 = number.parse().ok()?;
                number.clear();
                let scale = match (unit, in_time) {
                    ('W', false) => 7 * 24 * 3600,
                    ('D', false) => 24 * 3600,
                    ('H', true) => 3600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                total_secs = total_secs.checked_add(value.checked_mul(scale)?)?;
                seen_unit = true;
            }
        }
    }

    if !number.is_empty() || !seen_unit {
        return None;
    }
    total_secs.checked_mul(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_duration_ms(0), "00m 00s");
        assert_eq!(format_duration_ms(30_000), "00m 30s");
        assert_eq!(format_duration_ms(185_999), "03m 05s");
    }

    #[test]
    fn formats_hours() {
        assert_eq!(format_duration_ms(3_723_000), "1h 02m 03s");
    }

    #[test]
    fn parses_youtube_durations() {
        assert_eq!(parse_iso8601_duration("PT3M5S"), Some(185_000));
        assert_eq!(parse_iso8601_duration("PT1H"), Some(3_600_000));
        assert_eq!(parse_iso8601_duration("PT45S"), Some(45_000));
        assert_eq!(parse_iso8601_duration("P1DT1M"), Some(86_460_000));
        assert_eq!(parse_iso8601_duration("P0D"), Some(0));
    }

    #[test]
    fn rejects_malformed_durations() {
        for input in ["", "P", "PT", "3M5S", "PT5", "PT5X", "PM5"] {
            assert_eq!(parse_iso8601_duration(input), None, "{input}");
        }
    }
}
