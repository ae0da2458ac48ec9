use chrono::FixedOffset;

/// Per-call locale context supplied by the caller of the mapping engine.
///
/// Carries the caller's language (consumed by failure resolution) and target
/// timezone (applied to `Time` values during mapping). With no timezone, no
/// conversion takes place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleContext {
    /// Preferred language tag, e.g. `"en"` or `"de-CH"`.
    pub language: Option<String>,
    /// Target UTC offset for `Time` field values.
    pub timezone: Option<FixedOffset>,
}

impl LocaleContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub const fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = Some(timezone);
        self
    }
}

/// Parses a UTC offset such as `"+02:00"`, `"-0530"`, `"+3"`, `"Z"` or `"UTC"`.
///
/// Returns `None` for anything else, including offsets of a day or more.
#[must_use]
pub fn parse_offset(text: &str) -> Option<FixedOffset> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(hours) || !digits(minutes) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes >= 60 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_offset_spellings() {
        let two = FixedOffset::east_opt(7200);
        assert_eq!(parse_offset("+02:00"), two);
        assert_eq!(parse_offset("+0200"), two);
        assert_eq!(parse_offset("+2"), two);
        assert_eq!(parse_offset("-05:30"), FixedOffset::west_opt(5 * 3600 + 1800));
        assert_eq!(parse_offset("Z"), FixedOffset::east_opt(0));
        assert_eq!(parse_offset("utc"), FixedOffset::east_opt(0));
    }

    #[test]
    fn rejects_malformed_offsets() {
        assert_eq!(parse_offset(""), None);
        assert_eq!(parse_offset("02:00"), None);
        assert_eq!(parse_offset("+02:75"), None);
        assert_eq!(parse_offset("+25:00"), None);
        assert_eq!(parse_offset("+ab"), None);
        assert_eq!(parse_offset("+24"), None);
        assert_eq!(parse_offset("+999999"), None);
        assert_eq!(parse_offset("+1193046"), None);
        assert_eq!(parse_offset("-99999999999"), None);
    }

    #[test]
    fn builder_sets_fields() {
        let ctx = LocaleContext::new()
            .with_language("de")
            .with_timezone(FixedOffset::east_opt(3600).unwrap());
        assert_eq!(ctx.language.as_deref(), Some("de"));
        assert_eq!(ctx.timezone.map(|tz| tz.local_minus_utc()), Some(3600));
    }
}
