use chrono::{DateTime, FixedOffset, NaiveDateTime, SubsecRound, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const ZONED_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// A HAR date/time value.
///
/// Timestamps read without an offset stay `Local` until they are encoded,
/// at which point the writer's default offset is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Zoned(DateTime<FixedOffset>),
    Local(NaiveDateTime),
}

impl Timestamp {
    /// Current time, truncated to the microsecond precision HAR files carry.
    pub fn now() -> Self {
        Timestamp::Zoned(Utc::now().trunc_subsecs(6).fixed_offset())
    }

    /// Parse any ISO-8601 form HAR producers emit: `Z`, `+HH:MM`, `+HHMM`,
    /// `+HH` or no offset at all. Seconds may be omitted and fractions may
    /// use a decimal comma.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = normalize(text.trim());
        let text = normalized.as_str();

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(Timestamp::Zoned(dt));
        }
        for format in ZONED_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(text, format) {
                return Some(Timestamp::Zoned(dt));
            }
        }
        for format in NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
                return Some(Timestamp::Local(dt));
            }
        }

        None
    }

    /// Parse an HTTP-date such as a cookie's `Expires` attribute.
    pub fn parse_http_date(text: &str) -> Option<Self> {
        DateTime::parse_from_rfc2822(text.trim())
            .ok()
            .map(Timestamp::Zoned)
            .or_else(|| Self::parse(text))
    }

    /// Pin the timestamp to an offset, keeping zoned values as they are.
    pub fn resolve(&self, default_offset: FixedOffset) -> DateTime<FixedOffset> {
        match self {
            Timestamp::Zoned(dt) => *dt,
            Timestamp::Local(naive) => naive
                .and_local_timezone(default_offset)
                .single()
                .unwrap_or_else(|| naive.and_utc().with_timezone(&default_offset)),
        }
    }

    /// ISO-8601 with a numeric offset; fractional seconds only when present.
    pub fn encode(&self, default_offset: FixedOffset) -> String {
        format_zoned(&self.resolve(default_offset))
    }

    pub fn is_zoned(&self) -> bool {
        matches!(self, Timestamp::Zoned(_))
    }
}

/// Rewrite the time part into the shape the chrono formats accept:
/// `HH:MM` gains `:00`, `,` becomes `.`, `Z` and `+HH` gain full offsets.
fn normalize(text: &str) -> String {
    let (Some(date), Some(sep), Some(time)) = (text.get(..10), text.get(10..11), text.get(11..))
    else {
        return text.to_string();
    };
    if sep != "T" && sep != " " {
        return text.to_string();
    }

    let zone_start = time.find(['Z', 'z', '+', '-']).unwrap_or(time.len());
    let (clock, zone) = time.split_at(zone_start);

    let mut out = format!("{}{}{}", date, sep, clock.replace(',', "."));
    if clock.matches(':').count() == 1 {
        out.push_str(":00");
    }
    match zone {
        "Z" | "z" => out.push_str("+00:00"),
        _ if zone.len() == 3 && zone[1..].bytes().all(|b| b.is_ascii_digit()) => {
            out.push_str(zone);
            out.push_str(":00");
        }
        _ => out.push_str(zone),
    }
    out
}

fn format_zoned(dt: &DateTime<FixedOffset>) -> String {
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.6f%:z").to_string()
    }
}

fn format_naive(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Timestamp::Zoned(dt)
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(dt: NaiveDateTime) -> Self {
        Timestamp::Local(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Zoned(dt) => f.write_str(&format_zoned(dt)),
            Timestamp::Local(dt) => f.write_str(&format_naive(dt)),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Timestamp::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", text)))
    }
}
