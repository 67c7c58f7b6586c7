//! Raw field → metric family mapping
//!
//! Providers disagree on field names (`followers.total` vs `followerCount` vs
//! `stats.followers`) and on value formats (`12000`, `"12,000"`, `"12K"`). A
//! [`FieldTable`] lists, for each snapshot slot, the candidate paths in
//! priority order. The first candidate that is present, non-null, and
//! convertible wins. Unconvertible values are skipped, never coerced to zero.
//!
//! Built-in profiles cover the two provider shapes in use; TOML rows extend
//! them without code changes.

use super::RawRecord;
use crate::partial::{FieldSlot, PartialSnapshot};
use chartpulse_common::config::FieldRowConfig;
use chartpulse_common::{MetricFamily, SignalKind, SocialSignal};
use serde_json::Value;
use tracing::debug;

/// Social platform key used by the short-video profile
pub const SHORT_VIDEO_PLATFORM: &str = "shortvideo";

/// One mapping row
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub slot: FieldSlot,
    /// Variant produced for social slots
    pub kind: SignalKind,
    /// Dotted paths, highest priority first
    pub candidates: Vec<String>,
}

/// Ordered mapping rows for one provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTable {
    rules: Vec<FieldRule>,
}

struct ProfileRow {
    family: MetricFamily,
    key: Option<&'static str>,
    kind: SignalKind,
    candidates: &'static [&'static str],
}

const STREAMING_PROFILE: &[ProfileRow] = &[
    ProfileRow {
        family: MetricFamily::Popularity,
        key: None,
        kind: SignalKind::Count,
        candidates: &["popularity", "stats.popularity", "artist.popularity"],
    },
    ProfileRow {
        family: MetricFamily::Followers,
        key: None,
        kind: SignalKind::Count,
        candidates: &["followers.total", "followers", "followerCount", "stats.followers"],
    },
    ProfileRow {
        family: MetricFamily::Genres,
        key: None,
        kind: SignalKind::Count,
        candidates: &["genres", "artist.genres", "genre"],
    },
    ProfileRow {
        family: MetricFamily::AudioFeatures,
        key: None,
        kind: SignalKind::Count,
        candidates: &["audioFeatures", "audio_features"],
    },
];

const SHORT_VIDEO_PROFILE: &[ProfileRow] = &[
    ProfileRow {
        family: MetricFamily::SocialMentions,
        key: Some(SHORT_VIDEO_PLATFORM),
        kind: SignalKind::Count,
        candidates: &[
            "stats.videoCount",
            "authorStats.videoCount",
            "videoCount",
            "video_count",
        ],
    },
    ProfileRow {
        family: MetricFamily::SocialMentions,
        key: Some("shortvideo_followers"),
        kind: SignalKind::Count,
        candidates: &["authorStats.followerCount", "stats.followerCount", "fans"],
    },
    ProfileRow {
        family: MetricFamily::SocialMentions,
        key: Some("shortvideo_growth"),
        kind: SignalKind::PercentChange,
        candidates: &["stats.weeklyGrowthPct", "growth.weekly"],
    },
];

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table by name (`streaming`, `short_video`)
    pub fn profile(name: &str) -> Option<Self> {
        let rows = match name {
            "streaming" => STREAMING_PROFILE,
            "short_video" => SHORT_VIDEO_PROFILE,
            _ => return None,
        };

        let rules = rows
            .iter()
            .map(|row| FieldRule {
                slot: FieldSlot {
                    family: row.family,
                    key: row.key.map(str::to_string),
                },
                kind: row.kind,
                candidates: row.candidates.iter().map(|c| c.to_string()).collect(),
            })
            .collect();
        Some(Self { rules })
    }

    /// Build from an optional profile plus TOML rows appended after it
    pub fn from_config(profile: Option<&str>, rows: &[FieldRowConfig]) -> Result<Self, String> {
        let mut table = match profile {
            Some(name) => {
                Self::profile(name).ok_or_else(|| format!("unknown field profile '{}'", name))?
            }
            None => Self::new(),
        };

        for row in rows {
            table.push(rule_from_config(row)?);
        }

        if table.is_empty() {
            return Err("field table is empty (set `profile` or add `fields` rows)".to_string());
        }
        Ok(table)
    }

    pub fn push(&mut self, rule: FieldRule) {
        self.rules.push(rule);
    }

    pub fn extend(&mut self, other: FieldTable) {
        self.rules.extend(other.rules);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Distinct slots this table can fill, in row order
    pub fn slots(&self) -> Vec<FieldSlot> {
        let mut slots: Vec<FieldSlot> = Vec::new();
        for rule in &self.rules {
            if !slots.contains(&rule.slot) {
                slots.push(rule.slot.clone());
            }
        }
        slots
    }

    /// Extract every slot from `record`; first row yielding a value wins per slot
    pub fn normalize(&self, record: &RawRecord) -> PartialSnapshot {
        let mut partial = PartialSnapshot::default();

        for rule in &self.rules {
            let Some((path, value)) = first_converted(record, rule) else {
                continue;
            };
            debug!(slot = %rule.slot, path = %path, "Field mapped");

            match (rule.slot.family, rule.slot.key.as_deref(), value) {
                (MetricFamily::Popularity, _, Converted::Popularity(p)) => {
                    partial.popularity.get_or_insert(p);
                }
                (MetricFamily::Followers, _, Converted::Count(n)) => {
                    partial.followers.get_or_insert(n);
                }
                (MetricFamily::Genres, _, Converted::Genres(genres)) => {
                    if partial.genres.is_empty() {
                        partial.genres = genres.into_iter().collect();
                    }
                }
                (MetricFamily::AudioFeatures, Some(key), Converted::Number(v)) => {
                    partial.audio_features.entry(key.to_string()).or_insert(v);
                }
                (MetricFamily::AudioFeatures, None, Converted::NumberMap(map)) => {
                    for (name, v) in map {
                        partial.audio_features.entry(name).or_insert(v);
                    }
                }
                (MetricFamily::SocialMentions, Some(key), Converted::Signal(signal)) => {
                    partial
                        .social_mentions
                        .entry(key.to_string())
                        .or_insert(signal);
                }
                _ => {}
            }
        }

        partial
    }
}

fn rule_from_config(row: &FieldRowConfig) -> Result<FieldRule, String> {
    if row.candidates.is_empty() {
        return Err(format!("field row for {} has no candidates", row.family));
    }

    let key = row.key.as_ref().map(|k| k.trim().to_string());
    match (row.family, &key) {
        (MetricFamily::SocialMentions, None) => {
            return Err("social_mentions rows need a platform `key`".to_string());
        }
        (MetricFamily::Popularity | MetricFamily::Followers | MetricFamily::Genres, Some(_)) => {
            return Err(format!("{} rows take no `key`", row.family));
        }
        (_, Some(k)) if k.is_empty() => {
            return Err(format!("{} row has an empty `key`", row.family));
        }
        _ => {}
    }

    Ok(FieldRule {
        slot: FieldSlot {
            family: row.family,
            key,
        },
        kind: row.kind.unwrap_or_default(),
        candidates: row.candidates.clone(),
    })
}

/// Value converted to the slot's target type
enum Converted {
    Popularity(u8),
    Count(u64),
    Number(f64),
    NumberMap(Vec<(String, f64)>),
    Genres(Vec<String>),
    Signal(SocialSignal),
}

fn first_converted<'r>(record: &RawRecord, rule: &'r FieldRule) -> Option<(&'r str, Converted)> {
    rule.candidates.iter().find_map(|path| {
        let raw = record.lookup(path)?;
        let converted = convert(rule, raw);
        if converted.is_none() {
            debug!(slot = %rule.slot, path = %path, value = %raw, "Unusable field value skipped");
        }
        converted.map(|c| (path.as_str(), c))
    })
}

fn convert(rule: &FieldRule, raw: &Value) -> Option<Converted> {
    match (rule.slot.family, rule.slot.key.is_some()) {
        (MetricFamily::Popularity, _) => as_count(raw)
            .filter(|p| *p <= 100)
            .and_then(|p| u8::try_from(p).ok())
            .map(Converted::Popularity),
        (MetricFamily::Followers, _) => as_count(raw).map(Converted::Count),
        (MetricFamily::Genres, _) => as_genres(raw).map(Converted::Genres),
        (MetricFamily::AudioFeatures, true) => as_number(raw).map(Converted::Number),
        (MetricFamily::AudioFeatures, false) => as_number_map(raw).map(Converted::NumberMap),
        (MetricFamily::SocialMentions, _) => match rule.kind {
            SignalKind::Count => as_count(raw).map(|n| Converted::Signal(SocialSignal::Count(n))),
            SignalKind::PercentChange => {
                as_number(raw).map(|p| Converted::Signal(SocialSignal::PercentChange(p)))
            }
        },
    }
}

/// Largest count the snapshot store can hold (a signed 64-bit column)
const MAX_COUNT: u64 = i64::MAX as u64;

/// Non-negative integer from a number or a count string (`"12,000"`, `"1.2M"`)
///
/// Counts beyond [`MAX_COUNT`] are unusable, not clamped.
fn as_count(raw: &Value) -> Option<u64> {
    match raw {
        Value::Number(n) => match n.as_u64() {
            Some(count) => (count <= MAX_COUNT).then_some(count),
            None => n.as_f64().and_then(count_from_float),
        },
        Value::String(s) => parse_compact_count(s),
        _ => None,
    }
}

fn count_from_float(value: f64) -> Option<u64> {
    // i64::MAX as f64 rounds up to 2^63, so the bound is exclusive
    (value.is_finite() && value >= 0.0 && value.round() < i64::MAX as f64)
        .then(|| value.round() as u64)
}

fn parse_compact_count(text: &str) -> Option<u64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' '))
        .collect();

    let (mantissa, multiplier) = match cleaned.chars().last()? {
        'k' | 'K' => (&cleaned[..cleaned.len() - 1], 1e3),
        'm' | 'M' => (&cleaned[..cleaned.len() - 1], 1e6),
        'b' | 'B' => (&cleaned[..cleaned.len() - 1], 1e9),
        _ => (cleaned.as_str(), 1.0),
    };

    if multiplier == 1.0 {
        if let Ok(n) = mantissa.parse::<u64>() {
            return (n <= MAX_COUNT).then_some(n);
        }
    }

    count_from_float(mantissa.parse::<f64>().ok()? * multiplier)
}

/// Finite float from a number or numeric string (`"12.5"`, `"12.5%"`)
fn as_number(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn as_number_map(raw: &Value) -> Option<Vec<(String, f64)>> {
    let Value::Object(map) = raw else {
        return None;
    };
    let entries: Vec<(String, f64)> = map
        .iter()
        .filter_map(|(name, v)| as_number(v).map(|n| (name.clone(), n)))
        .collect();
    (!entries.is_empty()).then_some(entries)
}

/// Array of strings, or one comma-separated string
fn as_genres(raw: &Value) -> Option<Vec<String>> {
    let genres: Vec<String> = match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect(),
        _ => return None,
    };
    (!genres.is_empty()).then_some(genres)
}
