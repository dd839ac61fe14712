use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StrideError};

/// Maximum number of group labels a tracker may carry.
pub const MAX_GROUP_LABELS: usize = 3;

fn is_false(value: &bool) -> bool {
    !*value
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub in_progress: bool,
}

impl Subtask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            text: text.into(),
            completed: false,
            in_progress: false,
        }
    }
}

/// A unit of work: title, estimate, optional deadline and an ordered subtask list.
///
/// `progress`, `completed` and `celebrated` are derived by the coordinator and
/// never set directly from user input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tracker {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub time_estimate: u32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "stored_time::option"
    )]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(with = "stored_time")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub in_progress: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub celebrated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group: Vec<String>,
}

/// Progress for a subtask list: the rounded share of completed subtasks, or
/// 0/100 from the tracker's own flag when there are no subtasks.
pub fn compute_progress(subtasks: &[Subtask], completed: bool) -> u8 {
    if subtasks.is_empty() {
        return if completed { 100 } else { 0 };
    }
    let done = subtasks.iter().filter(|s| s.completed).count();
    let total = subtasks.len();
    // round half up, matching Math.round on non-negative values
    ((200 * done + total) / (2 * total)) as u8
}

impl Tracker {
    pub fn recompute_progress(&mut self) {
        self.progress = compute_progress(&self.subtasks, self.completed);
    }

    /// Drop the celebration marker once progress falls below 100.
    pub fn settle_celebrated(&mut self) {
        if self.progress < 100 {
            self.celebrated = false;
        }
    }

    /// Re-derive `progress` on a record read back from storage or the cloud.
    pub fn repair_derived(&mut self) {
        self.recompute_progress();
        self.settle_celebrated();
    }

    pub fn subtask_position(&self, subtask_id: &str) -> Result<usize> {
        self.subtasks
            .iter()
            .position(|s| s.id == subtask_id)
            .ok_or_else(|| StrideError::SubtaskNotFound {
                tracker: self.id.clone(),
                subtask: subtask_id.to_string(),
            })
    }

    pub fn completed_subtasks(&self) -> usize {
        self.subtasks.iter().filter(|s| s.completed).count()
    }
}

/// Caller-supplied fields for a new tracker.
#[derive(Debug, Clone, Default)]
pub struct TrackerDraft {
    pub title: String,
    pub description: String,
    pub time_estimate: i64,
    pub deadline: Option<DateTime<Utc>>,
    pub subtasks: Vec<Subtask>,
    pub group: Vec<String>,
    pub completed: bool,
    pub in_progress: bool,
}

impl TrackerDraft {
    pub fn new(title: impl Into<String>, time_estimate: i64) -> Self {
        Self {
            title: title.into(),
            time_estimate,
            ..Self::default()
        }
    }

    pub fn with_subtasks<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subtasks = texts.into_iter().map(Subtask::new).collect();
        self
    }

    /// Validate and turn the draft into a record with a fresh id.
    pub fn into_tracker(self, created_at: DateTime<Utc>) -> Result<Tracker> {
        let title = validate_title(&self.title)?;
        let time_estimate = validate_estimate(self.time_estimate)?;
        let group = normalize_group(self.group)?;
        let mut subtasks = self.subtasks;
        for subtask in &mut subtasks {
            if subtask.id.is_empty() {
                subtask.id = new_id();
            }
        }
        let mut tracker = Tracker {
            id: new_id(),
            title,
            description: self.description,
            time_estimate,
            deadline: self.deadline,
            subtasks,
            created_at,
            progress: 0,
            completed: self.completed,
            in_progress: self.in_progress,
            celebrated: false,
            group,
        };
        tracker.recompute_progress();
        Ok(tracker)
    }
}

/// Shallow set of field replacements applied by `update`.
///
/// Identity, creation time and the derived fields are not patchable.
#[derive(Debug, Clone, Default)]
pub struct TrackerPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_estimate: Option<i64>,
    pub deadline: Option<Option<DateTime<Utc>>>,
    pub subtasks: Option<Vec<Subtask>>,
    pub group: Option<Vec<String>>,
    pub in_progress: Option<bool>,
}

impl TrackerPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.time_estimate.is_none()
            && self.deadline.is_none()
            && self.subtasks.is_none()
            && self.group.is_none()
            && self.in_progress.is_none()
    }
}

pub fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(StrideError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

pub fn validate_estimate(value: i64) -> Result<u32> {
    match u32::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(StrideError::InvalidEstimate(value)),
    }
}

/// Trim labels, drop empties and duplicates (first occurrence wins), cap at three.
pub fn normalize_group(labels: Vec<String>) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let trimmed = label.trim();
        if trimmed.is_empty() || out.iter().any(|l| l == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    if out.len() > MAX_GROUP_LABELS {
        return Err(StrideError::TooManyGroups(out.len()));
    }
    Ok(out)
}

/// Parse a user or storage supplied time point.
pub fn parse_time(input: &str) -> Result<DateTime<Utc>> {
    stored_time::parse(input).ok_or_else(|| StrideError::InvalidDate(input.to_string()))
}

/// Time points as stored by the local mirror.
///
/// Written as RFC 3339 with millisecond precision. Read back from RFC 3339,
/// naive date-times (taken as UTC), bare dates, or epoch milliseconds.
pub mod stored_time {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(i64),
    }

    pub fn parse(input: &str) -> Option<DateTime<Utc>> {
        let input = input.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Some(dt.with_timezone(&Utc));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
                return Some(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    fn from_raw<E: serde::de::Error>(raw: Raw) -> Result<DateTime<Utc>, E> {
        match raw {
            Raw::Text(s) => parse(&s).ok_or_else(|| E::custom(format!("invalid time '{s}'"))),
            Raw::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| E::custom(format!("timestamp out of range: {ms}"))),
        }
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        from_raw(Raw::deserialize(d)?)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => super::serialize(dt, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<Raw>::deserialize(d)? {
                None => Ok(None),
                Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
                Some(raw) => from_raw(raw).map(Some),
            }
        }
    }
}
