use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RemoteConfig;
use crate::model::{Subtask, Tracker};
use crate::remote::{RemoteError, RemoteTable, SaveFailure};

/// PostgREST-style table: `{url}/rest/v1/{table}`, rows filtered by `user_id`.
pub struct HttpTable {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
    access_token: Option<String>,
}

/// Row shape of the remote table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub time_estimate: u32,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub in_progress: bool,
    #[serde(default)]
    pub celebrated: bool,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl TrackerRow {
    pub fn from_tracker(tracker: &Tracker, owner_id: &str) -> Self {
        Self {
            id: tracker.id.clone(),
            user_id: owner_id.to_string(),
            title: tracker.title.clone(),
            description: tracker.description.clone(),
            time_estimate: tracker.time_estimate,
            deadline: tracker.deadline,
            subtasks: tracker.subtasks.clone(),
            created_at: tracker.created_at,
            progress: tracker.progress,
            completed: tracker.completed,
            in_progress: tracker.in_progress,
            celebrated: tracker.celebrated,
            groups: tracker.group.clone(),
        }
    }

    pub fn into_tracker(self) -> Tracker {
        Tracker {
            id: self.id,
            title: self.title,
            description: self.description,
            time_estimate: self.time_estimate,
            deadline: self.deadline,
            subtasks: self.subtasks,
            created_at: self.created_at,
            progress: self.progress,
            completed: self.completed,
            in_progress: self.in_progress,
            celebrated: self.celebrated,
            group: self.groups,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Pull a human-readable message and an error code out of an error response.
pub(crate) fn error_details(status: StatusCode, body: &str) -> (Option<String>, String) {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.error_description)
        .or(parsed.msg)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.chars().take(200).collect()
            }
        });
    (parsed.code, message)
}

/// Map a rejected upsert to its failure reason: 401/403 or SQLSTATE 42501 is
/// a permission problem, 409 or SQLSTATE 23505 a duplicate key.
pub(crate) fn classify_save_failure(status: StatusCode, body: &str) -> SaveFailure {
    let (code, message) = error_details(status, body);
    let code = code.as_deref();
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || code == Some("42501")
    {
        SaveFailure::PermissionDenied(message)
    } else if status == StatusCode::CONFLICT || code == Some("23505") {
        SaveFailure::DuplicateKey(message)
    } else {
        SaveFailure::Other(format!("HTTP {}: {message}", status.as_u16()))
    }
}

impl HttpTable {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RemoteError::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table: config.table.clone(),
            access_token: None,
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn rows_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        req.header("apikey", &self.api_key).bearer_auth(bearer)
    }
}

#[async_trait]
impl RemoteTable for HttpTable {
    async fn fetch_all(&self, owner_id: &str) -> Result<Vec<Tracker>, RemoteError> {
        let user_filter = format!("eq.{owner_id}");
        let resp = self
            .authorized(self.client.get(self.rows_url()))
            .query(&[
                ("select", "*"),
                ("user_id", user_filter.as_str()),
                ("order", "created_at.asc"),
            ])
            .send()
            .await
            .map_err(|e| RemoteError::Fetch(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let (_, message) = error_details(status, &body);
            return Err(RemoteError::Fetch(message));
        }
        let rows: Vec<TrackerRow> = resp
            .json()
            .await
            .map_err(|e| RemoteError::Fetch(format!("unexpected response: {e}")))?;
        debug!(owner_id, rows = rows.len(), "fetched remote trackers");
        Ok(rows.into_iter().map(TrackerRow::into_tracker).collect())
    }

    async fn upsert_many(&self, owner_id: &str, records: &[Tracker]) -> Result<(), RemoteError> {
        if records.is_empty() {
            return Ok(());
        }
        let rows: Vec<TrackerRow> = records
            .iter()
            .map(|t| TrackerRow::from_tracker(t, owner_id))
            .collect();
        let resp = self
            .authorized(self.client.post(self.rows_url()))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .query(&[("on_conflict", "id")])
            .json(&rows)
            .send()
            .await
            .map_err(|e| RemoteError::Save(SaveFailure::Other(e.to_string())))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Save(classify_save_failure(status, &body)));
        }
        debug!(owner_id, rows = rows.len(), "upserted remote trackers");
        Ok(())
    }

    async fn delete_one(&self, id: &str, owner_id: &str) -> Result<(), RemoteError> {
        let id_filter = format!("eq.{id}");
        let user_filter = format!("eq.{owner_id}");
        let resp = self
            .authorized(self.client.delete(self.rows_url()))
            .query(&[("id", id_filter.as_str()), ("user_id", user_filter.as_str())])
            .send()
            .await
            .map_err(|e| RemoteError::Delete(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let (_, message) = error_details(status, &body);
            return Err(RemoteError::Delete(message));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackerDraft;

    #[test]
    fn permission_and_duplicate_failures_are_told_apart() {
        let denied = classify_save_failure(
            StatusCode::FORBIDDEN,
            r#"{"code":"42501","message":"new row violates row-level security policy"}"#,
        );
        assert_eq!(
            denied,
            SaveFailure::PermissionDenied("new row violates row-level security policy".into())
        );

        let duplicate = classify_save_failure(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#,
        );
        assert!(matches!(duplicate, SaveFailure::DuplicateKey(_)));

        let by_code = classify_save_failure(StatusCode::BAD_REQUEST, r#"{"code":"23505"}"#);
        assert!(matches!(by_code, SaveFailure::DuplicateKey(_)));
    }

    #[test]
    fn other_failures_keep_status_and_raw_body() {
        let failure = classify_save_failure(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(failure, SaveFailure::Other("HTTP 502: upstream down".into()));

        let (_, empty) = error_details(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(empty.contains("500"));
    }

    #[test]
    fn rows_carry_owner_and_round_trip_tracker_fields() {
        let mut draft = TrackerDraft::new("Row", 20).with_subtasks(["one"]);
        draft.group = vec!["work".into()];
        let tracker = draft.into_tracker(Utc::now()).unwrap();

        let row = TrackerRow::from_tracker(&tracker, "owner-1");
        assert_eq!(row.user_id, "owner-1");
        assert_eq!(row.groups, vec!["work"]);
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("time_estimate").is_some());
        assert_eq!(row.into_tracker(), tracker);
    }

    #[test]
    fn table_url_is_normalized() {
        let table = HttpTable::new(&RemoteConfig::new("https://db.example/", "anon")).unwrap();
        assert_eq!(table.rows_url(), "https://db.example/rest/v1/trackers");
    }
}
