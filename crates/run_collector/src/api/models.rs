//! Request and response types for the `LangSmith` REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One element of the `GET /sessions` response.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// Session (project) id
    pub id: String,

    /// Project name
    pub name: Option<String>,
}

/// Body of `POST /runs/query`.
#[derive(Debug, Clone, Serialize)]
pub struct RunQuery {
    /// Session ids to query
    pub session: Vec<String>,

    pub start_time: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Only top-level runs; child runs are reachable through their parent
    pub is_root: bool,

    /// Page size
    pub limit: usize,

    /// Cursor returned by the previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Response from `POST /runs/query`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunQueryResponse {
    /// Raw run records
    #[serde(default)]
    pub runs: Vec<Value>,

    #[serde(default)]
    pub cursors: Option<Cursors>,
}

impl RunQueryResponse {
    /// Cursor of the next page, if there is one.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&str> {
        self.cursors
            .as_ref()
            .and_then(|cursors| cursors.next.as_deref())
            .filter(|cursor| !cursor.is_empty())
    }
}

/// Pagination cursors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cursors {
    pub next: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_run_query_serialization() {
        let query = RunQuery {
            session: vec!["s-1".to_string()],
            start_time: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            end_time: None,
            is_root: true,
            limit: 100,
            cursor: None,
        };

        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["session"], json!(["s-1"]));
        assert_eq!(value["is_root"], json!(true));
        assert!(value.get("end_time").is_none());
        assert!(value.get("cursor").is_none());
    }

    #[test]
    fn test_next_cursor() {
        let page: RunQueryResponse =
            serde_json::from_value(json!({"runs": [{"id": "a"}], "cursors": {"next": "abc"}}))
                .unwrap();
        assert_eq!(page.runs.len(), 1);
        assert_eq!(page.next_cursor(), Some("abc"));

        let last: RunQueryResponse =
            serde_json::from_value(json!({"runs": [], "cursors": {"next": null}})).unwrap();
        assert_eq!(last.next_cursor(), None);

        let bare: RunQueryResponse = serde_json::from_value(json!({})).unwrap();
        assert!(bare.runs.is_empty());
    }
}
