//! Build status events pushed over the live connection.

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::LiveResult;

/// Lifecycle stage of a build job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl BuildStatus {
    /// `Completed` and `Failed` are final; no further updates follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildStatus::Completed | BuildStatus::Failed)
    }
}

/// One status update for a build, as sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStatusUpdate {
    /// Dispatch key: the build this update belongs to.
    pub build_id: String,
    pub status: BuildStatus,
    /// Percentage 0-100, passed through as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// ISO-8601 start timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// ISO-8601 completion timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl BuildStatusUpdate {
    /// Decode one inbound text frame.
    pub fn decode(raw: &str) -> LiveResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn started_at_time(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(self.started_at.as_deref())
    }

    pub fn completed_at_time(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(self.completed_at.as_deref())
    }

    /// Wall time between start and completion, when both timestamps parse.
    pub fn elapsed(&self) -> Option<Duration> {
        Some(self.completed_at_time()? - self.started_at_time()?)
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_running_with_progress() {
        let update =
            BuildStatusUpdate::decode(r#"{"build_id":"b1","status":"running","progress":42}"#)
                .unwrap();
        assert_eq!(update.build_id, "b1");
        assert_eq!(update.status, BuildStatus::Running);
        assert_eq!(update.progress, Some(42.0));
        assert_eq!(update.message, None);
        assert_eq!(update.started_at, None);
        assert_eq!(update.completed_at, None);
    }

    #[test]
    fn decode_all_fields() {
        let raw = r#"{
            "build_id": "b7",
            "status": "completed",
            "progress": 100,
            "message": "3 PDFs written",
            "started_at": "2024-05-01T10:00:00Z",
            "completed_at": "2024-05-01T10:02:30Z",
            "extra": true
        }"#;
        let update = BuildStatusUpdate::decode(raw).unwrap();
        assert_eq!(update.status, BuildStatus::Completed);
        assert_eq!(update.message.as_deref(), Some("3 PDFs written"));
        assert_eq!(update.elapsed(), Some(Duration::seconds(150)));
    }

    #[test]
    fn decode_rejects_unknown_status() {
        assert!(BuildStatusUpdate::decode(r#"{"build_id":"b1","status":"queued"}"#).is_err());
    }

    #[test]
    fn decode_rejects_missing_build_id() {
        assert!(BuildStatusUpdate::decode(r#"{"status":"pending"}"#).is_err());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(BuildStatusUpdate::decode("not json").is_err());
        assert!(BuildStatusUpdate::decode("").is_err());
    }

    #[test]
    fn serialize_omits_absent_fields() {
        let update = BuildStatusUpdate {
            build_id: "b1".to_string(),
            status: BuildStatus::Pending,
            progress: None,
            message: None,
            started_at: None,
            completed_at: None,
        };
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"build_id":"b1","status":"pending"}"#
        );
    }

    #[test]
    fn elapsed_needs_both_timestamps() {
        let update = BuildStatusUpdate {
            build_id: "b1".to_string(),
            status: BuildStatus::Failed,
            progress: None,
            message: None,
            started_at: Some("2024-05-01T10:00:00Z".to_string()),
            completed_at: Some("yesterday".to_string()),
        };
        assert!(update.started_at_time().is_some());
        assert_eq!(update.completed_at_time(), None);
        assert_eq!(update.elapsed(), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!BuildStatus::Pending.is_terminal());
        assert!(!BuildStatus::Running.is_terminal());
        assert!(BuildStatus::Completed.is_terminal());
        assert!(BuildStatus::Failed.is_terminal());
    }
}
