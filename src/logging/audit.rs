//! Pipeline audit trail
//!
//! One JSON line per pipeline event, appended to an optional file. A write
//! failure is logged and otherwise ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::auth::Role;

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// First sign-in created a directory record
    UserRegistered,
    SubmissionCreated,
    ReviewRecorded,
    TemplatePublished,
    TemplateRejected,
    RoleChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// User who performed the action
    pub actor_id: String,
    pub actor_role: Role,
    /// Submission id, template slug or target user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, actor_id: impl Into<String>, actor_role: Role) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            actor_id: actor_id.into(),
            actor_role,
            subject: None,
            action: None,
            metadata: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Appends audit events to a JSONL file
#[derive(Clone)]
pub struct AuditLogger {
    inner: Arc<Mutex<AuditLoggerInner>>,
}

struct AuditLoggerInner {
    writer: Option<BufWriter<File>>,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Logger with no sink; events are dropped until [`init_file`](Self::init_file)
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(AuditLoggerInner { writer: None })),
        }
    }

    /// Start appending to `path`
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut inner = self.inner.lock().await;
        inner.writer = Some(BufWriter::new(file));

        info!("Audit logging initialized to {}", path.display());
        Ok(())
    }

    pub async fn log(&self, event: AuditEvent) {
        let line = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;

        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", line) {
                error!("Failed to write audit event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::new(AuditEventType::ReviewRecorded, "rev-1", Role::Reviewer)
            .with_subject("submission_1_abc")
            .with_action("request_changes");

        let line = event.to_jsonl().unwrap();
        assert!(line.contains("\"event_type\":\"review_recorded\""));
        assert!(line.contains("\"actor_role\":\"reviewer\""));
        assert!(line.contains("request_changes"));
        assert!(!line.contains("metadata"));
    }

    #[tokio::test]
    async fn test_file_sink_appends_lines() {
        let path = std::env::temp_dir().join(format!("audit-{}.jsonl", uuid::Uuid::new_v4()));
        let logger = AuditLogger::new();
        logger.init_file(path.clone()).await.unwrap();

        logger
            .log(AuditEvent::new(AuditEventType::SubmissionCreated, "u1", Role::User))
            .await;
        logger
            .log(
                AuditEvent::new(AuditEventType::RoleChanged, "admin", Role::Admin)
                    .with_subject("u1")
                    .with_metadata(serde_json::json!({ "role": "reviewer" })),
            )
            .await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: AuditEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.event_type, AuditEventType::RoleChanged);
        assert_eq!(parsed.subject.as_deref(), Some("u1"));

        let _ = std::fs::remove_file(path);
    }
}
