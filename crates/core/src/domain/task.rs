use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::document::{DocumentId, DocumentKind};
use crate::domain::transaction::TransactionId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskUrgency {
    Low,
    Normal,
    High,
}

impl TaskUrgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Work item surfaced on the approver's task list, created alongside the
/// transaction it tracks. Kept as a historical record once acted on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub transaction_id: TransactionId,
    pub document_id: DocumentId,
    pub document_kind: DocumentKind,
    pub process_title: String,
    pub step_order: i32,
    pub assigned_from: String,
    pub assigned_to: String,
    pub urgency: TaskUrgency,
    pub assigned_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub read: bool,
}
