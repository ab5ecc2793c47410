/// Task model and boundary input types
///
/// A task belongs to exactly one owner for its lifetime. It is created
/// pending, edited zero or more times, and then either deleted or
/// completed; completion is terminal for mutation, so a completed task is
/// read-only until it is eventually deleted.
///
/// # Wire Format
///
/// Tasks are stored as JSON documents with the field names the deployed
/// data set uses: `uid`, `title`, `description`, `dueDate`, `priority`,
/// `completed`, `createdAt`, `updatedAt`, `completedAt`. The document id
/// is carried outside the payload and never serialized into it.
///
/// # Example
///
/// ```
/// use taskrank::models::task::{Priority, TaskDraft};
/// use chrono::NaiveDate;
/// use validator::Validate;
///
/// let draft = TaskDraft {
///     title: "water plants".to_string(),
///     description: None,
///     due_date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
///     priority: Priority::Low,
/// };
/// assert!(draft.validate().is_ok());
/// ```

use crate::session::UserId;
use crate::store::{Document, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Maximum length of a task description, in characters
pub const MAX_DESCRIPTION_CHARS: u64 = 275;

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    /// Low priority
    Low,

    /// Medium priority
    Mid,

    /// High priority
    High,
}

impl Priority {
    /// Converts priority to its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Mid => "Mid",
            Priority::High => "High",
        }
    }
}

/// A task document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Store-assigned document id; not part of the payload
    #[serde(skip)]
    pub id: String,

    /// Identity of the creating user; immutable
    #[serde(rename = "uid")]
    pub owner: UserId,

    /// Non-empty task title
    pub title: String,

    /// Optional free-form details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// When the task is due
    pub due_date: NaiveDate,

    /// Task priority
    pub priority: Priority,

    /// Whether the task has been completed
    pub completed: bool,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last edited; absent until the first edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// When the task was completed; present iff `completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Decodes a stored document into a task
    pub fn from_document(doc: Document) -> Result<Self, StoreError> {
        let mut task: Task = serde_json::from_value(doc.data)?;
        task.id = doc.id;
        Ok(task)
    }

    /// Encodes the task payload for storage (id excluded)
    pub fn to_value(&self) -> Result<serde_json::Value, StoreError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Input for creating a task
///
/// Fixed record type validated at the boundary before anything reaches the
/// repository; the rules mirror the entry form (title required, details
/// capped at 275 characters).
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct TaskDraft {
    /// Task title
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,

    /// Optional details
    #[validate(length(max = 275, message = "description must be 275 characters or less"))]
    pub description: Option<String>,

    /// Due date
    pub due_date: NaiveDate,

    /// Priority
    pub priority: Priority,
}

/// Partial update of an existing task
///
/// `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Validate, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New title
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,

    /// New details
    #[validate(length(max = 275, message = "description must be 275 characters or less"))]
    pub description: Option<String>,

    /// New due date
    pub due_date: Option<NaiveDate>,

    /// New priority
    pub priority: Option<Priority>,
}

impl TaskPatch {
    /// Whether the patch changes anything
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
    }
}
