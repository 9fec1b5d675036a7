mod file;

pub use file::FileStore;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{FormData, Template, now_rfc3339};

/// A finished form, handed off at submit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSubmission {
    pub id: String,
    pub template_id: String,
    pub submitted_at: String,
    pub values: FormData,
}

impl FormSubmission {
    pub fn new(template_id: &str, values: FormData) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            template_id: template_id.to_string(),
            submitted_at: now_rfc3339(),
            values,
        }
    }
}

/// One line in the activity feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub action: String,
    pub detail: String,
    pub at: String,
}

impl ActivityEntry {
    pub fn new(action: &str, detail: String) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            action: action.to_string(),
            detail,
            at: now_rfc3339(),
        }
    }

    pub fn submission(submission: &FormSubmission) -> Self {
        Self::new(
            "form_submitted",
            format!(
                "template {} submitted as {}",
                submission.template_id, submission.id
            ),
        )
    }
}

/// Read-only source of form templates.
pub trait TemplateStore {
    fn list(&self) -> Result<Vec<Template>, StoreError>;
    fn get(&self, id: &str) -> Result<Template, StoreError>;
}

/// Destination for finished submissions.
pub trait SubmissionSink {
    fn submit(&self, submission: &FormSubmission) -> Result<(), StoreError>;
}

/// Destination for activity entries; best-effort from the session's view.
pub trait ActivityLog {
    fn record(&self, entry: &ActivityEntry) -> Result<(), StoreError>;
}

/// In-memory repository for tests and demos.
#[derive(Default)]
pub struct MemoryStore {
    templates: Vec<Template>,
    submissions: Mutex<Vec<FormSubmission>>,
    activity: Mutex<Vec<ActivityEntry>>,
}

impl MemoryStore {
    pub fn new(templates: Vec<Template>) -> Self {
        Self {
            templates,
            submissions: Mutex::new(Vec::new()),
            activity: Mutex::new(Vec::new()),
        }
    }

    pub fn submissions(&self) -> Vec<FormSubmission> {
        self.submissions.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn activity(&self) -> Vec<ActivityEntry> {
        self.activity.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl TemplateStore for MemoryStore {
    fn list(&self) -> Result<Vec<Template>, StoreError> {
        Ok(self.templates.clone())
    }

    fn get(&self, id: &str) -> Result<Template, StoreError> {
        self.templates
            .iter()
            .find(|template| template.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

impl SubmissionSink for MemoryStore {
    fn submit(&self, submission: &FormSubmission) -> Result<(), StoreError> {
        if let Ok(mut submissions) = self.submissions.lock() {
            submissions.push(submission.clone());
        }
        Ok(())
    }
}

impl ActivityLog for MemoryStore {
    fn record(&self, entry: &ActivityEntry) -> Result<(), StoreError> {
        if let Ok(mut activity) = self.activity.lock() {
            activity.push(entry.clone());
        }
        Ok(())
    }
}
