use chrono::{DateTime, Utc};
use domain_qa_index::{BackendKind, IndexDescriptor, IndexError, IndexedDocument};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Rejects strings that are empty after trimming
fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}

/// A question/answer knowledge entry attached to an owner (application or dataset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaDocument {
    pub id: Uuid,
    /// Owner id
    pub app_id: Uuid,
    pub question: String,
    pub answer: String,
    /// 1-based, never reused within the owner
    pub position: i32,
    /// False iff the last index mutation for this entry failed
    pub enabled: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QaDocument {
    pub fn to_indexed(&self) -> IndexedDocument {
        IndexedDocument::qa(self.id, self.app_id, &self.question, &self.answer)
    }

    pub fn has_content(&self, question: &str, answer: &str) -> bool {
        self.question == question && self.answer == answer
    }

    pub fn mark_failed(&mut self, cause: &IndexError) {
        self.enabled = false;
        self.error = Some(cause.to_string());
    }

    /// Returns true when the entry changed
    pub fn mark_indexed(&mut self) -> bool {
        let changed = !self.enabled || self.error.is_some();
        self.enabled = true;
        self.error = None;
        changed
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQaDocument {
    #[validate(custom(function = "not_blank"))]
    pub question: String,
    #[validate(custom(function = "not_blank"))]
    pub answer: String,
}

impl CreateQaDocument {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Replaces both question and answer
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateQaDocument {
    #[validate(custom(function = "not_blank"))]
    pub question: String,
    #[validate(custom(function = "not_blank"))]
    pub answer: String,
}

impl UpdateQaDocument {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    pub fn trimmed(&self) -> (String, String) {
        (self.question.trim().to_string(), self.answer.trim().to_string())
    }
}

/// Row to insert; the repository assigns id and position
#[derive(Debug, Clone, PartialEq)]
pub struct NewQaDocument {
    pub app_id: Uuid,
    pub question: String,
    pub answer: String,
}

impl NewQaDocument {
    pub fn new(app_id: Uuid, input: CreateQaDocument) -> Self {
        Self {
            app_id,
            question: input.question.trim().to_string(),
            answer: input.answer.trim().to_string(),
        }
    }

    /// Enabled entry at `position`
    pub fn into_document(self, position: i32) -> QaDocument {
        let now = Utc::now();
        QaDocument {
            id: Uuid::now_v7(),
            app_id: self.app_id,
            question: self.question,
            answer: self.answer,
            position,
            enabled: true,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum QaDocumentSort {
    #[default]
    #[serde(rename = "-created_at")]
    #[strum(serialize = "-created_at")]
    CreatedAtDesc,
    #[serde(rename = "created_at")]
    #[strum(serialize = "created_at")]
    CreatedAt,
    #[serde(rename = "position")]
    #[strum(serialize = "position")]
    Position,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QaDocumentFilter {
    pub app_id: Uuid,
    /// Case-insensitive match against question or answer
    pub keyword: Option<String>,
    pub enabled: Option<bool>,
    #[serde(default)]
    pub sort: QaDocumentSort,
    #[validate(range(min = 1, max = 100))]
    pub limit: usize,
    pub offset: usize,
}

impl QaDocumentFilter {
    pub fn new(app_id: Uuid) -> Self {
        Self {
            app_id,
            keyword: None,
            enabled: None,
            sort: QaDocumentSort::default(),
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn sorted_by(mut self, sort: QaDocumentSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn paginate(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Trimmed, lowercased keyword; `None` when blank
    pub fn normalized_keyword(&self) -> Option<String> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, entry: &QaDocument) -> bool {
        if entry.app_id != self.app_id {
            return false;
        }
        if let Some(enabled) = self.enabled {
            if entry.enabled != enabled {
                return false;
            }
        }
        if let Some(keyword) = self.normalized_keyword() {
            return entry.question.to_lowercase().contains(&keyword)
                || entry.answer.to_lowercase().contains(&keyword);
        }
        true
    }
}

/// Result of a delete request
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted,
    /// The index refused the deletion; the entry is kept and marked errored
    Kept(QaDocument),
}

/// What the owner's index looks like right now
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStatus {
    pub app_id: Uuid,
    pub kind: BackendKind,
    pub collection: String,
    pub descriptor: Option<IndexDescriptor>,
    pub vectors: u64,
}
