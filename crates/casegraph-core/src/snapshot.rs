use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A party embedded in a case record (plaintiff, defendant, counsel, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub id: String,
    pub name: String,
    pub number: String,
    pub status: String,
    #[serde(default)]
    pub parties: Vec<Party>,
}

impl Case {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deadline {
    pub id: String,
    #[serde(default)]
    pub case_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub case_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filing {
    pub id: String,
    #[serde(default)]
    pub case_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub filed_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub id: String,
    #[serde(default)]
    pub case_id: Option<String>,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub case_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub case_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Read-only view of the case store taken at the start of a request.
///
/// The orchestrator never writes through this; it is shared across
/// concurrent requests behind an `Arc`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSnapshot {
    #[serde(default)]
    pub cases: Vec<Case>,
    #[serde(default)]
    pub deadlines: Vec<Deadline>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub filings: Vec<Filing>,
    #[serde(default)]
    pub evidences: Vec<Evidence>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub documents: Vec<Document>,
}
