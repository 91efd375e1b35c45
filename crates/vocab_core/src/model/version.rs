//! Version rows.
//!
//! # Responsibility
//! - Define the persisted shape of one vocabulary version and its payload,
//!   including the workflow flags that drive background tasks.
//!
//! # Invariants
//! - `force_workflow` is a property of a submission, never of a row, so it
//!   is absent here.

use crate::model::temporal::impl_temporal_record;
use crate::model::vocabulary::VocabularyId;
use crate::model::RowId;
use serde::{Deserialize, Serialize};

/// Logical identity of a version.
pub type VersionId = i64;

/// Lifecycle status of a version within its vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionStatus {
    Current,
    Superseded,
}

impl VersionStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Superseded => "superseded",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "current" => Some(Self::Current),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }
}

/// Client-authored version payload, stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionData {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Remote project to harvest from when `do_harvest` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harvest_source: Option<String>,
    #[serde(default)]
    pub do_harvest: bool,
    #[serde(default)]
    pub do_import: bool,
    #[serde(default)]
    pub do_publish: bool,
}

/// The three workflow flags of a version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowFlags {
    pub harvest: bool,
    pub import: bool,
    pub publish: bool,
}

impl VersionData {
    pub fn workflow_flags(&self) -> WorkflowFlags {
        WorkflowFlags {
            harvest: self.do_harvest,
            import: self.do_import,
            publish: self.do_publish,
        }
    }
}

/// One persisted version row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Surrogate key of this row; `0` until inserted.
    pub row_id: RowId,
    pub version_id: VersionId,
    pub vocabulary_id: VocabularyId,
    pub start_date: i64,
    pub end_date: i64,
    pub modified_by: String,
    pub status: VersionStatus,
    pub slug: String,
    pub release_date: Option<String>,
    pub data: VersionData,
}

impl_temporal_record!(Version);
