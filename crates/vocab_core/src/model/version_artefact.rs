//! Version artefact rows: derived data generated by task execution.

use crate::model::task::{Subtask, SubtaskOperation, SubtaskProvider};
use crate::model::temporal::impl_temporal_record;
use crate::model::version::VersionId;
use crate::model::RowId;
use serde::{Deserialize, Serialize};

/// Logical identity of a version artefact.
pub type VersionArtefactId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionArtefactType {
    ConceptList,
    ConceptTree,
    HarvestData,
}

impl VersionArtefactType {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::ConceptList => "conceptList",
            Self::ConceptTree => "conceptTree",
            Self::HarvestData => "harvestData",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "conceptList" => Some(Self::ConceptList),
            "conceptTree" => Some(Self::ConceptTree),
            "harvestData" => Some(Self::HarvestData),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionArtefactStatus {
    Current,
    Pending,
}

impl VersionArtefactStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Pending => "pending",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "current" => Some(Self::Current),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

/// One persisted version artefact row. `data` is opaque to the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionArtefact {
    /// Surrogate key of this row; `0` until inserted.
    pub row_id: RowId,
    pub version_artefact_id: VersionArtefactId,
    pub version_id: VersionId,
    pub start_date: i64,
    pub end_date: i64,
    pub modified_by: String,
    pub kind: VersionArtefactType,
    pub status: VersionArtefactStatus,
    pub data: serde_json::Value,
}

impl_temporal_record!(VersionArtefact);

impl VersionArtefact {
    /// Subtask that removes whatever produced this artefact.
    pub fn removal_subtask(&self) -> Option<Subtask> {
        match self.kind {
            VersionArtefactType::HarvestData => Some(Subtask::new(
                SubtaskProvider::Harvest,
                SubtaskOperation::Delete,
            )),
            VersionArtefactType::ConceptTree => Some(Subtask::new(
                SubtaskProvider::ConceptTreeTransform,
                SubtaskOperation::Delete,
            )),
            VersionArtefactType::ConceptList => None,
        }
    }
}
