//! Access point rows.
//!
//! # Responsibility
//! - Define the persisted shape of one version access point.
//! - Declare which workflow cleanup a removed access point requires.
//!
//! # Invariants
//! - `AccessPointSource::User` rows are client-authored and reconciled
//!   against submissions; `System` rows are produced by task execution and
//!   only ever removed together with their version.

use crate::model::task::{Subtask, SubtaskOperation, SubtaskProvider};
use crate::model::temporal::impl_temporal_record;
use crate::model::version::VersionId;
use crate::model::RowId;
use serde::{Deserialize, Serialize};

/// Logical identity of an access point.
pub type AccessPointId = i64;

/// Kind of endpoint an access point describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessPointType {
    ApiSparql,
    File,
    SesameDownload,
    Sissvoc,
    WebPage,
}

impl AccessPointType {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::ApiSparql => "apiSparql",
            Self::File => "file",
            Self::SesameDownload => "sesameDownload",
            Self::Sissvoc => "sissvoc",
            Self::WebPage => "webPage",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "apiSparql" => Some(Self::ApiSparql),
            "file" => Some(Self::File),
            "sesameDownload" => Some(Self::SesameDownload),
            "sissvoc" => Some(Self::Sissvoc),
            "webPage" => Some(Self::WebPage),
            _ => None,
        }
    }
}

/// Who authored an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessPointSource {
    User,
    System,
}

impl AccessPointSource {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Endpoint details, stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPointData {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// One persisted access point row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    /// Surrogate key of this row; `0` until inserted.
    pub row_id: RowId,
    pub access_point_id: AccessPointId,
    pub version_id: VersionId,
    pub start_date: i64,
    pub end_date: i64,
    pub modified_by: String,
    pub kind: AccessPointType,
    pub source: AccessPointSource,
    pub data: AccessPointData,
}

impl_temporal_record!(AccessPoint);

impl AccessPoint {
    /// Subtask that undoes the published effect of this access point.
    ///
    /// Only system-generated endpoints have a published effect.
    pub fn removal_subtask(&self) -> Option<Subtask> {
        if self.source != AccessPointSource::System {
            return None;
        }
        match self.kind {
            AccessPointType::ApiSparql | AccessPointType::SesameDownload => Some(Subtask::new(
                SubtaskProvider::Import,
                SubtaskOperation::Delete,
            )),
            AccessPointType::Sissvoc => Some(Subtask::new(
                SubtaskProvider::Publish,
                SubtaskOperation::Delete,
            )),
            AccessPointType::File | AccessPointType::WebPage => None,
        }
    }
}
