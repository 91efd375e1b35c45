//! Vocabulary root rows.
//!
//! # Responsibility
//! - Define the persisted shape of one vocabulary row and its payload.
//!
//! # Invariants
//! - `vocabulary_id` is allocated once and shared by every current,
//!   draft and historical row of the same vocabulary.
//! - Draft rows carry `VocabularyStatus::Draft`; current rows never do.

use crate::model::temporal::impl_temporal_record;
use crate::model::RowId;
use serde::{Deserialize, Serialize};

/// Logical identity of a vocabulary.
pub type VocabularyId = i64;

/// Publication status of a vocabulary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VocabularyStatus {
    Published,
    Deprecated,
    Draft,
}

impl VocabularyStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Deprecated => "deprecated",
            Self::Draft => "draft",
        }
    }

    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "published" => Some(Self::Published),
            "deprecated" => Some(Self::Deprecated),
            "draft" => Some(Self::Draft),
            _ => None,
        }
    }
}

/// Client-authored vocabulary payload, stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyData {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acronym: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licence: Option<String>,
    #[serde(default)]
    pub primary_language: String,
    #[serde(default)]
    pub other_languages: Vec<String>,
}

/// One persisted vocabulary row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    /// Surrogate key of this row; `0` until inserted.
    pub row_id: RowId,
    pub vocabulary_id: VocabularyId,
    pub start_date: i64,
    pub end_date: i64,
    pub modified_by: String,
    pub owner: String,
    pub status: VocabularyStatus,
    pub slug: String,
    pub data: VocabularyData,
}

impl_temporal_record!(Vocabulary);
