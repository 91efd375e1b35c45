//! Vocabulary link rows: related entities and related vocabularies.
//!
//! # Responsibility
//! - Define one generic many-to-many edge row shared by both link families.
//! - Define the relation kinds of each family.
//!
//! # Invariants
//! - A link is identified by `(target_id, relation)` within its vocabulary;
//!   the same target may appear under several relations.
//! - Links have no payload, so a draft link row is either an addition or a
//!   deletion proposal, told apart by its draft end date.

use crate::model::temporal::TemporalRecord;
use crate::model::vocabulary::VocabularyId;
use crate::model::RowId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Identity of an external related entity (publisher, author, ...).
pub type RelatedEntityId = i64;

/// Relation kind of one link family.
pub trait LinkRelation:
    Copy + Ord + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Backing table of this link family.
    const TABLE: &'static str;
    /// Column holding the link target.
    const TARGET_COLUMN: &'static str;
    /// Short family name used in logs and diagnostics.
    const FAMILY: &'static str;

    fn as_db_str(self) -> &'static str;
    fn from_db_str(value: &str) -> Option<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelatedEntityRelation {
    PublishedBy,
    HasAuthor,
    HasContributor,
    PointOfContact,
    ImplementedBy,
    ConsumerOf,
    HasMaintainer,
    IsFundedBy,
}

impl LinkRelation for RelatedEntityRelation {
    const TABLE: &'static str = "vocabulary_related_entities";
    const TARGET_COLUMN: &'static str = "related_entity_id";
    const FAMILY: &'static str = "related_entity";

    fn as_db_str(self) -> &'static str {
        match self {
            Self::PublishedBy => "publishedBy",
            Self::HasAuthor => "hasAuthor",
            Self::HasContributor => "hasContributor",
            Self::PointOfContact => "pointOfContact",
            Self::ImplementedBy => "implementedBy",
            Self::ConsumerOf => "consumerOf",
            Self::HasMaintainer => "hasMaintainer",
            Self::IsFundedBy => "isFundedBy",
        }
    }

    fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "publishedBy" => Some(Self::PublishedBy),
            "hasAuthor" => Some(Self::HasAuthor),
            "hasContributor" => Some(Self::HasContributor),
            "pointOfContact" => Some(Self::PointOfContact),
            "implementedBy" => Some(Self::ImplementedBy),
            "consumerOf" => Some(Self::ConsumerOf),
            "hasMaintainer" => Some(Self::HasMaintainer),
            "isFundedBy" => Some(Self::IsFundedBy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelatedVocabularyRelation {
    HasAssociationWith,
    IsPartOf,
    Enriches,
    IsDerivedFrom,
}

impl LinkRelation for RelatedVocabularyRelation {
    const TABLE: &'static str = "vocabulary_related_vocabularies";
    const TARGET_COLUMN: &'static str = "related_vocabulary_id";
    const FAMILY: &'static str = "related_vocabulary";

    fn as_db_str(self) -> &'static str {
        match self {
            Self::HasAssociationWith => "hasAssociationWith",
            Self::IsPartOf => "isPartOf",
            Self::Enriches => "enriches",
            Self::IsDerivedFrom => "isDerivedFrom",
        }
    }

    fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "hasAssociationWith" => Some(Self::HasAssociationWith),
            "isPartOf" => Some(Self::IsPartOf),
            "enriches" => Some(Self::Enriches),
            "isDerivedFrom" => Some(Self::IsDerivedFrom),
            _ => None,
        }
    }
}

/// Identity of one link within its vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkKey<R> {
    pub target_id: i64,
    pub relation: R,
}

/// One persisted link row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyLink<R> {
    /// Surrogate key of this row; `0` until inserted.
    pub row_id: RowId,
    pub vocabulary_id: VocabularyId,
    pub target_id: i64,
    pub relation: R,
    pub start_date: i64,
    pub end_date: i64,
    pub modified_by: String,
}

impl<R: LinkRelation> VocabularyLink<R> {
    pub fn key(&self) -> LinkKey<R> {
        LinkKey {
            target_id: self.target_id,
            relation: self.relation,
        }
    }
}

impl<R> TemporalRecord for VocabularyLink<R> {
    fn start_date(&self) -> i64 {
        self.start_date
    }

    fn end_date(&self) -> i64 {
        self.end_date
    }

    fn set_start_date(&mut self, value: i64) {
        self.start_date = value;
    }

    fn set_end_date(&mut self, value: i64) {
        self.end_date = value;
    }
}

pub type RelatedEntityLink = VocabularyLink<RelatedEntityRelation>;
pub type RelatedVocabularyLink = VocabularyLink<RelatedVocabularyRelation>;
