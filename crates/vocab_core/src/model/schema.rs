//! Client-facing vocabulary tree.
//!
//! # Responsibility
//! - Describe a full vocabulary as submitted to `apply_changes` and as
//!   projected by `get_current` / `get_draft`.
//!
//! # Invariants
//! - `id` fields are `None` only for elements authored in the submission.
//! - `version_artefacts` and system access points are read-only: they are
//!   projected but never reconciled from a submission.

use crate::model::access_point::{
    AccessPoint, AccessPointData, AccessPointId, AccessPointSource, AccessPointType,
};
use crate::model::related::{
    LinkKey, LinkRelation, RelatedEntityId, RelatedEntityRelation, RelatedVocabularyRelation,
};
use crate::model::version::{Version, VersionData, VersionId, VersionStatus};
use crate::model::version_artefact::{
    VersionArtefact, VersionArtefactId, VersionArtefactStatus, VersionArtefactType,
};
use crate::model::vocabulary::{Vocabulary, VocabularyData, VocabularyId, VocabularyStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full vocabulary description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<VocabularyId>,
    pub status: VocabularyStatus,
    pub owner: String,
    pub slug: String,
    #[serde(flatten)]
    pub data: VocabularyData,
    #[serde(default)]
    pub versions: Vec<VersionTree>,
    #[serde(default)]
    pub related_entity_refs: Vec<RelatedRef<RelatedEntityRelation>>,
    #[serde(default)]
    pub related_vocabulary_refs: Vec<RelatedRef<RelatedVocabularyRelation>>,
}

impl VocabularyTree {
    pub(crate) fn from_row(row: &Vocabulary) -> Self {
        Self {
            id: Some(row.vocabulary_id),
            status: row.status,
            owner: row.owner.clone(),
            slug: row.slug.clone(),
            data: row.data.clone(),
            versions: Vec::new(),
            related_entity_refs: Vec::new(),
            related_vocabulary_refs: Vec::new(),
        }
    }

    /// Whether the root-row fields of `self` differ from `row`.
    pub(crate) fn differs_from(&self, row: &Vocabulary) -> bool {
        self.owner != row.owner
            || self.slug != row.slug
            || self.data != row.data
            || self.status != row.status
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<VersionId>,
    pub status: VersionStatus,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(flatten)]
    pub data: VersionData,
    /// Re-run every workflow step even when no flag changed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force_workflow: bool,
    #[serde(default)]
    pub access_points: Vec<AccessPointTree>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub version_artefacts: Vec<VersionArtefactTree>,
}

impl VersionTree {
    pub(crate) fn from_row(row: &Version) -> Self {
        Self {
            id: Some(row.version_id),
            status: row.status,
            slug: row.slug.clone(),
            release_date: row.release_date.clone(),
            data: row.data.clone(),
            force_workflow: false,
            access_points: Vec::new(),
            version_artefacts: Vec::new(),
        }
    }

    pub(crate) fn differs_from(&self, row: &Version) -> bool {
        self.status != row.status
            || self.slug != row.slug
            || self.release_date != row.release_date
            || self.data != row.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPointTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AccessPointId>,
    pub kind: AccessPointType,
    #[serde(default = "default_access_point_source")]
    pub source: AccessPointSource,
    #[serde(flatten)]
    pub data: AccessPointData,
}

fn default_access_point_source() -> AccessPointSource {
    AccessPointSource::User
}

impl AccessPointTree {
    pub(crate) fn from_row(row: &AccessPoint) -> Self {
        Self {
            id: Some(row.access_point_id),
            kind: row.kind,
            source: row.source,
            data: row.data.clone(),
        }
    }

    pub(crate) fn differs_from(&self, row: &AccessPoint) -> bool {
        self.kind != row.kind || self.data != row.data
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionArtefactTree {
    pub id: VersionArtefactId,
    pub kind: VersionArtefactType,
    pub status: VersionArtefactStatus,
    pub data: serde_json::Value,
}

impl VersionArtefactTree {
    pub(crate) fn from_row(row: &VersionArtefact) -> Self {
        Self {
            id: row.version_artefact_id,
            kind: row.kind,
            status: row.status,
            data: row.data.clone(),
        }
    }
}

/// All relations between the vocabulary and one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedRef<R> {
    pub id: RelatedEntityId,
    pub relations: Vec<R>,
}

/// Flattens refs into sorted, de-duplicated link keys.
pub(crate) fn flatten_refs<R: LinkRelation>(refs: &[RelatedRef<R>]) -> Vec<LinkKey<R>> {
    let mut keys: Vec<LinkKey<R>> = refs
        .iter()
        .flat_map(|item| {
            item.relations.iter().map(move |relation| LinkKey {
                target_id: item.id,
                relation: *relation,
            })
        })
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Groups sorted link keys back into refs ordered by target id.
pub(crate) fn group_refs<R: LinkRelation>(
    keys: impl IntoIterator<Item = LinkKey<R>>,
) -> Vec<RelatedRef<R>> {
    let mut grouped: BTreeMap<i64, Vec<R>> = BTreeMap::new();
    for key in keys {
        grouped.entry(key.target_id).or_default().push(key.relation);
    }
    grouped
        .into_iter()
        .map(|(id, mut relations)| {
            relations.sort();
            relations.dedup();
            RelatedRef { id, relations }
        })
        .collect()
}

/// Selects which child collections a projection includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeProjection {
    pub versions: bool,
    pub access_points: bool,
    pub version_artefacts: bool,
    pub related_entities: bool,
    pub related_vocabularies: bool,
}

impl Default for TreeProjection {
    fn default() -> Self {
        Self::full()
    }
}

impl TreeProjection {
    pub fn full() -> Self {
        Self {
            versions: true,
            access_points: true,
            version_artefacts: true,
            related_entities: true,
            related_vocabularies: true,
        }
    }

    /// Root row only.
    pub fn root_only() -> Self {
        Self {
            versions: false,
            access_points: false,
            version_artefacts: false,
            related_entities: false,
            related_vocabularies: false,
        }
    }
}
