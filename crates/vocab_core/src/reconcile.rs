//! Ordered-sequence reconciliation.
//!
//! # Responsibility
//! - Align an existing and a desired sequence of identity-bearing elements
//!   with a longest-common-subsequence diff.
//! - Produce a Keep/Delete/Insert edit script and dispatch it, in script
//!   order, to a caller-supplied visitor.
//!
//! # Invariants
//! - Existing elements always carry an identity; desired elements may not
//!   (newly authored children), and those never match anything.
//! - Both inputs are sorted by identity, strictly increasing, with
//!   identity-less desired elements last. Violations are programming
//!   errors and are reported, never repaired.
//! - Payload is ignored: a Keep only says both sides share an identity.

use similar::{capture_diff_slices, Algorithm, DiffOp};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

/// Element that may carry a comparable identity.
pub trait Identified {
    type Key: Ord + Hash + Clone + Debug;

    fn identity(&self) -> Option<Self::Key>;
}

/// One step of an edit script, by index into the reconciled slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    Keep { existing: usize, desired: usize },
    Delete { existing: usize },
    Insert { desired: usize },
}

/// Which input sequence an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Existing,
    Desired,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Existing => f.write_str("existing"),
            Self::Desired => f.write_str("desired"),
        }
    }
}

/// Malformed reconciler input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// An existing element has no identity.
    MissingIdentity { index: usize },
    /// Identities are not in increasing order, or an identified element
    /// follows an identity-less one.
    Unsorted { side: Side, index: usize },
    /// Two elements of one side share an identity.
    DuplicateIdentity { side: Side, index: usize },
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingIdentity { index } => {
                write!(f, "existing element {index} has no identity")
            }
            Self::Unsorted { side, index } => {
                write!(f, "{side} sequence is not sorted at element {index}")
            }
            Self::DuplicateIdentity { side, index } => {
                write!(f, "{side} sequence repeats an identity at element {index}")
            }
        }
    }
}

impl Error for ReconcileError {}

/// Receives the edit script of one reconciliation, one call per op.
pub trait EditVisitor<A, B> {
    type Error: From<ReconcileError>;

    fn keep(&mut self, existing: &A, desired: &B) -> Result<(), Self::Error>;
    fn delete(&mut self, existing: &A) -> Result<(), Self::Error>;
    fn insert(&mut self, desired: &B) -> Result<(), Self::Error>;
}

#[derive(PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Slot<K> {
    Known(K),
    /// Identity-less desired element; unique per position.
    Fresh(usize),
}

/// Computes the edit script turning `existing` into `desired`.
pub fn diff<A, B>(existing: &[A], desired: &[B]) -> Result<Vec<EditOp>, ReconcileError>
where
    A: Identified,
    B: Identified<Key = A::Key>,
{
    let old = existing_slots(existing)?;
    let new = desired_slots(desired)?;

    let mut script = Vec::with_capacity(old.len().max(new.len()));
    for op in capture_diff_slices(Algorithm::Lcs, &old, &new) {
        match op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => script.extend((0..len).map(|offset| EditOp::Keep {
                existing: old_index + offset,
                desired: new_index + offset,
            })),
            DiffOp::Delete {
                old_index, old_len, ..
            } => script.extend((old_index..old_index + old_len).map(|existing| {
                EditOp::Delete { existing }
            })),
            DiffOp::Insert {
                new_index, new_len, ..
            } => script.extend(
                (new_index..new_index + new_len).map(|desired| EditOp::Insert { desired }),
            ),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                script.extend(
                    (old_index..old_index + old_len).map(|existing| EditOp::Delete { existing }),
                );
                script.extend(
                    (new_index..new_index + new_len).map(|desired| EditOp::Insert { desired }),
                );
            }
        }
    }
    Ok(script)
}

/// Diffs `existing` against `desired` and feeds every op to `visitor`.
pub fn reconcile<A, B, V>(existing: &[A], desired: &[B], visitor: &mut V) -> Result<(), V::Error>
where
    A: Identified,
    B: Identified<Key = A::Key>,
    V: EditVisitor<A, B>,
{
    for op in diff(existing, desired)? {
        match op {
            EditOp::Keep {
                existing: old,
                desired: new,
            } => visitor.keep(&existing[old], &desired[new])?,
            EditOp::Delete { existing: old } => visitor.delete(&existing[old])?,
            EditOp::Insert { desired: new } => visitor.insert(&desired[new])?,
        }
    }
    Ok(())
}

fn existing_slots<A: Identified>(existing: &[A]) -> Result<Vec<Slot<A::Key>>, ReconcileError> {
    let mut slots = Vec::with_capacity(existing.len());
    let mut previous: Option<A::Key> = None;
    for (index, element) in existing.iter().enumerate() {
        let key = element
            .identity()
            .ok_or(ReconcileError::MissingIdentity { index })?;
        check_order(previous.as_ref(), &key, Side::Existing, index)?;
        previous = Some(key.clone());
        slots.push(Slot::Known(key));
    }
    Ok(slots)
}

fn desired_slots<B: Identified>(desired: &[B]) -> Result<Vec<Slot<B::Key>>, ReconcileError> {
    let mut slots = Vec::with_capacity(desired.len());
    let mut previous: Option<B::Key> = None;
    let mut seen_fresh = false;
    for (index, element) in desired.iter().enumerate() {
        match element.identity() {
            Some(key) => {
                if seen_fresh {
                    return Err(ReconcileError::Unsorted {
                        side: Side::Desired,
                        index,
                    });
                }
                check_order(previous.as_ref(), &key, Side::Desired, index)?;
                previous = Some(key.clone());
                slots.push(Slot::Known(key));
            }
            None => {
                seen_fresh = true;
                slots.push(Slot::Fresh(index));
            }
        }
    }
    Ok(slots)
}

fn check_order<K: Ord>(
    previous: Option<&K>,
    key: &K,
    side: Side,
    index: usize,
) -> Result<(), ReconcileError> {
    match previous {
        Some(previous) if previous == key => {
            Err(ReconcileError::DuplicateIdentity { side, index })
        }
        Some(previous) if previous > key => Err(ReconcileError::Unsorted { side, index }),
        _ => Ok(()),
    }
}
