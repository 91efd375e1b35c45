//! Temporal classification for registry rows.
//!
//! # Responsibility
//! - Classify a row as current, historical, draft or unknown from its
//!   `start_date`/`end_date` pair alone.
//! - Build the timestamp pairs that move a row into each state.
//!
//! # Invariants
//! - At most one row per logical identity carries `CURRENTLY_VALID_END_DATE`.
//! - Draft rows start at `DRAFT_START_DATE`, strictly after the current
//!   sentinel, so no status column is needed to tell them apart.
//! - A row whose `end_date` equals `now` is historical (closed boundary).
//! - Historical rows are never moved back into another state.
//!
//! All timestamps are Unix epoch milliseconds.

use std::fmt::{Display, Formatter};

/// 9999-12-01T00:00:00Z: `end_date` of every currently valid row.
pub const CURRENTLY_VALID_END_DATE: i64 = 253_399_622_400_000;

/// 9999-12-02T00:00:00Z: `start_date` of every draft row.
pub const DRAFT_START_DATE: i64 = 253_399_708_800_000;

/// 9999-12-03T00:00:00Z: `end_date` of a draft proposing an addition or a
/// modification.
pub const DRAFT_ADDITION_MODIFICATION_END_DATE: i64 = 253_399_795_200_000;

/// 9999-12-04T00:00:00Z: `end_date` of a draft proposing a deletion. Only
/// link rows use it.
pub const DRAFT_DELETION_END_DATE: i64 = 253_399_881_600_000;

/// Temporal state of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemporalMeaning {
    Current,
    Historical,
    Draft,
    Unknown,
}

impl Display for TemporalMeaning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Current => "CURRENT",
            Self::Historical => "HISTORICAL",
            Self::Draft => "DRAFT",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// What a draft row proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKind {
    AdditionOrModification,
    Deletion,
}

/// Access to the validity interval of a persisted row.
pub trait TemporalRecord {
    fn start_date(&self) -> i64;
    fn end_date(&self) -> i64;
    fn set_start_date(&mut self, value: i64);
    fn set_end_date(&mut self, value: i64);
}

/// Classifies `record` relative to `now`.
pub fn classify(record: &impl TemporalRecord, now: i64) -> TemporalMeaning {
    classify_dates(record.start_date(), record.end_date(), now)
}

/// Classifies a raw `(start_date, end_date)` pair relative to `now`.
pub fn classify_dates(start_date: i64, end_date: i64, now: i64) -> TemporalMeaning {
    if start_date > CURRENTLY_VALID_END_DATE {
        return if start_date == DRAFT_START_DATE && draft_kind_for_end(end_date).is_some() {
            TemporalMeaning::Draft
        } else {
            TemporalMeaning::Unknown
        };
    }
    if end_date == CURRENTLY_VALID_END_DATE {
        return if start_date <= now {
            TemporalMeaning::Current
        } else {
            TemporalMeaning::Unknown
        };
    }
    if start_date <= end_date && end_date <= now {
        return TemporalMeaning::Historical;
    }
    TemporalMeaning::Unknown
}

/// Returns what a draft row proposes, or `None` for non-draft rows.
pub fn draft_kind(record: &impl TemporalRecord) -> Option<DraftKind> {
    if record.start_date() != DRAFT_START_DATE {
        return None;
    }
    draft_kind_for_end(record.end_date())
}

fn draft_kind_for_end(end_date: i64) -> Option<DraftKind> {
    match end_date {
        DRAFT_ADDITION_MODIFICATION_END_DATE => Some(DraftKind::AdditionOrModification),
        DRAFT_DELETION_END_DATE => Some(DraftKind::Deletion),
        _ => None,
    }
}

/// Closes the validity interval of a current row at `now`.
pub fn make_historical(record: &mut impl TemporalRecord, now: i64) {
    record.set_end_date(now);
}

/// Opens a new validity interval starting at `now`.
pub fn make_current(record: &mut impl TemporalRecord, now: i64) {
    record.set_start_date(now);
    record.set_end_date(CURRENTLY_VALID_END_DATE);
}

/// Marks a row as a draft addition or modification.
pub fn make_draft(record: &mut impl TemporalRecord) {
    record.set_start_date(DRAFT_START_DATE);
    record.set_end_date(DRAFT_ADDITION_MODIFICATION_END_DATE);
}

/// Marks a row as a draft deletion proposal.
pub fn make_draft_deletion(record: &mut impl TemporalRecord) {
    record.set_start_date(DRAFT_START_DATE);
    record.set_end_date(DRAFT_DELETION_END_DATE);
}

/// Implements [`TemporalRecord`] for row structs with `start_date` and
/// `end_date` fields.
macro_rules! impl_temporal_record {
    ($($row:ty),+ $(,)?) => {
        $(
            impl $crate::model::temporal::TemporalRecord for $row {
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
        )+
    };
}

pub(crate) use impl_temporal_record;
