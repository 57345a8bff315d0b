//! Field-level interpretation of raw inventory values.
//!
//! Each raw record carries two nominally-timestamp columns, insert and
//! remove. In practice a column may hold a timestamp in one of several
//! formats, a known event tag (the scan tooling wrote fault codes into
//! whichever column was free), or nothing at all. This module interprets
//! single fields and classifies the resulting pair into an [`EventKind`].

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::scan::event::{canonicalize_tag, EventKind, EventTag};

/// Accepted timestamp formats, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// One raw timestamp-column value, interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Time(NaiveDateTime),
    Tag(EventTag),
    Missing,
}

/// Errors raised while interpreting or classifying a record's field pair.
/// These reject the record; they never abort the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unrecognized value in timestamp column: {value:?}")]
    UnknownTag { value: String },
    #[error("record carries no timestamp")]
    NoTimestamp,
    #[error("insert {insert} is after remove {remove}")]
    ReversedTimestamps {
        insert: NaiveDateTime,
        remove: NaiveDateTime,
    },
}

/// Try the accepted timestamp formats in order on the trimmed value.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Interpret one raw timestamp-column value. Empty and absent values are
/// Missing; otherwise the value must parse as a timestamp or map onto a
/// known event tag.
pub fn parse_field(raw: Option<&str>) -> Result<Field, ParseError> {
    let value = match raw {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Ok(Field::Missing),
    };
    if let Some(ts) = parse_timestamp(value) {
        return Ok(Field::Time(ts));
    }
    match canonicalize_tag(value) {
        Some(tag) => Ok(Field::Tag(tag)),
        None => Err(ParseError::UnknownTag {
            value: value.trim().to_string(),
        }),
    }
}

/// A record's field pair after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub kind: EventKind,
    pub insert: Option<NaiveDateTime>,
    pub remove: Option<NaiveDateTime>,
    pub tag: Option<EventTag>,
}

impl Classified {
    /// The record's single reference instant: the insert when present,
    /// else the remove. Every classified record has at least one.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.insert.or(self.remove)
    }
}

/// Classify the (insert, remove) field pair. Every accepted pair maps to
/// exactly one kind; pairs with no timestamp and reversed timestamp pairs
/// are rejected.
pub fn classify(insert: Field, remove: Field) -> Result<Classified, ParseError> {
    match (insert, remove) {
        (Field::Time(i), Field::Time(r)) => {
            if i < r {
                Ok(Classified {
                    kind: EventKind::Life,
                    insert: Some(i),
                    remove: Some(r),
                    tag: None,
                })
            } else if i == r {
                Ok(Classified {
                    kind: EventKind::ZeroLife,
                    insert: Some(i),
                    remove: Some(r),
                    tag: None,
                })
            } else {
                Err(ParseError::ReversedTimestamps {
                    insert: i,
                    remove: r,
                })
            }
        }
        (Field::Time(i), Field::Tag(t)) => Ok(Classified {
            kind: t.kind(),
            insert: Some(i),
            remove: None,
            tag: Some(t),
        }),
        (Field::Tag(t), Field::Time(r)) => Ok(Classified {
            kind: t.kind(),
            insert: None,
            remove: Some(r),
            tag: Some(t),
        }),
        (Field::Time(i), Field::Missing) => Ok(Classified {
            kind: EventKind::OpenEnd,
            insert: Some(i),
            remove: None,
            tag: None,
        }),
        (Field::Missing, Field::Time(r)) => Ok(Classified {
            kind: EventKind::OpenStart,
            insert: None,
            remove: Some(r),
            tag: None,
        }),
        (Field::Tag(_), Field::Tag(_))
        | (Field::Tag(_), Field::Missing)
        | (Field::Missing, Field::Tag(_))
        | (Field::Missing, Field::Missing) => Err(ParseError::NoTimestamp),
    }
}
