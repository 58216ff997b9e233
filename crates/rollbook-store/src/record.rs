//! Record type: the single entity held by the store.
//!
//! A record is `(id, name, score)`. Its text encoding doubles as the
//! persisted line format:
//!
//! ```text
//! <id>,<name>,<score with exactly two decimals>
//! ```

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

/// Primary key type. Zero is representable but never valid.
pub type RecordId = u32;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

const FIELD_DELIMITER: char = ',';

/// One scored entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub score: f64,
}

impl Record {
    pub fn new(id: RecordId, name: impl Into<String>, score: f64) -> Self {
        Self {
            id,
            name: name.into(),
            score,
        }
    }

    /// Check the field constraints.
    ///
    /// Uniqueness is a property of the store, not of a single record, so
    /// `ValidationError::DuplicateId` is never produced here.
    ///
    /// Names must survive [`Record::decode`] unchanged: no line breaks and
    /// no surrounding whitespace.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id == 0 {
            return Err(ValidationError::NonPositiveId);
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankName);
        }
        if self.name.contains(['\n', '\r']) {
            return Err(ValidationError::NameContainsLineBreak);
        }
        if self.name.trim() != self.name {
            return Err(ValidationError::UntrimmedName);
        }
        // NaN fails the range check as well.
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.score) {
            return Err(ValidationError::ScoreOutOfRange { score: self.score });
        }
        Ok(())
    }

    /// Render the persisted line (without trailing newline).
    ///
    /// Names are written verbatim. A name containing `,` produces a line that
    /// [`Record::decode`] rejects on the next load.
    pub fn encode(&self) -> String {
        format!(
            "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{:.2}",
            self.id, self.name, self.score
        )
    }

    /// Parse one persisted line.
    ///
    /// The line must hold exactly three comma-separated fields, and the
    /// resulting record must satisfy [`Record::validate`].
    pub fn decode(line: &str) -> Result<Self, RecordParseError> {
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        let [id, name, score] = fields.as_slice() else {
            return Err(RecordParseError::FieldCount {
                found: fields.len(),
            });
        };

        let id = id.trim();
        let id: RecordId = id
            .parse()
            .map_err(|_| RecordParseError::InvalidId(id.to_string()))?;
        let score = score.trim();
        let score: f64 = score
            .parse()
            .map_err(|_| RecordParseError::InvalidScore(score.to_string()))?;

        let record = Self::new(id, name.trim(), score);
        record.validate()?;
        Ok(record)
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record{{id={}, name='{}', score={:.2}}}",
            self.id, self.name, self.score
        )
    }
}

/// Sort highest score first.
///
/// The sort is stable: equal scores keep their relative order.
pub fn sort_by_score_desc(records: &mut [Record]) {
    records.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// A record that violates a field constraint or collides with a resident id.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("id must be a positive integer")]
    NonPositiveId,

    #[error("name cannot be empty")]
    BlankName,

    #[error("name cannot contain a line break")]
    NameContainsLineBreak,

    #[error("name cannot start or end with whitespace")]
    UntrimmedName,

    #[error("score must be between 0 and 100, got {score}")]
    ScoreOutOfRange { score: f64 },

    #[error("duplicate record id: {0}")]
    DuplicateId(RecordId),
}

/// A persisted line that does not decode to a valid record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordParseError {
    #[error("expected 3 fields, found {found}")]
    FieldCount { found: usize },

    #[error("invalid id: {0:?}")]
    InvalidId(String),

    #[error("invalid score: {0:?}")]
    InvalidScore(String),

    #[error("line is not valid UTF-8")]
    NotUtf8,

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
