//! Encoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings,
//! booleans integers. Enum columns store the `as_str` form and fall
//! back to their lenient `parse` on the way out.

use chrono::{DateTime, Utc};
use pathway_core::activity::{AdaptiveSessionRow, AdaptiveSessionStatus};
use uuid::Uuid;

use crate::{Error, Result};

/// SQLite's default parameter limit leaves headroom above this, so one
/// `IN` chunk never risks `too many SQL variables`.
pub const IN_CHUNK: usize = 90;

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Raw rows ────────────────────────────────────────────────────────────────
// Queried as plain text inside the connection closure, decoded outside
// it so decode failures surface as our error type.

pub struct RawAdaptiveSession {
  pub id:                      String,
  pub section_id:              String,
  pub status:                  String,
  pub current_question_number: i64,
  pub created_at:              Option<String>,
  pub updated_at:              Option<String>,
}

impl RawAdaptiveSession {
  pub fn into_row(self) -> Result<AdaptiveSessionRow> {
    Ok(AdaptiveSessionRow {
      id:                      self.id,
      section_id:              self.section_id,
      // Unknown statuses never count toward requirements.
      status:                  AdaptiveSessionStatus::parse(&self.status)
        .unwrap_or(AdaptiveSessionStatus::InProgress),
      current_question_number: self.current_question_number,
      created_at:              self.created_at.as_deref().map(decode_dt).transpose()?,
      updated_at:              self.updated_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
