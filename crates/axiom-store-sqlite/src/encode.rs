//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Ordered lists (constraints,
//! alternatives) are stored as compact JSON. UUIDs are stored as hyphenated
//! lowercase strings.

use std::str::FromStr;

use axiom_core::{
  assumption::{Assumption, Confidence},
  decision::{Alternative, Decision},
  entity::EntityKind,
  evidence::{Evidence, EvidenceSource, RelatedKind},
  intent::{Intent, IntentStatus, Link, LinkKind},
};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

/// Parse a stored enum discriminant. A failure here means the database holds
/// something no build ever wrote, so it is a decode error rather than a
/// validation error.
fn decode_enum<T>(s: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  s.parse().map_err(|e: T::Err| Error::Decode(e.to_string()))
}

pub fn decode_kind(s: &str) -> Result<EntityKind> {
  EntityKind::ALL
    .into_iter()
    .find(|k| k.as_str() == s)
    .ok_or_else(|| Error::Decode(format!("unknown entity kind: {s:?}")))
}

fn decode_link_kind(s: &str) -> Result<LinkKind> {
  match s {
    "commit" => Ok(LinkKind::Commit),
    "path" => Ok(LinkKind::Path),
    other => Err(Error::Decode(format!("unknown link kind: {other:?}"))),
  }
}

// ─── JSON lists ──────────────────────────────────────────────────────────────

pub fn encode_strings(values: &[String]) -> Result<String> {
  Ok(serde_json::to_string(values)?)
}

pub fn encode_alternatives(values: &[Alternative]) -> Result<String> {
  Ok(serde_json::to_string(values)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read from an `intents` row joined with the registry.
pub struct RawIntent {
  pub entity_id:       String,
  pub title:           String,
  pub problem:         String,
  pub context:         String,
  pub constraints:     String,
  pub status:          String,
  pub created_at:      String,
  pub last_updated_at: String,
}

pub const INTENT_COLUMNS: &str = "i.entity_id, i.title, i.problem, i.context, \
   i.constraints, i.status, e.created_at, i.last_updated_at";

impl RawIntent {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:       row.get(0)?,
      title:           row.get(1)?,
      problem:         row.get(2)?,
      context:         row.get(3)?,
      constraints:     row.get(4)?,
      status:          row.get(5)?,
      created_at:      row.get(6)?,
      last_updated_at: row.get(7)?,
    })
  }

  pub fn into_intent(self, links: Vec<Link>) -> Result<Intent> {
    Ok(Intent {
      intent_id: decode_uuid(&self.entity_id)?,
      title: self.title,
      problem: self.problem,
      context: self.context,
      constraints: serde_json::from_str(&self.constraints)?,
      status: decode_enum::<IntentStatus>(&self.status)?,
      created_at: decode_dt(&self.created_at)?,
      last_updated_at: decode_dt(&self.last_updated_at)?,
      links,
    })
  }
}

/// Raw strings read from an `intent_links` row.
pub struct RawLink {
  pub kind:      String,
  pub target:    String,
  pub linked_at: String,
}

impl RawLink {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { kind: row.get(0)?, target: row.get(1)?, linked_at: row.get(2)? })
  }

  pub fn into_link(self) -> Result<Link> {
    Ok(Link {
      kind:      decode_link_kind(&self.kind)?,
      target:    self.target,
      linked_at: decode_dt(&self.linked_at)?,
    })
  }
}

pub struct RawAssumption {
  pub entity_id:         String,
  pub intent_id:         String,
  pub statement:         String,
  pub confidence:        f64,
  pub risk_if_false:     String,
  pub created_at:        String,
  pub last_validated_at: Option<String>,
}

pub const ASSUMPTION_COLUMNS: &str = "a.entity_id, a.intent_id, a.statement, \
   a.confidence, a.risk_if_false, e.created_at, a.last_validated_at";

impl RawAssumption {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:         row.get(0)?,
      intent_id:         row.get(1)?,
      statement:         row.get(2)?,
      confidence:        row.get(3)?,
      risk_if_false:     row.get(4)?,
      created_at:        row.get(5)?,
      last_validated_at: row.get(6)?,
    })
  }

  pub fn into_assumption(self) -> Result<Assumption> {
    Ok(Assumption {
      assumption_id:     decode_uuid(&self.entity_id)?,
      intent_id:         decode_uuid(&self.intent_id)?,
      statement:         self.statement,
      confidence:        Confidence::new(self.confidence)
        .map_err(|e| Error::Decode(e.to_string()))?,
      risk_if_false:     self.risk_if_false,
      created_at:        decode_dt(&self.created_at)?,
      last_validated_at: self
        .last_validated_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
    })
  }
}

pub struct RawDecision {
  pub entity_id:    String,
  pub intent_id:    String,
  pub summary:      String,
  pub rationale:    String,
  pub alternatives: String,
  pub tradeoffs:    String,
  pub created_at:   String,
}

pub const DECISION_COLUMNS: &str = "d.entity_id, d.intent_id, d.summary, \
   d.rationale, d.alternatives, d.tradeoffs, e.created_at";

impl RawDecision {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:    row.get(0)?,
      intent_id:    row.get(1)?,
      summary:      row.get(2)?,
      rationale:    row.get(3)?,
      alternatives: row.get(4)?,
      tradeoffs:    row.get(5)?,
      created_at:   row.get(6)?,
    })
  }

  pub fn into_decision(self) -> Result<Decision> {
    Ok(Decision {
      decision_id:             decode_uuid(&self.entity_id)?,
      intent_id:               decode_uuid(&self.intent_id)?,
      summary:                 self.summary,
      rationale:               self.rationale,
      alternatives_considered: serde_json::from_str(&self.alternatives)?,
      tradeoffs:               self.tradeoffs,
      created_at:              decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawEvidence {
  pub entity_id:    String,
  pub related_type: String,
  pub related_id:   String,
  pub description:  String,
  pub source:       String,
  pub recorded_at:  String,
}

pub const EVIDENCE_COLUMNS: &str = "v.entity_id, v.related_type, v.related_id, \
   v.description, v.source, e.created_at";

impl RawEvidence {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entity_id:    row.get(0)?,
      related_type: row.get(1)?,
      related_id:   row.get(2)?,
      description:  row.get(3)?,
      source:       row.get(4)?,
      recorded_at:  row.get(5)?,
    })
  }

  pub fn into_evidence(self) -> Result<Evidence> {
    Ok(Evidence {
      evidence_id:  decode_uuid(&self.entity_id)?,
      related_type: decode_enum::<RelatedKind>(&self.related_type)?,
      related_id:   decode_uuid(&self.related_id)?,
      description:  self.description,
      source:       decode_enum::<EvidenceSource>(&self.source)?,
      recorded_at:  decode_dt(&self.recorded_at)?,
    })
  }
}
