//! The closed set of record kinds and a sum type over them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  assumption::Assumption,
  decision::Decision,
  evidence::Evidence,
  intent::Intent,
};

// ─── EntityKind ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
  Intent,
  Assumption,
  Decision,
  Evidence,
}

impl EntityKind {
  pub const ALL: [Self; 4] =
    [Self::Intent, Self::Assumption, Self::Decision, Self::Evidence];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Intent => "intent",
      Self::Assumption => "assumption",
      Self::Decision => "decision",
      Self::Evidence => "evidence",
    }
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// Any persisted record, as returned by fetch-by-id and listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
  Intent(Intent),
  Assumption(Assumption),
  Decision(Decision),
  Evidence(Evidence),
}

impl Entity {
  pub fn id(&self) -> Uuid {
    match self {
      Self::Intent(i) => i.intent_id,
      Self::Assumption(a) => a.assumption_id,
      Self::Decision(d) => d.decision_id,
      Self::Evidence(e) => e.evidence_id,
    }
  }

  pub fn kind(&self) -> EntityKind {
    match self {
      Self::Intent(_) => EntityKind::Intent,
      Self::Assumption(_) => EntityKind::Assumption,
      Self::Decision(_) => EntityKind::Decision,
      Self::Evidence(_) => EntityKind::Evidence,
    }
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    match self {
      Self::Intent(i) => i.created_at,
      Self::Assumption(a) => a.created_at,
      Self::Decision(d) => d.created_at,
      Self::Evidence(e) => e.recorded_at,
    }
  }

  pub fn into_intent(self) -> Option<Intent> {
    match self {
      Self::Intent(i) => Some(i),
      _ => None,
    }
  }

  pub fn into_assumption(self) -> Option<Assumption> {
    match self {
      Self::Assumption(a) => Some(a),
      _ => None,
    }
  }

  pub fn into_decision(self) -> Option<Decision> {
    match self {
      Self::Decision(d) => Some(d),
      _ => None,
    }
  }

  pub fn into_evidence(self) -> Option<Evidence> {
    match self {
      Self::Evidence(e) => Some(e),
      _ => None,
    }
  }
}

impl From<Intent> for Entity {
  fn from(v: Intent) -> Self { Self::Intent(v) }
}

impl From<Assumption> for Entity {
  fn from(v: Assumption) -> Self { Self::Assumption(v) }
}

impl From<Decision> for Entity {
  fn from(v: Decision) -> Self { Self::Decision(v) }
}

impl From<Evidence> for Entity {
  fn from(v: Evidence) -> Self { Self::Evidence(v) }
}
