//! Assumption: a belief recorded against an intent that may turn out false.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  entity::EntityKind,
  validate::{ValidationError, require_text, require_unit_interval},
};

// ─── Confidence ──────────────────────────────────────────────────────────────

/// A probability in `[0.0, 1.0]`. Out-of-range input is rejected, never
/// clamped.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
  pub fn new(value: f64) -> Result<Self, ValidationError> {
    require_unit_interval(EntityKind::Assumption, "confidence", value)?;
    Ok(Self(value))
  }

  pub fn get(self) -> f64 { self.0 }
}

impl TryFrom<f64> for Confidence {
  type Error = ValidationError;

  fn try_from(value: f64) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Confidence> for f64 {
  fn from(c: Confidence) -> Self { c.0 }
}

impl fmt::Display for Confidence {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:.2}", self.0)
  }
}

// ─── Assumption ──────────────────────────────────────────────────────────────

/// Only `confidence` and `last_validated_at` ever change after creation, and
/// only through an explicit revalidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumption {
  pub assumption_id:     Uuid,
  pub intent_id:         Uuid,
  pub statement:         String,
  pub confidence:        Confidence,
  pub risk_if_false:     String,
  pub created_at:        DateTime<Utc>,
  pub last_validated_at: Option<DateTime<Utc>>,
}

impl Assumption {
  /// Time since the assumption was last looked at by a human, falling back to
  /// its creation when it has never been revalidated.
  pub fn age(&self, now: DateTime<Utc>) -> Duration {
    now - self.last_validated_at.unwrap_or(self.created_at)
  }

  /// Informational only; aged assumptions are never removed or changed.
  pub fn is_aged(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
    self.age(now) > max_age
  }
}

// ─── NewAssumption ───────────────────────────────────────────────────────────

/// Input to [`crate::store::ReasoningStore::create_assumption`].
#[derive(Debug, Clone)]
pub struct NewAssumption {
  pub intent_id:     Uuid,
  pub statement:     String,
  /// Raw value; checked against `[0.0, 1.0]` on validation.
  pub confidence:    f64,
  pub risk_if_false: String,
}

impl NewAssumption {
  pub fn new(
    intent_id: Uuid,
    statement: impl Into<String>,
    confidence: f64,
    risk_if_false: impl Into<String>,
  ) -> Self {
    Self {
      intent_id,
      statement: statement.into(),
      confidence,
      risk_if_false: risk_if_false.into(),
    }
  }

  pub fn validate(&self) -> Result<Confidence, ValidationError> {
    require_text(EntityKind::Assumption, "statement", &self.statement)?;
    require_text(EntityKind::Assumption, "risk_if_false", &self.risk_if_false)?;
    Confidence::new(self.confidence)
  }

  pub fn into_assumption(
    self,
    assumption_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Assumption, ValidationError> {
    let confidence = self.validate()?;
    Ok(Assumption {
      assumption_id,
      intent_id: self.intent_id,
      statement: self.statement,
      confidence,
      risk_if_false: self.risk_if_false,
      created_at: now,
      last_validated_at: None,
    })
  }
}
