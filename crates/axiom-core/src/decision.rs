//! Decision: an append-only, committed choice recorded against an intent.
//!
//! A decision is never edited or removed. Changing course means recording a
//! new decision against the same intent; the earlier one stays as history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  entity::EntityKind,
  validate::{ValidationError, require_text},
};

/// An option that was weighed and not taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
  pub option:          String,
  pub reason_rejected: String,
}

impl Alternative {
  pub fn new(option: impl Into<String>, reason_rejected: impl Into<String>) -> Self {
    Self { option: option.into(), reason_rejected: reason_rejected.into() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
  pub decision_id:             Uuid,
  pub intent_id:               Uuid,
  pub summary:                 String,
  pub rationale:               String,
  pub alternatives_considered: Vec<Alternative>,
  pub tradeoffs:               String,
  pub created_at:              DateTime<Utc>,
}

/// Input to [`crate::store::ReasoningStore::create_decision`].
#[derive(Debug, Clone)]
pub struct NewDecision {
  pub intent_id:               Uuid,
  pub summary:                 String,
  pub rationale:               String,
  pub alternatives_considered: Vec<Alternative>,
  pub tradeoffs:               String,
}

impl NewDecision {
  pub fn new(
    intent_id: Uuid,
    summary: impl Into<String>,
    rationale: impl Into<String>,
  ) -> Self {
    Self {
      intent_id,
      summary: summary.into(),
      rationale: rationale.into(),
      alternatives_considered: Vec::new(),
      tradeoffs: String::new(),
    }
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    require_text(EntityKind::Decision, "summary", &self.summary)?;
    require_text(EntityKind::Decision, "rationale", &self.rationale)?;
    self
      .alternatives_considered
      .iter()
      .try_for_each(|a| {
        require_text(EntityKind::Decision, "alternatives_considered", &a.option)
      })
  }

  pub fn into_decision(
    self,
    decision_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Decision, ValidationError> {
    self.validate()?;
    Ok(Decision {
      decision_id,
      intent_id: self.intent_id,
      summary: self.summary,
      rationale: self.rationale,
      alternatives_considered: self.alternatives_considered,
      tradeoffs: self.tradeoffs,
      created_at: now,
    })
  }
}
