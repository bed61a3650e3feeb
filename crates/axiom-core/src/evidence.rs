//! Evidence: an immutable observation attached to one other record.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  entity::EntityKind,
  validate::{Problem, ValidationError, require_text},
};

/// The kinds of record evidence may point at. Evidence about evidence is not
/// representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedKind {
  Intent,
  Assumption,
  Decision,
}

impl RelatedKind {
  pub const ALL: [Self; 3] = [Self::Intent, Self::Assumption, Self::Decision];

  pub fn as_str(self) -> &'static str { EntityKind::from(self).as_str() }
}

impl From<RelatedKind> for EntityKind {
  fn from(k: RelatedKind) -> Self {
    match k {
      RelatedKind::Intent => Self::Intent,
      RelatedKind::Assumption => Self::Assumption,
      RelatedKind::Decision => Self::Decision,
    }
  }
}

impl fmt::Display for RelatedKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RelatedKind {
  type Err = ValidationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|k| k.as_str() == s)
      .ok_or_else(|| {
        ValidationError::new(
          EntityKind::Evidence,
          "related_type",
          Problem::UnknownVariant(s.to_owned()),
        )
      })
  }
}

/// Where an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
  Commit,
  Issue,
  Metric,
  UserReport,
  Manual,
}

impl EvidenceSource {
  pub const ALL: [Self; 5] = [
    Self::Commit,
    Self::Issue,
    Self::Metric,
    Self::UserReport,
    Self::Manual,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Commit => "commit",
      Self::Issue => "issue",
      Self::Metric => "metric",
      Self::UserReport => "user_report",
      Self::Manual => "manual",
    }
  }
}

impl fmt::Display for EvidenceSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EvidenceSource {
  type Err = ValidationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|v| v.as_str() == s)
      .ok_or_else(|| {
        ValidationError::new(
          EntityKind::Evidence,
          "source",
          Problem::UnknownVariant(s.to_owned()),
        )
      })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
  pub evidence_id:  Uuid,
  pub related_type: RelatedKind,
  pub related_id:   Uuid,
  pub description:  String,
  pub source:       EvidenceSource,
  /// Store-assigned; the evidence timestamp.
  pub recorded_at:  DateTime<Utc>,
}

/// Input to [`crate::store::ReasoningStore::create_evidence`].
#[derive(Debug, Clone)]
pub struct NewEvidence {
  pub related_type: RelatedKind,
  pub related_id:   Uuid,
  pub description:  String,
  pub source:       EvidenceSource,
}

impl NewEvidence {
  pub fn new(
    related_type: RelatedKind,
    related_id: Uuid,
    description: impl Into<String>,
    source: EvidenceSource,
  ) -> Self {
    Self { related_type, related_id, description: description.into(), source }
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    require_text(EntityKind::Evidence, "description", &self.description)
  }

  pub fn into_evidence(
    self,
    evidence_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Evidence, ValidationError> {
    self.validate()?;
    Ok(Evidence {
      evidence_id,
      related_type: self.related_type,
      related_id: self.related_id,
      description: self.description,
      source: self.source,
      recorded_at: now,
    })
  }
}
