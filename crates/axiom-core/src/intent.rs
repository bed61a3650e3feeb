//! Intent: a tracked reason to change the system, independent of code.
//!
//! Intents are the only record whose lifecycle is expressed as a status. The
//! status only ever moves forward along `draft → active → {satisfied,
//! invalidated}`; intents are never deleted.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  entity::EntityKind,
  validate::{Problem, ValidationError, require_each, require_text},
};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
  Draft,
  Active,
  Satisfied,
  Invalidated,
}

impl IntentStatus {
  pub const ALL: [Self; 4] =
    [Self::Draft, Self::Active, Self::Satisfied, Self::Invalidated];

  /// Position in the partial order. The two terminal states share a rank and
  /// are incomparable with each other.
  pub fn rank(self) -> u8 {
    match self {
      Self::Draft => 0,
      Self::Active => 1,
      Self::Satisfied | Self::Invalidated => 2,
    }
  }

  pub fn is_terminal(self) -> bool { self.rank() == 2 }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::Active => "active",
      Self::Satisfied => "satisfied",
      Self::Invalidated => "invalidated",
    }
  }
}

impl fmt::Display for IntentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for IntentStatus {
  type Err = ValidationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|v| v.as_str() == s)
      .ok_or_else(|| {
        ValidationError::new(
          EntityKind::Intent,
          "status",
          Problem::UnknownVariant(s.to_owned()),
        )
      })
  }
}

// ─── Weak references ─────────────────────────────────────────────────────────

/// What a [`Link`] points at. Neither kind is resolved against the
/// version-control system; targets are opaque annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
  Commit,
  Path,
}

impl LinkKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Commit => "commit",
      Self::Path => "path",
    }
  }
}

impl fmt::Display for LinkKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A weak reference from an intent to a commit identifier or file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
  pub kind:      LinkKind,
  pub target:    String,
  pub linked_at: DateTime<Utc>,
}

// ─── Intent ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
  pub intent_id:       Uuid,
  pub title:           String,
  pub problem:         String,
  pub context:         String,
  pub constraints:     Vec<String>,
  pub status:          IntentStatus,
  pub created_at:      DateTime<Utc>,
  /// Bumped on every status change and every new link.
  pub last_updated_at: DateTime<Utc>,
  /// In the order they were linked.
  pub links:           Vec<Link>,
}

impl Intent {
  pub fn commits(&self) -> impl Iterator<Item = &str> {
    self.links_of(LinkKind::Commit)
  }

  pub fn paths(&self) -> impl Iterator<Item = &str> {
    self.links_of(LinkKind::Path)
  }

  pub fn is_linked(&self, kind: LinkKind, target: &str) -> bool {
    self.links_of(kind).any(|t| t == target)
  }

  fn links_of(&self, kind: LinkKind) -> impl Iterator<Item = &str> {
    self
      .links
      .iter()
      .filter(move |l| l.kind == kind)
      .map(|l| l.target.as_str())
  }
}

// ─── NewIntent ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::ReasoningStore::create_intent`].
///
/// Identity, timestamps and the initial `draft` status are assigned by the
/// store.
#[derive(Debug, Clone, Default)]
pub struct NewIntent {
  pub title:       String,
  pub problem:     String,
  pub context:     String,
  pub constraints: Vec<String>,
}

impl NewIntent {
  pub fn new(title: impl Into<String>) -> Self {
    Self { title: title.into(), ..Default::default() }
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    require_text(EntityKind::Intent, "title", &self.title)?;
    require_each(EntityKind::Intent, "constraints", &self.constraints)
  }

  /// Validate and build the persisted shape.
  pub fn into_intent(
    self,
    intent_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Intent, ValidationError> {
    self.validate()?;
    Ok(Intent {
      intent_id,
      title: self.title,
      problem: self.problem,
      context: self.context,
      constraints: self.constraints,
      status: IntentStatus::Draft,
      created_at: now,
      last_updated_at: now,
      links: Vec::new(),
    })
  }
}
