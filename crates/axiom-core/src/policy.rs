//! Tunable rules for the invariant engine.

use serde::{Deserialize, Serialize};

use crate::intent::IntentStatus;

/// Lifecycle policy. Whatever the settings, a status never moves backward:
/// the options here only widen or narrow the set of forward moves and of
/// intents that accept new children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
  /// Permit `draft → satisfied` without passing through `active`.
  pub allow_draft_to_satisfied: bool,
  /// Intent statuses under which new assumptions and decisions are refused.
  pub closed_statuses:          Vec<IntentStatus>,
}

impl Default for Policy {
  fn default() -> Self {
    Self {
      allow_draft_to_satisfied: false,
      closed_statuses:          vec![IntentStatus::Invalidated],
    }
  }
}

impl Policy {
  pub fn permits_transition(&self, from: IntentStatus, to: IntentStatus) -> bool {
    use IntentStatus::*;
    match (from, to) {
      (Draft, Active)
      | (Draft, Invalidated)
      | (Active, Satisfied)
      | (Active, Invalidated) => true,
      (Draft, Satisfied) => self.allow_draft_to_satisfied,
      _ => false,
    }
  }

  pub fn accepts_children(&self, status: IntentStatus) -> bool {
    !self.closed_statuses.contains(&status)
  }
}
