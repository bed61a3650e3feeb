//! Error types for `axiom-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{entity::EntityKind, intent::IntentStatus, validate::ValidationError};

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("{} not found: {id}", describe(.kind))]
  NotFound {
    /// `None` when the caller did not say which kind it expected.
    kind: Option<EntityKind>,
    id:   String,
  },

  #[error("prefix {prefix:?} is ambiguous ({matches} records match)")]
  AmbiguousPrefix { prefix: String, matches: usize },

  #[error("intent {intent_id} cannot move from {from} to {to}")]
  InvalidTransition {
    intent_id: Uuid,
    from:      IntentStatus,
    to:        IntentStatus,
  },

  #[error("{kind} {id} is immutable: cannot {action}")]
  ImmutabilityViolation {
    kind:   EntityKind,
    id:     Uuid,
    action: String,
  },

  #[error("intent {intent_id} is {status}; it no longer accepts new {child}s")]
  ParentClosed {
    intent_id: Uuid,
    status:    IntentStatus,
    child:     EntityKind,
  },
}

impl Error {
  pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
    Self::NotFound { kind: Some(kind), id: id.to_string() }
  }

  pub fn immutable(kind: EntityKind, id: Uuid, action: impl Into<String>) -> Self {
    Self::ImmutabilityViolation { kind, id, action: action.into() }
  }
}

fn describe(kind: &Option<EntityKind>) -> &'static str {
  kind.map_or("record", EntityKind::as_str)
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
