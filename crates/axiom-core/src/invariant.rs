//! The invariant engine: cross-record and temporal rules checked before any
//! write reaches storage.
//!
//! Field shape is the entity layer's job; the checks here need knowledge of
//! what is already persisted, which they obtain through [`Lookup`]. Nothing
//! in this module performs I/O itself. Every check returns before a backend
//! writes anything, so a rejected operation leaves the store untouched.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  assumption::{Assumption, Confidence},
  entity::{Entity, EntityKind},
  intent::{Intent, IntentStatus, Link, LinkKind},
  policy::Policy,
  validate::{Problem, ValidationError, require_each, require_text},
};

// ─── Lookup ──────────────────────────────────────────────────────────────────

/// Read access to persisted state, as seen from inside the write that is
/// being validated.
pub trait Lookup {
  type Error: From<Error>;

  /// The kind of the record with this id, if any record has it.
  fn kind_of(&self, id: Uuid) -> Result<Option<EntityKind>, Self::Error>;

  /// Current status of an intent, or `None` when no intent has this id.
  fn intent_status(&self, id: Uuid) -> Result<Option<IntentStatus>, Self::Error>;
}

// ─── Mutations ───────────────────────────────────────────────────────────────

/// A requested change to an existing record.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
  /// Move an intent to a new status.
  SetStatus(IntentStatus),
  /// Attach a weak reference to an intent.
  Link { kind: LinkKind, target: String },
  /// Re-assess an assumption and stamp `last_validated_at`.
  Revalidate { confidence: f64 },
  /// Overwrite a single named field.
  Edit {
    field: String,
    value: serde_json::Value,
  },
  /// Remove the record. Never permitted.
  Delete,
}

impl Mutation {
  fn describe(&self) -> String {
    match self {
      Self::SetStatus(s) => format!("move to {s}"),
      Self::Link { kind, target } => format!("link {kind} {target:?}"),
      Self::Revalidate { .. } => "revalidate".to_owned(),
      Self::Edit { field, .. } => format!("rewrite {field}"),
      Self::Delete => "delete".to_owned(),
    }
  }
}

/// An approved write plan, produced by [`InvariantEngine::validate_mutation`]
/// and applied verbatim by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
  Status {
    intent_id: Uuid,
    from:      IntentStatus,
    to:        IntentStatus,
    at:        DateTime<Utc>,
  },
  Link {
    intent_id: Uuid,
    link:      Link,
  },
  Confidence {
    assumption_id: Uuid,
    confidence:    Confidence,
    /// Set when the change is a human revalidation.
    validated_at:  Option<DateTime<Utc>>,
  },
  ValidatedAt {
    assumption_id: Uuid,
    at:            DateTime<Utc>,
  },
}

// ─── Engine ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct InvariantEngine {
  policy: Policy,
}

impl InvariantEngine {
  pub fn new(policy: Policy) -> Self { Self { policy } }

  pub fn policy(&self) -> &Policy { &self.policy }

  /// Check a fully-built record against persisted state before it is
  /// inserted.
  ///
  /// The record's own fields are re-checked as well, so a value assembled by
  /// hand cannot slip past the entity layer.
  pub fn validate_creation<L: Lookup>(
    &self,
    lookup: &L,
    entity: &Entity,
  ) -> Result<(), L::Error> {
    check_shape(entity).map_err(Error::from)?;

    match entity {
      Entity::Intent(_) => Ok(()),
      Entity::Assumption(a) => {
        self.check_parent(lookup, a.intent_id, EntityKind::Assumption)
      }
      Entity::Decision(d) => {
        self.check_parent(lookup, d.intent_id, EntityKind::Decision)
      }
      Entity::Evidence(e) => {
        let expected = EntityKind::from(e.related_type);
        match lookup.kind_of(e.related_id)? {
          Some(found) if found == expected => Ok(()),
          _ => Err(Error::not_found(expected, e.related_id).into()),
        }
      }
    }
  }

  fn check_parent<L: Lookup>(
    &self,
    lookup: &L,
    intent_id: Uuid,
    child: EntityKind,
  ) -> Result<(), L::Error> {
    let status = lookup
      .intent_status(intent_id)?
      .ok_or_else(|| Error::not_found(EntityKind::Intent, intent_id))?;

    if !self.policy.accepts_children(status) {
      return Err(Error::ParentClosed { intent_id, status, child }.into());
    }
    Ok(())
  }

  /// Decide whether `mutation` may be applied to `current`, returning the
  /// exact change to persist.
  pub fn validate_mutation(
    &self,
    current: &Entity,
    mutation: Mutation,
    now: DateTime<Utc>,
  ) -> Result<Change> {
    let (kind, id) = (current.kind(), current.id());

    match current {
      Entity::Decision(_) | Entity::Evidence(_) => {
        Err(Error::immutable(kind, id, mutation.describe()))
      }
      Entity::Intent(intent) => self.mutate_intent(intent, mutation, now),
      Entity::Assumption(a) => mutate_assumption(a, mutation, now),
    }
  }

  fn mutate_intent(
    &self,
    intent: &Intent,
    mutation: Mutation,
    now: DateTime<Utc>,
  ) -> Result<Change> {
    let id = intent.intent_id;
    match mutation {
      Mutation::SetStatus(to) => self.transition(intent, to, now),
      Mutation::Edit { field, value } if field == "status" => {
        let to = serde_json::from_value(value).map_err(|_| {
          ValidationError::new(EntityKind::Intent, "status", Problem::WrongType {
            expected: "intent status",
          })
        })?;
        self.transition(intent, to, now)
      }
      Mutation::Link { kind, target } => {
        require_text(EntityKind::Intent, "links", &target)?;
        Ok(Change::Link {
          intent_id: id,
          link:      Link { kind, target, linked_at: now },
        })
      }
      other => Err(Error::immutable(EntityKind::Intent, id, other.describe())),
    }
  }

  fn transition(
    &self,
    intent: &Intent,
    to: IntentStatus,
    now: DateTime<Utc>,
  ) -> Result<Change> {
    let from = intent.status;
    if !self.policy.permits_transition(from, to) {
      return Err(Error::InvalidTransition { intent_id: intent.intent_id, from, to });
    }
    Ok(Change::Status { intent_id: intent.intent_id, from, to, at: now })
  }
}

fn mutate_assumption(
  a: &Assumption,
  mutation: Mutation,
  now: DateTime<Utc>,
) -> Result<Change> {
  let id = a.assumption_id;
  match mutation {
    Mutation::Revalidate { confidence } => Ok(Change::Confidence {
      assumption_id: id,
      confidence:    Confidence::new(confidence)?,
      validated_at:  Some(now),
    }),
    Mutation::Edit { field, value } if field == "confidence" => {
      let raw = value.as_f64().ok_or_else(|| {
        ValidationError::new(EntityKind::Assumption, "confidence", Problem::WrongType {
          expected: "number",
        })
      })?;
      Ok(Change::Confidence {
        assumption_id: id,
        confidence:    Confidence::new(raw)?,
        validated_at:  None,
      })
    }
    Mutation::Edit { field, value } if field == "last_validated_at" => {
      let at: DateTime<Utc> = serde_json::from_value(value).map_err(|_| {
        ValidationError::new(
          EntityKind::Assumption,
          "last_validated_at",
          Problem::WrongType { expected: "RFC 3339 timestamp" },
        )
      })?;
      if at < a.created_at {
        return Err(
          ValidationError::new(
            EntityKind::Assumption,
            "last_validated_at",
            Problem::BeforeCreation,
          )
          .into(),
        );
      }
      Ok(Change::ValidatedAt { assumption_id: id, at })
    }
    other => Err(Error::immutable(EntityKind::Assumption, id, other.describe())),
  }
}

/// Field-level checks on an already-built record.
fn check_shape(entity: &Entity) -> Result<(), ValidationError> {
  match entity {
    Entity::Intent(i) => {
      require_text(EntityKind::Intent, "title", &i.title)?;
      require_each(EntityKind::Intent, "constraints", &i.constraints)?;
      for link in &i.links {
        require_text(EntityKind::Intent, "links", &link.target)?;
      }
      if i.status != IntentStatus::Draft {
        return Err(ValidationError::new(
          EntityKind::Intent,
          "status",
          Problem::NotInitial,
        ));
      }
      Ok(())
    }
    Entity::Assumption(a) => {
      require_text(EntityKind::Assumption, "statement", &a.statement)?;
      require_text(EntityKind::Assumption, "risk_if_false", &a.risk_if_false)?;
      if a.last_validated_at.is_some_and(|at| at < a.created_at) {
        return Err(ValidationError::new(
          EntityKind::Assumption,
          "last_validated_at",
          Problem::BeforeCreation,
        ));
      }
      Confidence::new(a.confidence.get()).map(|_| ())
    }
    Entity::Decision(d) => {
      require_text(EntityKind::Decision, "summary", &d.summary)?;
      require_text(EntityKind::Decision, "rationale", &d.rationale)?;
      d.alternatives_considered.iter().try_for_each(|a| {
        require_text(EntityKind::Decision, "alternatives_considered", &a.option)
      })
    }
    Entity::Evidence(e) => {
      require_text(EntityKind::Evidence, "description", &e.description)
    }
  }
}
