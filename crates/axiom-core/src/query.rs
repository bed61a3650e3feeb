//! Read-side composite queries built on [`ReasoningStore`] primitives.
//!
//! Nothing here mutates state. Any id passed in that does not resolve fails
//! with `NotFound` rather than producing an empty result.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
  assumption::Assumption,
  decision::Decision,
  entity::{Entity, EntityKind},
  evidence::{Evidence, EvidenceSource, RelatedKind},
  intent::{Intent, IntentStatus},
  store::ReasoningStore,
  validate::{Problem, ValidationError},
};

// ─── ListQuery ───────────────────────────────────────────────────────────────

/// Parameters for [`ReasoningStore::scan`] and [`ReasoningStore::list`].
///
/// Results are always in creation order.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
  pub kind:      EntityKind,
  /// Intents: their own status. Assumptions and decisions: the status of
  /// their parent intent.
  pub status:    Option<IntentStatus>,
  /// Assumptions and decisions owned by this intent.
  pub intent_id: Option<Uuid>,
  /// Evidence pointing at this record.
  pub related:   Option<(RelatedKind, Uuid)>,
  pub source:    Option<EvidenceSource>,
  pub limit:     Option<usize>,
}

impl ListQuery {
  pub fn of(kind: EntityKind) -> Self {
    Self {
      kind,
      status: None,
      intent_id: None,
      related: None,
      source: None,
      limit: None,
    }
  }

  pub fn with_status(mut self, status: IntentStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn owned_by(mut self, intent_id: Uuid) -> Self {
    self.intent_id = Some(intent_id);
    self
  }

  pub fn related_to(mut self, kind: RelatedKind, id: Uuid) -> Self {
    self.related = Some((kind, id));
    self
  }

  pub fn from_source(mut self, source: EvidenceSource) -> Self {
    self.source = Some(source);
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Reject filters that have no meaning for the listed kind.
  pub fn validate(&self) -> Result<(), ValidationError> {
    let owned = matches!(self.kind, EntityKind::Assumption | EntityKind::Decision);
    let evidence = self.kind == EntityKind::Evidence;

    let misplaced = [
      ("status", self.status.is_some() && evidence),
      ("intent_id", self.intent_id.is_some() && !owned),
      ("related", self.related.is_some() && !evidence),
      ("source", self.source.is_some() && !evidence),
    ];
    match misplaced.into_iter().find(|(_, bad)| *bad) {
      Some((field, _)) => {
        Err(ValidationError::new(self.kind, field, Problem::NotApplicable))
      }
      None => Ok(()),
    }
  }
}

// ─── Composite queries ───────────────────────────────────────────────────────

/// Everything an intent owns.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentChildren {
  pub intent:      Intent,
  pub assumptions: Vec<Assumption>,
  pub decisions:   Vec<Decision>,
}

/// Composite read operations available on every store.
pub trait Queries: ReasoningStore {
  fn intents_with_status(
    &self,
    status: IntentStatus,
  ) -> Result<Vec<Intent>, Self::Error> {
    let q = ListQuery::of(EntityKind::Intent).with_status(status);
    Ok(collect(self.list(&q)?, Entity::into_intent))
  }

  /// All assumptions of an intent, oldest first.
  fn assumptions_of(&self, intent_id: Uuid) -> Result<Vec<Assumption>, Self::Error> {
    let q = ListQuery::of(EntityKind::Assumption).owned_by(intent_id);
    Ok(collect(self.list(&q)?, Entity::into_assumption))
  }

  /// All decisions of an intent, oldest first. Later decisions supersede
  /// earlier ones conceptually; all are returned.
  fn decisions_of(&self, intent_id: Uuid) -> Result<Vec<Decision>, Self::Error> {
    let q = ListQuery::of(EntityKind::Decision).owned_by(intent_id);
    Ok(collect(self.list(&q)?, Entity::into_decision))
  }

  fn children_of(&self, intent_id: Uuid) -> Result<IntentChildren, Self::Error> {
    let intent = self
      .get(intent_id)?
      .into_intent()
      .ok_or_else(|| crate::Error::not_found(EntityKind::Intent, intent_id))?;
    Ok(IntentChildren {
      intent,
      assumptions: self.assumptions_of(intent_id)?,
      decisions: self.decisions_of(intent_id)?,
    })
  }

  /// Decisions across the store whose parent intent currently has `status`.
  fn decisions_with_intent_status(
    &self,
    status: IntentStatus,
  ) -> Result<Vec<Decision>, Self::Error> {
    let q = ListQuery::of(EntityKind::Decision).with_status(status);
    Ok(collect(self.list(&q)?, Entity::into_decision))
  }

  /// All evidence pointing at the given record.
  fn evidence_for(
    &self,
    kind: RelatedKind,
    id: Uuid,
  ) -> Result<Vec<Evidence>, Self::Error> {
    let q = ListQuery::of(EntityKind::Evidence).related_to(kind, id);
    Ok(collect(self.list(&q)?, Entity::into_evidence))
  }

  /// Assumptions not validated (or created, if never validated) within
  /// `max_age` of `now`. Informational; nothing is changed.
  fn aged_assumptions(
    &self,
    now: DateTime<Utc>,
    max_age: Duration,
  ) -> Result<Vec<Assumption>, Self::Error> {
    let mut aged = Vec::new();
    for entity in self.scan(&ListQuery::of(EntityKind::Assumption))? {
      if let Some(a) = entity?.into_assumption()
        && a.is_aged(now, max_age)
      {
        aged.push(a);
      }
    }
    Ok(aged)
  }
}

impl<S: ReasoningStore> Queries for S {}

fn collect<T>(entities: Vec<Entity>, pick: fn(Entity) -> Option<T>) -> Vec<T> {
  entities.into_iter().filter_map(pick).collect()
}
