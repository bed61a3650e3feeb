//! Unit tests for the entity layer and the invariant engine, run against an
//! in-memory [`Lookup`].

use std::collections::HashMap;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
  Error,
  assumption::{Confidence, NewAssumption},
  decision::{Alternative, NewDecision},
  entity::{Entity, EntityKind},
  evidence::{EvidenceSource, NewEvidence, RelatedKind},
  intent::{IntentStatus, LinkKind, NewIntent},
  invariant::{Change, InvariantEngine, Lookup, Mutation},
  policy::Policy,
  query::ListQuery,
  validate::Problem,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Memory {
  kinds:    HashMap<Uuid, EntityKind>,
  statuses: HashMap<Uuid, IntentStatus>,
}

impl Memory {
  fn with_intent(mut self, id: Uuid, status: IntentStatus) -> Self {
    self.kinds.insert(id, EntityKind::Intent);
    self.statuses.insert(id, status);
    self
  }

  fn with(mut self, id: Uuid, kind: EntityKind) -> Self {
    self.kinds.insert(id, kind);
    self
  }
}

impl Lookup for Memory {
  type Error = Error;

  fn kind_of(&self, id: Uuid) -> Result<Option<EntityKind>, Error> {
    Ok(self.kinds.get(&id).copied())
  }

  fn intent_status(&self, id: Uuid) -> Result<Option<IntentStatus>, Error> {
    Ok(self.statuses.get(&id).copied())
  }
}

fn now() -> chrono::DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn intent(status: IntentStatus) -> Entity {
  let mut i = NewIntent::new("Reduce cold-start latency")
    .into_intent(Uuid::new_v4(), now())
    .unwrap();
  i.status = status;
  Entity::Intent(i)
}

fn assumption() -> Entity {
  NewAssumption::new(Uuid::new_v4(), "cache warms within 5s", 0.6, "p99 regresses")
    .into_assumption(Uuid::new_v4(), now())
    .unwrap()
    .into()
}

fn decision() -> Entity {
  NewDecision::new(Uuid::new_v4(), "adopt pre-warming", "cheapest fix")
    .into_decision(Uuid::new_v4(), now())
    .unwrap()
    .into()
}

// ─── Entity layer ────────────────────────────────────────────────────────────

#[test]
fn new_intent_starts_as_draft() {
  let mut input = NewIntent::new("Ship search");
  input.constraints = vec!["no new services".into()];
  let i = input.into_intent(Uuid::new_v4(), now()).unwrap();

  assert_eq!(i.status, IntentStatus::Draft);
  assert_eq!(i.created_at, i.last_updated_at);
  assert!(i.links.is_empty());
}

#[test]
fn blank_title_is_rejected() {
  let err = NewIntent::new("   ")
    .into_intent(Uuid::new_v4(), now())
    .unwrap_err();
  assert_eq!(err.entity, EntityKind::Intent);
  assert_eq!(err.field, "title");
  assert_eq!(err.problem, Problem::Blank);
}

#[test]
fn blank_constraint_is_rejected() {
  let mut input = NewIntent::new("Ship search");
  input.constraints = vec!["fine".into(), "".into()];
  let err = input.validate().unwrap_err();
  assert_eq!(err.field, "constraints");
}

#[test]
fn confidence_bounds_are_inclusive() {
  assert!(Confidence::new(0.0).is_ok());
  assert!(Confidence::new(1.0).is_ok());
}

#[test]
fn confidence_out_of_range_is_rejected_not_clamped() {
  for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
    let err = NewAssumption::new(Uuid::new_v4(), "s", bad, "r")
      .validate()
      .unwrap_err();
    assert_eq!(err.field, "confidence");
    assert!(matches!(err.problem, Problem::OutOfRange { .. }));
  }
}

#[test]
fn confidence_deserialization_checks_range() {
  assert!(serde_json::from_value::<Confidence>(json!(0.25)).is_ok());
  assert!(serde_json::from_value::<Confidence>(json!(1.5)).is_err());
}

#[test]
fn decision_requires_summary_rationale_and_named_alternatives() {
  let id = Uuid::new_v4();
  assert_eq!(
    NewDecision::new(id, "", "r").validate().unwrap_err().field,
    "summary"
  );
  assert_eq!(
    NewDecision::new(id, "s", " ").validate().unwrap_err().field,
    "rationale"
  );

  let mut d = NewDecision::new(id, "s", "r");
  d.alternatives_considered = vec![Alternative::new("", "too slow")];
  assert_eq!(d.validate().unwrap_err().field, "alternatives_considered");
}

#[test]
fn enum_parsing_reports_the_field() {
  let err = "paused".parse::<IntentStatus>().unwrap_err();
  assert_eq!(err.field, "status");
  assert_eq!(
    "user_report".parse::<EvidenceSource>().unwrap(),
    EvidenceSource::UserReport
  );
  assert_eq!(
    "rumour".parse::<EvidenceSource>().unwrap_err().field,
    "source"
  );
  assert_eq!(
    "evidence".parse::<RelatedKind>().unwrap_err().field,
    "related_type"
  );
}

#[test]
fn assumption_age_falls_back_to_creation() {
  let Entity::Assumption(mut a) = assumption() else { unreachable!() };
  let later = now() + Duration::days(40);
  assert_eq!(a.age(later), Duration::days(40));
  assert!(a.is_aged(later, Duration::days(30)));

  a.last_validated_at = Some(now() + Duration::days(35));
  assert!(!a.is_aged(later, Duration::days(30)));
}

// ─── Policy ──────────────────────────────────────────────────────────────────

#[test]
fn default_policy_transition_graph() {
  use IntentStatus::*;
  let p = Policy::default();

  assert!(p.permits_transition(Draft, Active));
  assert!(p.permits_transition(Draft, Invalidated));
  assert!(p.permits_transition(Active, Satisfied));
  assert!(p.permits_transition(Active, Invalidated));

  assert!(!p.permits_transition(Draft, Satisfied));
  assert!(!p.permits_transition(Active, Draft));
  assert!(!p.permits_transition(Satisfied, Invalidated));
  assert!(!p.permits_transition(Invalidated, Satisfied));
  assert!(!p.permits_transition(Active, Active));
}

#[test]
fn permissive_policy_never_allows_regression() {
  use IntentStatus::*;
  let p = Policy { allow_draft_to_satisfied: true, ..Policy::default() };

  assert!(p.permits_transition(Draft, Satisfied));
  for from in IntentStatus::ALL {
    for to in IntentStatus::ALL {
      if to.rank() <= from.rank() {
        assert!(!p.permits_transition(from, to), "{from} -> {to}");
      }
    }
  }
}

// ─── Creation checks ─────────────────────────────────────────────────────────

#[test]
fn assumption_needs_an_existing_intent() {
  let engine = InvariantEngine::default();
  let a = assumption();

  let err = engine.validate_creation(&Memory::default(), &a).unwrap_err();
  assert!(matches!(err, Error::NotFound { kind: Some(EntityKind::Intent), .. }));

  let Entity::Assumption(inner) = &a else { unreachable!() };
  let lookup = Memory::default().with_intent(inner.intent_id, IntentStatus::Draft);
  engine.validate_creation(&lookup, &a).unwrap();
}

#[test]
fn invalidated_intent_refuses_new_decisions() {
  let engine = InvariantEngine::default();
  let d = decision();
  let Entity::Decision(inner) = &d else { unreachable!() };

  let lookup =
    Memory::default().with_intent(inner.intent_id, IntentStatus::Invalidated);
  let err = engine.validate_creation(&lookup, &d).unwrap_err();
  assert!(matches!(
    err,
    Error::ParentClosed { status: IntentStatus::Invalidated, child: EntityKind::Decision, .. }
  ));

  let lookup = Memory::default().with_intent(inner.intent_id, IntentStatus::Satisfied);
  engine.validate_creation(&lookup, &d).unwrap();
}

#[test]
fn evidence_must_resolve_to_the_stated_kind() {
  let engine = InvariantEngine::default();
  let target = Uuid::new_v4();
  let e: Entity = NewEvidence::new(
    RelatedKind::Decision,
    target,
    "p99 dropped to 80ms",
    EvidenceSource::Metric,
  )
  .into_evidence(Uuid::new_v4(), now())
  .unwrap()
  .into();

  let wrong_kind = Memory::default().with(target, EntityKind::Assumption);
  let err = engine.validate_creation(&wrong_kind, &e).unwrap_err();
  assert!(matches!(err, Error::NotFound { kind: Some(EntityKind::Decision), .. }));

  let right_kind = Memory::default().with(target, EntityKind::Decision);
  engine.validate_creation(&right_kind, &e).unwrap();
}

#[test]
fn hand_built_records_are_rechecked() {
  let engine = InvariantEngine::default();

  let active = intent(IntentStatus::Active);
  let err = engine.validate_creation(&Memory::default(), &active).unwrap_err();
  assert!(matches!(err, Error::Validation(ref v) if v.problem == Problem::NotInitial));

  let Entity::Decision(mut d) = decision() else { unreachable!() };
  d.rationale.clear();
  let lookup = Memory::default().with_intent(d.intent_id, IntentStatus::Active);
  let err = engine.validate_creation(&lookup, &d.into()).unwrap_err();
  assert!(matches!(err, Error::Validation(ref v) if v.field == "rationale"));
}

// ─── Mutation checks ─────────────────────────────────────────────────────────

#[test]
fn decisions_reject_every_mutation() {
  let engine = InvariantEngine::default();
  let d = decision();

  let attempts = [
    Mutation::Edit { field: "rationale".into(), value: json!("changed my mind") },
    Mutation::Edit { field: "summary".into(), value: json!("x") },
    Mutation::SetStatus(IntentStatus::Active),
    Mutation::Delete,
  ];
  for m in attempts {
    let err = engine.validate_mutation(&d, m, now()).unwrap_err();
    assert!(matches!(
      err,
      Error::ImmutabilityViolation { kind: EntityKind::Decision, .. }
    ));
  }
}

#[test]
fn evidence_rejects_delete() {
  let engine = InvariantEngine::default();
  let e: Entity = NewEvidence::new(
    RelatedKind::Intent,
    Uuid::new_v4(),
    "user report",
    EvidenceSource::UserReport,
  )
  .into_evidence(Uuid::new_v4(), now())
  .unwrap()
  .into();

  let err = engine.validate_mutation(&e, Mutation::Delete, now()).unwrap_err();
  assert!(matches!(err, Error::ImmutabilityViolation { ref action, .. } if action == "delete"));
}

#[test]
fn intent_status_moves_forward_only() {
  let engine = InvariantEngine::default();

  let change = engine
    .validate_mutation(
      &intent(IntentStatus::Draft),
      Mutation::SetStatus(IntentStatus::Active),
      now(),
    )
    .unwrap();
  assert!(matches!(
    change,
    Change::Status { from: IntentStatus::Draft, to: IntentStatus::Active, .. }
  ));

  let err = engine
    .validate_mutation(
      &intent(IntentStatus::Satisfied),
      Mutation::SetStatus(IntentStatus::Active),
      now(),
    )
    .unwrap_err();
  assert!(matches!(err, Error::InvalidTransition { .. }));
}

#[test]
fn draft_to_satisfied_follows_policy() {
  let strict = InvariantEngine::default();
  let err = strict
    .validate_mutation(
      &intent(IntentStatus::Draft),
      Mutation::SetStatus(IntentStatus::Satisfied),
      now(),
    )
    .unwrap_err();
  assert!(matches!(err, Error::InvalidTransition { .. }));

  let lenient = InvariantEngine::new(Policy {
    allow_draft_to_satisfied: true,
    ..Policy::default()
  });
  lenient
    .validate_mutation(
      &intent(IntentStatus::Draft),
      Mutation::SetStatus(IntentStatus::Satisfied),
      now(),
    )
    .unwrap();
}

#[test]
fn intent_status_edit_goes_through_transition_rules() {
  let engine = InvariantEngine::default();
  let current = intent(IntentStatus::Active);

  let err = engine
    .validate_mutation(
      &current,
      Mutation::Edit { field: "status".into(), value: json!("draft") },
      now(),
    )
    .unwrap_err();
  assert!(matches!(err, Error::InvalidTransition { .. }));

  let err = engine
    .validate_mutation(
      &current,
      Mutation::Edit { field: "status".into(), value: json!(3) },
      now(),
    )
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn intent_text_fields_are_frozen() {
  let engine = InvariantEngine::default();
  let err = engine
    .validate_mutation(
      &intent(IntentStatus::Draft),
      Mutation::Edit { field: "title".into(), value: json!("new title") },
      now(),
    )
    .unwrap_err();
  assert!(matches!(err, Error::ImmutabilityViolation { kind: EntityKind::Intent, .. }));

  let err = engine
    .validate_mutation(&intent(IntentStatus::Draft), Mutation::Delete, now())
    .unwrap_err();
  assert!(matches!(err, Error::ImmutabilityViolation { .. }));
}

#[test]
fn links_are_accepted_in_any_status_but_not_blank() {
  let engine = InvariantEngine::default();
  let change = engine
    .validate_mutation(
      &intent(IntentStatus::Invalidated),
      Mutation::Link { kind: LinkKind::Commit, target: "a1b2c3d".into() },
      now(),
    )
    .unwrap();
  assert!(matches!(change, Change::Link { ref link, .. } if link.target == "a1b2c3d"));

  let err = engine
    .validate_mutation(
      &intent(IntentStatus::Draft),
      Mutation::Link { kind: LinkKind::Path, target: " ".into() },
      now(),
    )
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn assumption_allows_only_confidence_and_validation_stamp() {
  let engine = InvariantEngine::default();
  let a = assumption();
  let stamp = now() + Duration::hours(1);

  let change = engine
    .validate_mutation(&a, Mutation::Revalidate { confidence: 0.9 }, stamp)
    .unwrap();
  assert!(matches!(
    change,
    Change::Confidence { validated_at: Some(at), .. } if at == stamp
  ));

  let change = engine
    .validate_mutation(
      &a,
      Mutation::Edit { field: "confidence".into(), value: json!(0.1) },
      stamp,
    )
    .unwrap();
  assert!(matches!(change, Change::Confidence { validated_at: None, .. }));

  let change = engine
    .validate_mutation(
      &a,
      Mutation::Edit {
        field: "last_validated_at".into(),
        value: json!(stamp.to_rfc3339()),
      },
      stamp,
    )
    .unwrap();
  assert_eq!(change, Change::ValidatedAt { assumption_id: a.id(), at: stamp });

  for field in ["statement", "risk_if_false", "intent_id"] {
    let err = engine
      .validate_mutation(
        &a,
        Mutation::Edit { field: field.into(), value: json!("x") },
        stamp,
      )
      .unwrap_err();
    assert!(matches!(err, Error::ImmutabilityViolation { .. }), "{field}");
  }
}

#[test]
fn revalidation_rejects_out_of_range_confidence() {
  let engine = InvariantEngine::default();
  let err = engine
    .validate_mutation(&assumption(), Mutation::Revalidate { confidence: 1.2 }, now())
    .unwrap_err();
  assert!(matches!(err, Error::Validation(ref v) if v.field == "confidence"));
}

#[test]
fn validation_stamp_cannot_precede_creation() {
  let engine = InvariantEngine::default();
  let err = engine
    .validate_mutation(
      &assumption(),
      Mutation::Edit {
        field: "last_validated_at".into(),
        value: json!((now() - Duration::days(1)).to_rfc3339()),
      },
      now(),
    )
    .unwrap_err();
  assert!(matches!(err, Error::Validation(ref v) if v.problem == Problem::BeforeCreation));
}

// ─── Query parameters ────────────────────────────────────────────────────────

#[test]
fn list_query_rejects_inapplicable_filters() {
  let id = Uuid::new_v4();

  assert!(ListQuery::of(EntityKind::Decision).owned_by(id).validate().is_ok());
  assert!(
    ListQuery::of(EntityKind::Decision)
      .with_status(IntentStatus::Active)
      .validate()
      .is_ok()
  );
  assert!(
    ListQuery::of(EntityKind::Evidence)
      .related_to(RelatedKind::Intent, id)
      .from_source(EvidenceSource::Commit)
      .validate()
      .is_ok()
  );

  let err = ListQuery::of(EntityKind::Intent).owned_by(id).validate().unwrap_err();
  assert_eq!(err.field, "intent_id");
  let err = ListQuery::of(EntityKind::Evidence)
    .with_status(IntentStatus::Active)
    .validate()
    .unwrap_err();
  assert_eq!(err.field, "status");
  let err = ListQuery::of(EntityKind::Assumption)
    .from_source(EvidenceSource::Manual)
    .validate()
    .unwrap_err();
  assert_eq!(err.problem, Problem::NotApplicable);
}

#[test]
fn entities_serialize_with_a_kind_tag() {
  let value = serde_json::to_value(decision()).unwrap();
  assert_eq!(value["kind"], "decision");
  assert!(value["alternatives_considered"].is_array());
}
