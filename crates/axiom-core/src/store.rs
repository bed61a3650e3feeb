//! The `ReasoningStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `axiom-store-sqlite`).
//! Collaborators such as the `axiom` binary depend on this abstraction, not on
//! any concrete backend.

use uuid::Uuid;

use crate::{
  assumption::{Assumption, NewAssumption},
  decision::{Decision, NewDecision},
  entity::Entity,
  evidence::{Evidence, NewEvidence},
  intent::{Intent, IntentStatus, NewIntent},
  invariant::Mutation,
  query::ListQuery,
};

/// Abstraction over an Axiom reasoning store backend.
///
/// Every write is validated by the [`crate::invariant::InvariantEngine`]
/// before anything is persisted. Decisions and evidence are insert-only;
/// there is deliberately no method that edits them, and routing an edit
/// through [`ReasoningStore::mutate`] fails with
/// [`crate::Error::ImmutabilityViolation`].
///
/// All operations are synchronous and run to completion before returning.
pub trait ReasoningStore {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;

  /// Lazy, finite sequence over stored records. Cloning a cursor that has
  /// not been advanced yields an independent restart of the same listing.
  type Cursor<'a>: Iterator<Item = Result<Entity, Self::Error>> + Clone
  where
    Self: 'a;

  // ── Intents ───────────────────────────────────────────────────────────

  /// Persist a new intent in `draft` status.
  fn create_intent(&self, input: NewIntent) -> Result<Intent, Self::Error>;

  /// Move an intent forward along its lifecycle.
  fn update_intent_status(
    &self,
    intent_id: Uuid,
    status: IntentStatus,
  ) -> Result<Intent, Self::Error>;

  /// Record a commit identifier against an intent. The identifier is not
  /// checked against any repository history. Re-linking is a no-op.
  fn link_commit(&self, intent_id: Uuid, commit: &str) -> Result<Intent, Self::Error>;

  /// Record a file path against an intent. Re-linking is a no-op.
  fn link_path(&self, intent_id: Uuid, path: &str) -> Result<Intent, Self::Error>;

  // ── Assumptions ───────────────────────────────────────────────────────

  fn create_assumption(&self, input: NewAssumption) -> Result<Assumption, Self::Error>;

  /// Human re-assessment: replace the confidence and stamp
  /// `last_validated_at` with the current time.
  fn revalidate_assumption(
    &self,
    assumption_id: Uuid,
    confidence: f64,
  ) -> Result<Assumption, Self::Error>;

  // ── Append-only records ───────────────────────────────────────────────

  fn create_decision(&self, input: NewDecision) -> Result<Decision, Self::Error>;

  fn create_evidence(&self, input: NewEvidence) -> Result<Evidence, Self::Error>;

  // ── Generic mutation ──────────────────────────────────────────────────

  /// Apply an arbitrary mutation to any record, subject to the invariant
  /// engine. Returns the record as persisted afterwards.
  fn mutate(&self, id: Uuid, mutation: Mutation) -> Result<Entity, Self::Error>;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Fetch any record by id. Unknown ids fail with `NotFound`.
  fn get(&self, id: Uuid) -> Result<Entity, Self::Error>;

  /// Expand a unique id prefix to the full id.
  fn resolve_prefix(&self, prefix: &str) -> Result<Uuid, Self::Error>;

  /// Start a lazy listing in creation order.
  fn scan(&self, query: &ListQuery) -> Result<Self::Cursor<'_>, Self::Error>;

  /// Collect a listing eagerly.
  fn list(&self, query: &ListQuery) -> Result<Vec<Entity>, Self::Error> {
    self.scan(query)?.collect()
  }
}
