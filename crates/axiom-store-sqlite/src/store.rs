//! [`SqliteStore`], the SQLite implementation of [`ReasoningStore`].

use std::path::Path;

use axiom_core::{
  assumption::{Assumption, NewAssumption},
  decision::{Decision, NewDecision},
  entity::{Entity, EntityKind},
  evidence::{Evidence, NewEvidence},
  intent::{Intent, IntentStatus, Link, LinkKind, NewIntent},
  invariant::{Change, InvariantEngine, Lookup, Mutation},
  query::ListQuery,
  store::ReasoningStore,
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  binding::RepositoryBinding,
  config::StoreConfig,
  cursor::Cursor,
  encode::{
    ASSUMPTION_COLUMNS, DECISION_COLUMNS, EVIDENCE_COLUMNS, INTENT_COLUMNS,
    RawAssumption, RawDecision, RawEvidence, RawIntent, RawLink, decode_kind,
    encode_alternatives, encode_dt, encode_strings, encode_uuid,
  },
  lock::DirLock,
  schema::{self, PRAGMAS},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Axiom reasoning store backed by a single SQLite file.
///
/// The handle owns its connection, the directory lock used to serialize
/// writers, and the policy its invariant engine enforces. There is no shared
/// global state; open one handle per thread.
#[derive(Debug)]
pub struct SqliteStore {
  conn:    Connection,
  binding: Option<RepositoryBinding>,
  lock:    Option<DirLock>,
  engine:  InvariantEngine,
  config:  StoreConfig,
}

impl SqliteStore {
  /// Bind `root` as a repository, load its configuration and open its
  /// store. Safe to call repeatedly; existing data is reused.
  pub fn bind_repository(root: impl AsRef<Path>) -> Result<Self> {
    let binding = RepositoryBinding::bind(root)?;
    let config = StoreConfig::load(&binding.config_path())?;
    Self::open(binding, config)
  }

  /// Open the store of an already-bound repository.
  ///
  /// Fails with [`Error::SchemaMismatch`] before touching the database when
  /// it was written by a newer build, and with [`Error::ForeignSchema`] when
  /// it holds tables this store did not create.
  pub fn open(binding: RepositoryBinding, config: StoreConfig) -> Result<Self> {
    let lock = DirLock::new(binding.lock_path(), config.lock_timeout());

    let mut conn = Connection::open(binding.db_path())?;
    schema::check_database(&conn)?;
    {
      let _guard = lock.acquire()?;
      prepare(&mut conn, &config)?;
    }
    debug!(db = ?binding.db_path(), "opened store");

    Ok(Self {
      conn,
      binding: Some(binding),
      lock: Some(lock),
      engine: InvariantEngine::new(config.policy.clone()),
      config,
    })
  }

  /// Open an in-memory store with no repository behind it.
  pub fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with(StoreConfig::default())
  }

  pub fn open_in_memory_with(config: StoreConfig) -> Result<Self> {
    let mut conn = Connection::open_in_memory()?;
    prepare(&mut conn, &config)?;
    Ok(Self {
      conn,
      binding: None,
      lock: None,
      engine: InvariantEngine::new(config.policy.clone()),
      config,
    })
  }

  pub fn binding(&self) -> Option<&RepositoryBinding> { self.binding.as_ref() }

  pub fn config(&self) -> &StoreConfig { &self.config }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &Connection { &self.conn }

  /// Run `op` inside one immediate transaction while holding the directory
  /// lock. Any error rolls the transaction back.
  fn write<T>(&self, op: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
    let _guard = self.lock.as_ref().map(DirLock::acquire).transpose()?;
    let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
    let out = op(&tx)?;
    tx.commit()?;
    Ok(out)
  }

  fn read<T>(&self, op: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    snapshot(&self.conn, op)
  }

  fn create(&self, entity: Entity) -> Result<Entity> {
    self.write(|tx| {
      self.engine.validate_creation(&TxLookup(tx), &entity)?;
      insert_entity(tx, &entity)
    })?;
    info!(id = %entity.id(), kind = %entity.kind(), "created record");
    Ok(entity)
  }

  /// Apply `mutation` to the record `id`. With `expected` set, a record of
  /// any other kind is reported as missing.
  fn mutate_as(
    &self,
    id: Uuid,
    expected: Option<EntityKind>,
    mutation: Mutation,
  ) -> Result<Entity> {
    let missing = || match expected {
      Some(kind) => axiom_core::Error::not_found(kind, id),
      None => axiom_core::Error::NotFound { kind: None, id: id.to_string() },
    };

    let (change, entity) = self.write(|tx| {
      let current = fetch(tx, id)?
        .filter(|e| expected.is_none_or(|k| e.kind() == k))
        .ok_or_else(missing)?;
      let change = self.engine.validate_mutation(&current, mutation, Utc::now())?;
      apply(tx, &change)?;
      let entity = fetch(tx, id)?.ok_or_else(missing)?;
      Ok((change, entity))
    })?;

    info!(id = %id, change = ?change, "updated record");
    Ok(entity)
  }

  fn link(&self, intent_id: Uuid, kind: LinkKind, target: &str) -> Result<Intent> {
    let mutation = Mutation::Link { kind, target: target.to_owned() };
    into_kind(self.mutate_as(intent_id, Some(EntityKind::Intent), mutation)?, Entity::into_intent)
  }
}

/// Bring a fresh connection into a usable state.
fn prepare(conn: &mut Connection, config: &StoreConfig) -> Result<()> {
  conn.busy_timeout(config.busy_timeout())?;
  conn.execute_batch(PRAGMAS)?;
  schema::migrate(conn)
}

fn into_kind<T>(entity: Entity, pick: fn(Entity) -> Option<T>) -> Result<T> {
  let (kind, id) = (entity.kind(), entity.id());
  pick(entity).ok_or_else(|| Error::Decode(format!("record {id} changed kind to {kind}")))
}

/// Run several reads against one consistent view of the database, so a
/// write committed in between cannot be half observed.
pub(crate) fn snapshot<T>(
  conn: &Connection,
  op: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
  let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
  let out = op(&tx)?;
  tx.commit()?;
  Ok(out)
}

// ─── Lookup ──────────────────────────────────────────────────────────────────

/// Invariant-engine view of the database from inside a write transaction.
struct TxLookup<'a>(&'a Connection);

impl Lookup for TxLookup<'_> {
  type Error = Error;

  fn kind_of(&self, id: Uuid) -> Result<Option<EntityKind>> { kind_of(self.0, id) }

  fn intent_status(&self, id: Uuid) -> Result<Option<IntentStatus>> {
    intent_status(self.0, id)
  }
}

// ─── Reads ───────────────────────────────────────────────────────────────────

fn kind_of(conn: &Connection, id: Uuid) -> Result<Option<EntityKind>> {
  conn
    .query_row(
      "SELECT kind FROM entities WHERE entity_id = ?1",
      rusqlite::params![encode_uuid(id)],
      |r| r.get::<_, String>(0),
    )
    .optional()?
    .as_deref()
    .map(decode_kind)
    .transpose()
}

fn intent_status(conn: &Connection, id: Uuid) -> Result<Option<IntentStatus>> {
  conn
    .query_row(
      "SELECT status FROM intents WHERE entity_id = ?1",
      rusqlite::params![encode_uuid(id)],
      |r| r.get::<_, String>(0),
    )
    .optional()?
    .map(|s| s.parse().map_err(|e: axiom_core::validate::ValidationError| {
      Error::Decode(e.to_string())
    }))
    .transpose()
}

/// Load any record by id.
fn fetch(conn: &Connection, id: Uuid) -> Result<Option<Entity>> {
  let Some(kind) = kind_of(conn, id)? else {
    return Ok(None);
  };
  let id_str = encode_uuid(id);

  let entity = match kind {
    EntityKind::Intent => {
      let raw = conn.query_row(
        &format!(
          "SELECT {INTENT_COLUMNS} FROM intents i
           JOIN entities e ON e.entity_id = i.entity_id
           WHERE i.entity_id = ?1"
        ),
        rusqlite::params![id_str],
        RawIntent::from_row,
      )?;
      raw.into_intent(load_links(conn, id)?)?.into()
    }
    EntityKind::Assumption => conn
      .query_row(
        &format!(
          "SELECT {ASSUMPTION_COLUMNS} FROM assumptions a
           JOIN entities e ON e.entity_id = a.entity_id
           WHERE a.entity_id = ?1"
        ),
        rusqlite::params![id_str],
        RawAssumption::from_row,
      )?
      .into_assumption()?
      .into(),
    EntityKind::Decision => conn
      .query_row(
        &format!(
          "SELECT {DECISION_COLUMNS} FROM decisions d
           JOIN entities e ON e.entity_id = d.entity_id
           WHERE d.entity_id = ?1"
        ),
        rusqlite::params![id_str],
        RawDecision::from_row,
      )?
      .into_decision()?
      .into(),
    EntityKind::Evidence => conn
      .query_row(
        &format!(
          "SELECT {EVIDENCE_COLUMNS} FROM evidence v
           JOIN entities e ON e.entity_id = v.entity_id
           WHERE v.entity_id = ?1"
        ),
        rusqlite::params![id_str],
        RawEvidence::from_row,
      )?
      .into_evidence()?
      .into(),
  };
  Ok(Some(entity))
}

/// Links of an intent in the order they were made.
pub(crate) fn load_links(conn: &Connection, intent_id: Uuid) -> Result<Vec<Link>> {
  let mut stmt = conn.prepare_cached(
    "SELECT kind, target, linked_at FROM intent_links
     WHERE intent_id = ?1 ORDER BY seq",
  )?;
  let raws = stmt
    .query_map(rusqlite::params![encode_uuid(intent_id)], RawLink::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawLink::into_link).collect()
}

// ─── Writes ──────────────────────────────────────────────────────────────────

fn insert_entity(conn: &Connection, entity: &Entity) -> Result<()> {
  let id = encode_uuid(entity.id());
  conn.execute(
    "INSERT INTO entities (entity_id, kind, created_at) VALUES (?1, ?2, ?3)",
    rusqlite::params![id, entity.kind().as_str(), encode_dt(entity.created_at())],
  )?;

  match entity {
    Entity::Intent(i) => {
      conn.execute(
        "INSERT INTO intents (
           entity_id, title, problem, context, constraints, status, last_updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
          id,
          i.title,
          i.problem,
          i.context,
          encode_strings(&i.constraints)?,
          i.status.as_str(),
          encode_dt(i.last_updated_at),
        ],
      )?;
      for link in &i.links {
        insert_link(conn, i.intent_id, link)?;
      }
    }
    Entity::Assumption(a) => {
      conn.execute(
        "INSERT INTO assumptions (
           entity_id, intent_id, statement, confidence, risk_if_false, last_validated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
          id,
          encode_uuid(a.intent_id),
          a.statement,
          a.confidence.get(),
          a.risk_if_false,
          a.last_validated_at.map(encode_dt),
        ],
      )?;
    }
    Entity::Decision(d) => {
      conn.execute(
        "INSERT INTO decisions (
           entity_id, intent_id, summary, rationale, alternatives, tradeoffs
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
          id,
          encode_uuid(d.intent_id),
          d.summary,
          d.rationale,
          encode_alternatives(&d.alternatives_considered)?,
          d.tradeoffs,
        ],
      )?;
    }
    Entity::Evidence(v) => {
      conn.execute(
        "INSERT INTO evidence (
           entity_id, related_type, related_id, description, source
         ) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
          id,
          v.related_type.as_str(),
          encode_uuid(v.related_id),
          v.description,
          v.source.as_str(),
        ],
      )?;
    }
  }
  Ok(())
}

/// Returns whether a new link row was written.
fn insert_link(conn: &Connection, intent_id: Uuid, link: &Link) -> Result<bool> {
  let inserted = conn.execute(
    "INSERT OR IGNORE INTO intent_links (intent_id, kind, target, linked_at)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![
      encode_uuid(intent_id),
      link.kind.as_str(),
      link.target,
      encode_dt(link.linked_at),
    ],
  )?;
  Ok(inserted > 0)
}

/// Persist an approved change as a targeted update.
fn apply(conn: &Connection, change: &Change) -> Result<()> {
  match change {
    Change::Status { intent_id, to, at, .. } => {
      conn.execute(
        "UPDATE intents SET status = ?2, last_updated_at = ?3 WHERE entity_id = ?1",
        rusqlite::params![encode_uuid(*intent_id), to.as_str(), encode_dt(*at)],
      )?;
    }
    Change::Link { intent_id, link } => {
      if insert_link(conn, *intent_id, link)? {
        conn.execute(
          "UPDATE intents SET last_updated_at = ?2 WHERE entity_id = ?1",
          rusqlite::params![encode_uuid(*intent_id), encode_dt(link.linked_at)],
        )?;
      }
    }
    Change::Confidence { assumption_id, confidence, validated_at: Some(at) } => {
      conn.execute(
        "UPDATE assumptions SET confidence = ?2, last_validated_at = ?3
         WHERE entity_id = ?1",
        rusqlite::params![encode_uuid(*assumption_id), confidence.get(), encode_dt(*at)],
      )?;
    }
    Change::Confidence { assumption_id, confidence, validated_at: None } => {
      conn.execute(
        "UPDATE assumptions SET confidence = ?2 WHERE entity_id = ?1",
        rusqlite::params![encode_uuid(*assumption_id), confidence.get()],
      )?;
    }
    Change::ValidatedAt { assumption_id, at } => {
      conn.execute(
        "UPDATE assumptions SET last_validated_at = ?2 WHERE entity_id = ?1",
        rusqlite::params![encode_uuid(*assumption_id), encode_dt(*at)],
      )?;
    }
  }
  Ok(())
}

// ─── ReasoningStore impl ─────────────────────────────────────────────────────

impl ReasoningStore for SqliteStore {
  type Error = Error;
  type Cursor<'a> = Cursor<'a>;

  // ── Intents ───────────────────────────────────────────────────────────────

  fn create_intent(&self, input: NewIntent) -> Result<Intent> {
    let intent = input.into_intent(Uuid::new_v4(), Utc::now())?;
    into_kind(self.create(intent.into())?, Entity::into_intent)
  }

  fn update_intent_status(&self, intent_id: Uuid, status: IntentStatus) -> Result<Intent> {
    let entity =
      self.mutate_as(intent_id, Some(EntityKind::Intent), Mutation::SetStatus(status))?;
    into_kind(entity, Entity::into_intent)
  }

  fn link_commit(&self, intent_id: Uuid, commit: &str) -> Result<Intent> {
    self.link(intent_id, LinkKind::Commit, commit)
  }

  fn link_path(&self, intent_id: Uuid, path: &str) -> Result<Intent> {
    self.link(intent_id, LinkKind::Path, path)
  }

  // ── Assumptions ───────────────────────────────────────────────────────────

  fn create_assumption(&self, input: NewAssumption) -> Result<Assumption> {
    let assumption = input.into_assumption(Uuid::new_v4(), Utc::now())?;
    into_kind(self.create(assumption.into())?, Entity::into_assumption)
  }

  fn revalidate_assumption(&self, assumption_id: Uuid, confidence: f64) -> Result<Assumption> {
    let entity = self.mutate_as(
      assumption_id,
      Some(EntityKind::Assumption),
      Mutation::Revalidate { confidence },
    )?;
    into_kind(entity, Entity::into_assumption)
  }

  // ── Append-only records ───────────────────────────────────────────────────

  fn create_decision(&self, input: NewDecision) -> Result<Decision> {
    let decision = input.into_decision(Uuid::new_v4(), Utc::now())?;
    into_kind(self.create(decision.into())?, Entity::into_decision)
  }

  fn create_evidence(&self, input: NewEvidence) -> Result<Evidence> {
    let evidence = input.into_evidence(Uuid::new_v4(), Utc::now())?;
    into_kind(self.create(evidence.into())?, Entity::into_evidence)
  }

  // ── Generic mutation ──────────────────────────────────────────────────────

  fn mutate(&self, id: Uuid, mutation: Mutation) -> Result<Entity> {
    self.mutate_as(id, None, mutation)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  fn get(&self, id: Uuid) -> Result<Entity> {
    debug!(%id, "get");
    self.read(|conn| fetch(conn, id))?.ok_or_else(|| {
      axiom_core::Error::NotFound { kind: None, id: id.to_string() }.into()
    })
  }

  fn resolve_prefix(&self, prefix: &str) -> Result<Uuid> {
    let prefix = prefix.trim().to_ascii_lowercase();
    let not_found = || axiom_core::Error::NotFound { kind: None, id: prefix.clone() };
    if prefix.is_empty() {
      return Err(not_found().into());
    }

    let mut stmt = self.conn.prepare_cached(
      "SELECT entity_id FROM entities
       WHERE substr(entity_id, 1, length(?1)) = ?1 ORDER BY seq",
    )?;
    let matches = stmt
      .query_map(rusqlite::params![prefix], |r| r.get::<_, String>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    match matches.as_slice() {
      [] => Err(not_found().into()),
      [only] => Ok(Uuid::parse_str(only)?),
      many => Err(
        axiom_core::Error::AmbiguousPrefix { prefix: prefix.clone(), matches: many.len() }
          .into(),
      ),
    }
  }

  fn scan(&self, query: &ListQuery) -> Result<Cursor<'_>> {
    query.validate()?;

    if let Some(intent_id) = query.intent_id
      && intent_status(&self.conn, intent_id)?.is_none()
    {
      return Err(axiom_core::Error::not_found(EntityKind::Intent, intent_id).into());
    }
    if let Some((kind, id)) = query.related {
      let expected = EntityKind::from(kind);
      if kind_of(&self.conn, id)? != Some(expected) {
        return Err(axiom_core::Error::not_found(expected, id).into());
      }
    }

    let upper: i64 =
      self.conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM entities", [], |r| r.get(0))?;
    debug!(kind = %query.kind, upper, "scan");
    Ok(Cursor::new(&self.conn, query, upper, self.config.page_size()))
  }
}
