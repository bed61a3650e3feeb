//! SQL schema and migrations for the Axiom SQLite store.
//!
//! The applied version is mirrored to `PRAGMA user_version`. A database whose
//! version is newer than [`SCHEMA_VERSION`] is refused before anything else
//! touches it.

use std::path::PathBuf;

use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use crate::{Error, Result};

/// Connection-level settings applied on every open.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous  = FULL;
PRAGMA foreign_keys = ON;
";

const V1: &str = "
-- Every record ever created, in creation order. The AUTOINCREMENT sequence
-- guarantees a seq value is never handed out twice.
CREATE TABLE entities (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id   TEXT NOT NULL UNIQUE,
    kind        TEXT NOT NULL CHECK (kind IN ('intent', 'assumption', 'decision', 'evidence')),
    created_at  TEXT NOT NULL
);

CREATE TABLE intents (
    entity_id        TEXT PRIMARY KEY REFERENCES entities(entity_id),
    title            TEXT NOT NULL,
    problem          TEXT NOT NULL,
    context          TEXT NOT NULL,
    constraints      TEXT NOT NULL DEFAULT '[]',  -- JSON array of strings
    status           TEXT NOT NULL CHECK (status IN ('draft', 'active', 'satisfied', 'invalidated')),
    last_updated_at  TEXT NOT NULL
);

-- Weak references; targets are opaque and never resolved.
CREATE TABLE intent_links (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    intent_id  TEXT NOT NULL REFERENCES intents(entity_id),
    kind       TEXT NOT NULL CHECK (kind IN ('commit', 'path')),
    target     TEXT NOT NULL,
    linked_at  TEXT NOT NULL,
    UNIQUE (intent_id, kind, target)
);

CREATE TABLE assumptions (
    entity_id          TEXT PRIMARY KEY REFERENCES entities(entity_id),
    intent_id          TEXT NOT NULL REFERENCES intents(entity_id),
    statement          TEXT NOT NULL,
    confidence         REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
    risk_if_false      TEXT NOT NULL,
    last_validated_at  TEXT
);

-- Decisions and evidence are strictly append-only.
CREATE TABLE decisions (
    entity_id     TEXT PRIMARY KEY REFERENCES entities(entity_id),
    intent_id     TEXT NOT NULL REFERENCES intents(entity_id),
    summary       TEXT NOT NULL,
    rationale     TEXT NOT NULL,
    alternatives  TEXT NOT NULL DEFAULT '[]',  -- JSON array of {option, reason_rejected}
    tradeoffs     TEXT NOT NULL
);

CREATE TABLE evidence (
    entity_id     TEXT PRIMARY KEY REFERENCES entities(entity_id),
    related_type  TEXT NOT NULL CHECK (related_type IN ('intent', 'assumption', 'decision')),
    related_id    TEXT NOT NULL REFERENCES entities(entity_id),
    description   TEXT NOT NULL,
    source        TEXT NOT NULL CHECK (source IN ('commit', 'issue', 'metric', 'user_report', 'manual'))
);

CREATE INDEX assumptions_intent_idx ON assumptions(intent_id);
CREATE INDEX decisions_intent_idx   ON decisions(intent_id);
CREATE INDEX evidence_related_idx   ON evidence(related_id);
CREATE INDEX links_intent_idx       ON intent_links(intent_id);

-- Guards below the store: nothing is ever deleted, append-only tables are
-- never updated, and frozen columns never change.
CREATE TRIGGER entities_no_update BEFORE UPDATE ON entities
BEGIN SELECT RAISE(ABORT, 'append-only: entities cannot be updated'); END;
CREATE TRIGGER entities_no_delete BEFORE DELETE ON entities
BEGIN SELECT RAISE(ABORT, 'append-only: entities cannot be deleted'); END;

CREATE TRIGGER decisions_no_update BEFORE UPDATE ON decisions
BEGIN SELECT RAISE(ABORT, 'append-only: decisions cannot be updated'); END;
CREATE TRIGGER decisions_no_delete BEFORE DELETE ON decisions
BEGIN SELECT RAISE(ABORT, 'append-only: decisions cannot be deleted'); END;

CREATE TRIGGER evidence_no_update BEFORE UPDATE ON evidence
BEGIN SELECT RAISE(ABORT, 'append-only: evidence cannot be updated'); END;
CREATE TRIGGER evidence_no_delete BEFORE DELETE ON evidence
BEGIN SELECT RAISE(ABORT, 'append-only: evidence cannot be deleted'); END;

CREATE TRIGGER links_no_update BEFORE UPDATE ON intent_links
BEGIN SELECT RAISE(ABORT, 'append-only: links cannot be updated'); END;
CREATE TRIGGER links_no_delete BEFORE DELETE ON intent_links
BEGIN SELECT RAISE(ABORT, 'append-only: links cannot be deleted'); END;

CREATE TRIGGER intents_no_delete BEFORE DELETE ON intents
BEGIN SELECT RAISE(ABORT, 'append-only: intents cannot be deleted'); END;
CREATE TRIGGER intents_frozen BEFORE UPDATE OF entity_id, title, problem, context, constraints ON intents
BEGIN SELECT RAISE(ABORT, 'append-only: intent text is frozen'); END;
CREATE TRIGGER intents_forward_only BEFORE UPDATE OF status ON intents
WHEN (CASE NEW.status WHEN 'draft' THEN 0 WHEN 'active' THEN 1 ELSE 2 END)
  <= (CASE OLD.status WHEN 'draft' THEN 0 WHEN 'active' THEN 1 ELSE 2 END)
BEGIN SELECT RAISE(ABORT, 'append-only: intent status only moves forward'); END;

CREATE TRIGGER assumptions_no_delete BEFORE DELETE ON assumptions
BEGIN SELECT RAISE(ABORT, 'append-only: assumptions cannot be deleted'); END;
CREATE TRIGGER assumptions_frozen BEFORE UPDATE OF entity_id, intent_id, statement, risk_if_false ON assumptions
BEGIN SELECT RAISE(ABORT, 'append-only: assumption text is frozen'); END;
";

struct Migration {
  version: u32,
  sql:     &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration { version: 1, sql: V1 }];

/// The newest schema this build understands.
pub const SCHEMA_VERSION: u32 = 1;

pub fn user_version(conn: &Connection) -> Result<u32> {
  Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
}

/// Refuse databases written by a newer build.
pub fn check_version(found: u32) -> Result<()> {
  if found > SCHEMA_VERSION {
    return Err(Error::SchemaMismatch { found, supported: SCHEMA_VERSION });
  }
  Ok(())
}

/// Refuse databases this store cannot safely migrate, returning the current
/// version otherwise. An unversioned database must be empty: any table in it
/// was put there by something else.
pub fn check_database(conn: &Connection) -> Result<u32> {
  let found = user_version(conn)?;
  check_version(found)?;
  if found == 0 {
    let mut stmt = conn.prepare(
      "SELECT name FROM sqlite_master
       WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let tables = stmt
      .query_map([], |r| r.get::<_, String>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    if !tables.is_empty() {
      return Err(Error::ForeignSchema {
        path:   PathBuf::from(conn.path().unwrap_or(":memory:")),
        detail: format!("unversioned database with tables {}", tables.join(", ")),
      });
    }
  }
  Ok(found)
}

/// Bring the database up to [`SCHEMA_VERSION`] in a single transaction.
///
/// The version is re-read inside an immediate transaction so two openers
/// racing on a fresh database cannot both apply the same migration.
pub fn migrate(conn: &mut Connection) -> Result<()> {
  check_database(conn)?;

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let current = check_database(&tx)?;
  if current == SCHEMA_VERSION {
    return Ok(());
  }

  for m in MIGRATIONS.iter().filter(|m| m.version > current) {
    tx.execute_batch(m.sql)?;
    tx.pragma_update(None, "user_version", m.version)?;
    info!(version = m.version, "applied schema migration");
  }
  tx.commit()?;
  Ok(())
}
