//! Lazy, paged listing over the entity registry.

use std::collections::VecDeque;

use axiom_core::{entity::{Entity, EntityKind}, query::ListQuery};
use rusqlite::{Connection, types::Value};

use crate::{
  Result,
  encode::{
    ASSUMPTION_COLUMNS, DECISION_COLUMNS, EVIDENCE_COLUMNS, INTENT_COLUMNS,
    RawAssumption, RawDecision, RawEvidence, RawIntent, decode_uuid, encode_uuid,
  },
  store::{load_links, snapshot},
};

/// Iterator over the records matched by a [`ListQuery`], in creation order.
///
/// Rows are fetched `page_size` at a time. The listing is bounded by the
/// newest record that existed when the cursor was created, so records
/// written while iterating are not picked up. Clone an unstarted cursor, or
/// call [`Cursor::rewind`], to run the same listing again.
#[derive(Clone)]
pub struct Cursor<'a> {
  conn:      &'a Connection,
  kind:      EntityKind,
  sql:       String,
  filters:   Vec<Value>,
  upper:     i64,
  page_size: usize,
  limit:     Option<usize>,
  after:     i64,
  yielded:   usize,
  buffer:    VecDeque<Entity>,
  done:      bool,
}

impl<'a> Cursor<'a> {
  pub(crate) fn new(
    conn: &'a Connection,
    query: &ListQuery,
    upper: i64,
    page_size: usize,
  ) -> Self {
    let (sql, filters) = build_sql(query);
    Self {
      conn,
      kind: query.kind,
      sql,
      filters,
      upper,
      page_size,
      limit: query.limit,
      after: 0,
      yielded: 0,
      buffer: VecDeque::new(),
      done: false,
    }
  }

  /// Restart the listing from the first record.
  pub fn rewind(&mut self) {
    self.after = 0;
    self.yielded = 0;
    self.buffer.clear();
    self.done = false;
  }

  fn remaining(&self) -> usize {
    self.limit.map_or(usize::MAX, |l| l.saturating_sub(self.yielded))
  }

  fn fetch_page(&mut self) -> Result<()> {
    let want = self.page_size.min(self.remaining());
    let mut params = Vec::with_capacity(self.filters.len() + 3);
    params.push(Value::Integer(self.after));
    params.push(Value::Integer(self.upper));
    params.extend(self.filters.iter().cloned());
    params.push(Value::Integer(i64::try_from(want).unwrap_or(i64::MAX)));

    let kind = self.kind;
    let page = snapshot(self.conn, |conn| {
      let mut stmt = conn.prepare_cached(&self.sql)?;
      let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
      let mut page = Vec::with_capacity(want);

      while let Some(row) = rows.next()? {
        let seq: i64 = row.get("seq")?;
        let entity: Entity = match kind {
          EntityKind::Intent => {
            let raw = RawIntent::from_row(row)?;
            let links = load_links(conn, decode_uuid(&raw.entity_id)?)?;
            raw.into_intent(links)?.into()
          }
          EntityKind::Assumption => RawAssumption::from_row(row)?.into_assumption()?.into(),
          EntityKind::Decision => RawDecision::from_row(row)?.into_decision()?.into(),
          EntityKind::Evidence => RawEvidence::from_row(row)?.into_evidence()?.into(),
        };
        page.push((seq, entity));
      }
      Ok(page)
    })?;

    let fetched = page.len();
    for (seq, entity) in page {
      self.after = seq;
      self.buffer.push_back(entity);
    }

    if fetched < want {
      self.done = true;
    }
    Ok(())
  }
}

impl Iterator for Cursor<'_> {
  type Item = Result<Entity>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining() == 0 {
      return None;
    }
    if self.buffer.is_empty() && !self.done {
      if let Err(e) = self.fetch_page() {
        self.done = true;
        self.buffer.clear();
        return Some(Err(e));
      }
    }
    let entity = self.buffer.pop_front()?;
    self.yielded += 1;
    Some(Ok(entity))
  }
}

/// Page query for `query`. Parameters are, in order: the last seen `seq`,
/// the upper `seq` bound, one value per active filter, and the page length.
fn build_sql(query: &ListQuery) -> (String, Vec<Value>) {
  let (columns, from) = match query.kind {
    EntityKind::Intent => (
      INTENT_COLUMNS,
      "intents i JOIN entities e ON e.entity_id = i.entity_id",
    ),
    EntityKind::Assumption => (
      ASSUMPTION_COLUMNS,
      "assumptions a JOIN entities e ON e.entity_id = a.entity_id \
       JOIN intents p ON p.entity_id = a.intent_id",
    ),
    EntityKind::Decision => (
      DECISION_COLUMNS,
      "decisions d JOIN entities e ON e.entity_id = d.entity_id \
       JOIN intents p ON p.entity_id = d.intent_id",
    ),
    EntityKind::Evidence => (
      EVIDENCE_COLUMNS,
      "evidence v JOIN entities e ON e.entity_id = v.entity_id",
    ),
  };

  let mut clauses = vec!["e.seq > ?".to_owned(), "e.seq <= ?".to_owned()];
  let mut filters = Vec::new();
  let mut filter = |clause: &str, value: String| {
    clauses.push(clause.to_owned());
    filters.push(Value::Text(value));
  };

  if let Some(status) = query.status {
    let column = match query.kind {
      EntityKind::Intent => "i.status",
      _ => "p.status",
    };
    filter(&format!("{column} = ?"), status.as_str().to_owned());
  }
  if let Some(intent_id) = query.intent_id {
    let column = match query.kind {
      EntityKind::Decision => "d.intent_id",
      _ => "a.intent_id",
    };
    filter(&format!("{column} = ?"), encode_uuid(intent_id));
  }
  if let Some((kind, id)) = query.related {
    filter("v.related_type = ?", kind.as_str().to_owned());
    filter("v.related_id = ?", encode_uuid(id));
  }
  if let Some(source) = query.source {
    filter("v.source = ?", source.as_str().to_owned());
  }

  let sql = format!(
    "SELECT {columns}, e.seq FROM {from} WHERE {} ORDER BY e.seq LIMIT ?",
    clauses.join(" AND "),
  );
  (sql, filters)
}
