//! `axiom`: record why code exists, next to the code.
//!
//! # Usage
//!
//! ```text
//! axiom init
//! axiom new "Reduce login latency" --problem "p99 is 900ms"
//! axiom assume 3f2a "session lookup dominates" --confidence 0.6 --risk "cache won't help"
//! axiom decide 3f2a "cache sessions in memory" --rationale "removes a hop" \
//!   --alternative "redis:another service to run"
//! axiom status 3f2a active
//! axiom list decision --status active
//! axiom show 3f2a
//! ```
//!
//! Ids may be abbreviated to any unique prefix. Records are printed as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use axiom_core::{
  assumption::NewAssumption,
  decision::{Alternative, NewDecision},
  entity::{Entity, EntityKind},
  evidence::{EvidenceSource, NewEvidence, RelatedKind},
  intent::{IntentStatus, NewIntent},
  query::{ListQuery, Queries as _},
  store::ReasoningStore,
};
use axiom_store_sqlite::{RepositoryBinding, SqliteStore, StoreConfig, find_root};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
  name = "axiom",
  author,
  version,
  about = "Intent, assumption and decision log for a repository"
)]
struct Cli {
  /// Repository root. Defaults to the repository enclosing the working
  /// directory.
  #[arg(long, global = true, env = "AXIOM_REPO", value_name = "DIR")]
  repo: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create (or reuse) the repository's `.intent/` data directory.
  Init,

  /// Record a new intent in draft status.
  New {
    title:       String,
    #[arg(long, default_value = "")]
    problem:     String,
    #[arg(long, default_value = "")]
    context:     String,
    /// May be repeated.
    #[arg(long = "constraint", value_name = "TEXT")]
    constraints: Vec<String>,
  },

  /// List records of one kind in creation order.
  List {
    #[arg(value_enum)]
    kind:   Kind,
    /// Intent status (for assumptions and decisions: the parent's status).
    #[arg(long)]
    status: Option<IntentStatus>,
    /// Owning intent of assumptions or decisions.
    #[arg(long, value_name = "ID")]
    intent: Option<String>,
    /// Record that evidence points at.
    #[arg(long, value_name = "ID")]
    about:  Option<String>,
    #[arg(long)]
    source: Option<EvidenceSource>,
    #[arg(long)]
    limit:  Option<usize>,
  },

  /// Print one record, with an intent's assumptions and decisions.
  Show { id: String },

  /// Move an intent to a new status.
  Status { intent: String, status: IntentStatus },

  /// Attach an assumption to an intent.
  Assume {
    intent:     String,
    statement:  String,
    #[arg(long)]
    confidence: f64,
    #[arg(long = "risk", value_name = "TEXT")]
    risk:       String,
  },

  /// Re-assess an assumption's confidence.
  Revalidate { assumption: String, confidence: f64 },

  /// Record a decision against an intent.
  Decide {
    intent:       String,
    summary:      String,
    #[arg(long)]
    rationale:    String,
    /// `option:reason rejected`; may be repeated.
    #[arg(long = "alternative", value_name = "OPTION:REASON", value_parser = parse_alternative)]
    alternatives: Vec<Alternative>,
    #[arg(long, default_value = "")]
    tradeoffs:    String,
  },

  /// Record evidence about an intent, assumption or decision.
  Evidence {
    about:       String,
    description: String,
    #[arg(long, default_value = "manual")]
    source:      EvidenceSource,
  },

  /// Link a commit identifier to an intent.
  LinkCommit { intent: String, commit: String },

  /// Link a file path to an intent.
  LinkPath { intent: String, path: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
  Intent,
  Assumption,
  Decision,
  Evidence,
}

impl From<Kind> for EntityKind {
  fn from(k: Kind) -> Self {
    match k {
      Kind::Intent => Self::Intent,
      Kind::Assumption => Self::Assumption,
      Kind::Decision => Self::Decision,
      Kind::Evidence => Self::Evidence,
    }
  }
}

fn parse_alternative(s: &str) -> Result<Alternative, String> {
  let (option, reason) = s
    .split_once(':')
    .ok_or_else(|| format!("expected OPTION:REASON, got {s:?}"))?;
  Ok(Alternative::new(option.trim(), reason.trim()))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let root = match &cli.repo {
    Some(root) => root.clone(),
    None => {
      let cwd = std::env::current_dir().context("reading working directory")?;
      find_root(&cwd).context("locating repository")?
    }
  };
  // Only `init` may create the data directory.
  let binding = match cli.command {
    Command::Init => RepositoryBinding::bind(&root),
    _ => RepositoryBinding::existing(&root),
  }
  .with_context(|| format!("binding repository at {}", root.display()))?;
  let config = StoreConfig::load(&binding.config_path()).context("loading config")?;
  let store = SqliteStore::open(binding.clone(), config).context("opening store")?;

  run(&store, &binding, cli.command)
}

fn run(store: &SqliteStore, binding: &RepositoryBinding, command: Command) -> Result<()> {
  match command {
    Command::Init => print(&binding.metadata()?),

    Command::New { title, problem, context, constraints } => {
      let intent = store.create_intent(NewIntent { title, problem, context, constraints })?;
      print(&intent)
    }

    Command::List { kind, status, intent, about, source, limit } => {
      let mut query = ListQuery::of(kind.into());
      query.status = status;
      query.intent_id = intent.map(|p| resolve(store, &p)).transpose()?;
      query.related = about.map(|p| related(store, &p)).transpose()?;
      query.source = source;
      query.limit = limit;
      print(&store.list(&query)?)
    }

    Command::Show { id } => {
      let id = resolve(store, &id)?;
      show(store, id)
    }

    Command::Status { intent, status } => {
      let id = resolve(store, &intent)?;
      print(&store.update_intent_status(id, status)?)
    }

    Command::Assume { intent, statement, confidence, risk } => {
      let intent_id = resolve(store, &intent)?;
      let assumption = store
        .create_assumption(NewAssumption::new(intent_id, statement, confidence, risk))?;
      print(&assumption)
    }

    Command::Revalidate { assumption, confidence } => {
      let id = resolve(store, &assumption)?;
      print(&store.revalidate_assumption(id, confidence)?)
    }

    Command::Decide { intent, summary, rationale, alternatives, tradeoffs } => {
      let intent_id = resolve(store, &intent)?;
      let decision = store.create_decision(NewDecision {
        alternatives_considered: alternatives,
        tradeoffs,
        ..NewDecision::new(intent_id, summary, rationale)
      })?;
      print(&decision)
    }

    Command::Evidence { about, description, source } => {
      let (related_type, related_id) = related(store, &about)?;
      let evidence = store
        .create_evidence(NewEvidence::new(related_type, related_id, description, source))?;
      print(&evidence)
    }

    Command::LinkCommit { intent, commit } => {
      let id = resolve(store, &intent)?;
      print(&store.link_commit(id, &commit)?)
    }

    Command::LinkPath { intent, path } => {
      let id = resolve(store, &intent)?;
      print(&store.link_path(id, &path)?)
    }
  }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn resolve(store: &SqliteStore, prefix: &str) -> Result<Uuid> {
  store
    .resolve_prefix(prefix)
    .with_context(|| format!("resolving id {prefix:?}"))
}

/// Resolve an evidence target and infer its kind from the stored record.
fn related(store: &SqliteStore, prefix: &str) -> Result<(RelatedKind, Uuid)> {
  let id = resolve(store, prefix)?;
  let kind = match store.get(id)?.kind() {
    EntityKind::Intent => RelatedKind::Intent,
    EntityKind::Assumption => RelatedKind::Assumption,
    EntityKind::Decision => RelatedKind::Decision,
    EntityKind::Evidence => bail!("evidence cannot be the subject of other evidence"),
  };
  Ok((kind, id))
}

#[derive(Serialize)]
struct IntentView<'a> {
  #[serde(flatten)]
  intent:      &'a axiom_core::intent::Intent,
  assumptions: Vec<axiom_core::assumption::Assumption>,
  decisions:   Vec<axiom_core::decision::Decision>,
}

fn show(store: &SqliteStore, id: Uuid) -> Result<()> {
  match store.get(id)? {
    Entity::Intent(intent) => {
      let children = store.children_of(intent.intent_id)?;
      print(&IntentView {
        intent:      &intent,
        assumptions: children.assumptions,
        decisions:   children.decisions,
      })
    }
    other => print(&other),
  }
}

fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  let json = serde_json::to_string_pretty(value).context("serialising output")?;
  println!("{json}");
  Ok(())
}
