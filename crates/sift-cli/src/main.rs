//! `sift` — load and query a Sift record index from the command line.
//!
//! # Usage
//!
//! ```
//! sift --store index.db load records.jsonl
//! sift --store index.db rows --sel param=2t,tp --order step=desc --keys param,step
//! sift --store index.db duplicate subset.db --sel levtype=sfc
//! ```
//!
//! Settings come from `sift.toml` (or `--config`), then `SIFT_`-prefixed
//! environment variables, then flags.

mod filters;

use std::{
  fs::File,
  io::{self, BufRead, BufReader, Write},
  path::{Path, PathBuf},
};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use filters::FilterArgs;
use serde::Deserialize;
use sift_core::Record;
use sift_store_sqlite::{SqliteStore, StoreConfig};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sift", author, version, about = "Sift record index")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "sift.toml")]
  config: PathBuf,

  /// Index database; overrides `store_path` from the configuration.
  #[arg(short, long, value_name = "PATH")]
  store: Option<PathBuf>,

  /// Rows fetched per query and records inserted per batch.
  #[arg(long)]
  page_size: Option<usize>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load JSON records, one object per line (`-` reads stdin).
  Load {
    input: PathBuf,
    /// Build column indexes once loaded.
    #[arg(long)]
    index: bool,
  },
  /// Count the rows matching the filters.
  Count {
    #[command(flatten)]
    filters: FilterArgs,
  },
  /// Print matching rows as JSON lines.
  Rows {
    #[command(flatten)]
    filters: FilterArgs,
    /// Keys to print; every key when omitted.
    #[arg(long, value_delimiter = ',')]
    keys:    Vec<String>,
    #[arg(long)]
    limit:   Option<u64>,
    #[arg(long)]
    offset:  Option<u64>,
  },
  /// Print the file locations of matching rows as JSON lines.
  Parts {
    #[command(flatten)]
    filters: FilterArgs,
    #[arg(long)]
    limit:   Option<u64>,
    #[arg(long)]
    offset:  Option<u64>,
  },
  /// Print the distinct values of a key.
  Values {
    key:     String,
    #[command(flatten)]
    filters: FilterArgs,
  },
  /// Copy the matching rows into a new index.
  Duplicate {
    target:  PathBuf,
    #[command(flatten)]
    filters: FilterArgs,
  },
  /// Build indexes on the attribute and path columns.
  Index,
  /// Print the view definitions behind the filters.
  Explain {
    #[command(flatten)]
    filters: FilterArgs,
  },
  /// Print the values recorded in a coordinate table.
  Coords { key: String },
}

// ─── Config file ──────────────────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct Settings {
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
  #[serde(default)]
  store:      StoreConfig,
}

fn default_store_path() -> PathBuf { PathBuf::from("index.db") }

fn load_settings(cli: &Cli) -> Result<Settings> {
  let mut settings: Settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("SIFT").separator("__"))
    .build()
    .context("failed to read config file")?
    .try_deserialize()
    .context("failed to deserialise settings")?;

  if let Some(path) = &cli.store {
    settings.store_path = path.clone();
  }
  if let Some(page_size) = cli.page_size {
    settings.store.page_size = page_size;
  }
  Ok(settings)
}

// ─── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = load_settings(&cli)?;
  let store = SqliteStore::open_with(&settings.store_path, settings.store);
  let mut out = io::stdout().lock();

  match cli.command {
    Command::Load { input, index } => {
      let count = load(&store, &input)?;
      writeln!(out, "{count}")?;
      if index {
        store.build_indexes().context("failed to build indexes")?;
      }
    }
    Command::Count { filters } => {
      let count = filters.apply(&store)?.count().context("failed to count rows")?;
      writeln!(out, "{count}")?;
    }
    Command::Rows { filters, keys, limit, offset } => {
      let records = filters
        .apply(&store)?
        .lookup_records(keys.as_slice(), limit, offset)
        .context("failed to look up rows")?;
      for record in records.iter() {
        let record = record.context("failed to read row")?;
        writeln!(out, "{}", serde_json::to_string(&record)?)?;
      }
    }
    Command::Parts { filters, limit, offset } => {
      let parts = filters
        .apply(&store)?
        .lookup_parts(limit, offset)
        .context("failed to look up file locations")?;
      for part in parts {
        writeln!(out, "{}", serde_json::to_string(&part)?)?;
      }
    }
    Command::Values { key, filters } => {
      let values = filters
        .apply(&store)?
        .distinct_values(&key)
        .with_context(|| format!("failed to read values of {key}"))?;
      for value in values {
        writeln!(out, "{}", serde_json::to_string(&value)?)?;
      }
    }
    Command::Duplicate { target, filters } => {
      let copy = filters
        .apply(&store)?
        .duplicate(&target)
        .with_context(|| format!("failed to duplicate into {}", target.display()))?;
      writeln!(out, "{}", copy.count()?)?;
    }
    Command::Index => {
      let count = store.build_indexes().context("failed to build indexes")?;
      info!("{count} indexes on {}", settings.store_path.display());
    }
    Command::Explain { filters } => {
      for statement in filters.apply(&store)?.explain()? {
        writeln!(out, "{statement};")?;
      }
    }
    Command::Coords { key } => {
      let values = store
        .coordinate_values(&key)
        .with_context(|| format!("failed to read coordinates of {key}"))?;
      for value in values {
        writeln!(out, "{value}")?;
      }
    }
  }
  Ok(())
}

/// Stream JSON lines from `input` into `store`.
fn load(store: &SqliteStore, input: &Path) -> Result<usize> {
  let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
    Box::new(io::stdin().lock())
  } else {
    let file = File::open(input)
      .with_context(|| format!("failed to open {}", input.display()))?;
    Box::new(BufReader::new(file))
  };

  let mut read_error = None;
  let records = reader
    .lines()
    .map_while(|line| line.map_err(|e| read_error = Some(e)).ok())
    .filter(|line| !line.trim().is_empty())
    .map(|line| Record::from_json(&line));
  let loaded = store.try_load(records);

  if let Some(e) = read_error {
    return Err(e).with_context(|| format!("failed to read {}", input.display()));
  }
  loaded.with_context(|| format!("failed to load {}", input.display()))
}
