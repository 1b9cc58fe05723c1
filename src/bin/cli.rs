//! btreedb CLI
//!
//! Runs single CRUD operations against a btreedb store, configured the way
//! a benchmark harness configures it (properties file plus overrides).

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use btreedb::measurements::{create_measurements, MeasuredDb};
use btreedb::{Db, DbFactory, Field, Properties, Result, Row, Status, BTREE_DB_NAME};

/// btreedb CLI
#[derive(Parser, Debug)]
#[command(name = "btreedb-cli")]
#[command(about = "Run CRUD operations against a btreedb store")]
#[command(version)]
struct Args {
    /// Properties file to load
    #[arg(short = 'P', long = "properties")]
    properties: Option<PathBuf>,

    /// Property override, `key=value` (repeatable)
    #[arg(short = 'p', long = "prop")]
    props: Vec<String>,

    /// Database backend name
    #[arg(long, default_value = BTREE_DB_NAME)]
    db: String,

    /// Table name (ignored by btreedb)
    #[arg(long, default_value = "usertable")]
    table: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert a record: `insert <key> name=value...`
    Insert {
        key: String,
        fields: Vec<String>,
    },

    /// Replace a record: `update <key> name=value...`
    Update {
        key: String,
        fields: Vec<String>,
    },

    /// Read a record, optionally only some fields (in stored order)
    Read {
        key: String,
        #[arg(short, long, value_delimiter = ',')]
        fields: Option<Vec<String>>,
    },

    /// Read up to `count` records starting at `key`
    Scan {
        key: String,
        count: usize,
        #[arg(short, long, value_delimiter = ',')]
        fields: Option<Vec<String>>,
    },

    /// Delete a record (a no-op for btreedb)
    Delete { key: String },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,btreedb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut props = match &args.properties {
        Some(path) => Properties::load(path)?,
        None => Properties::new(),
    };
    for pair in &args.props {
        props.set_pair(pair)?;
    }

    let factory = DbFactory::with_defaults();
    let measurements = create_measurements(&props)?;
    let db = MeasuredDb::new(factory.create(&args.db, &props)?, Arc::clone(&measurements));

    let table = args.table.as_str();
    let outcome = execute(&db, table, args.command);

    tracing::info!("{}", measurements.status_msg());
    Box::new(db).cleanup()?;
    outcome
}

fn execute(db: &dyn Db, table: &str, command: Commands) -> Result<()> {
    match command {
        Commands::Insert { key, fields } => {
            let result = db.insert(table, &key, &parse_fields(&fields)?);
            println!("{:?}", Status::of(&result));
            result
        }
        Commands::Update { key, fields } => {
            let result = db.update(table, &key, &parse_fields(&fields)?);
            println!("{:?}", Status::of(&result));
            result
        }
        Commands::Read { key, fields } => {
            let names = fields.map(field_names);
            let result = db.read(table, &key, names.as_deref());
            println!("{:?}", Status::of_lookup(&result));
            if let Some(row) = result? {
                print_row(&key, &row);
            }
            Ok(())
        }
        Commands::Scan { key, count, fields } => {
            let names = fields.map(field_names);
            let result = db.scan(table, &key, count, names.as_deref());
            println!("{:?}", Status::of(&result));
            for (i, row) in result?.iter().enumerate() {
                print_row(&format!("#{}", i), row);
            }
            Ok(())
        }
        Commands::Delete { key } => {
            let result = db.delete(table, &key);
            println!("{:?}", Status::of(&result));
            result
        }
    }
}

fn parse_fields(pairs: &[String]) -> Result<Vec<Field>> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                btreedb::BTreeDbError::Config(format!("expected name=value, got {:?}", pair))
            })?;
            Ok(Field::new(name.to_string(), value.to_string()))
        })
        .collect()
}

fn field_names(names: Vec<String>) -> Vec<Bytes> {
    names.into_iter().map(Bytes::from).collect()
}

fn print_row(label: &str, row: &Row) {
    let rendered: Vec<String> = row
        .iter()
        .map(|f| {
            format!(
                "{}={}",
                f.name_lossy(),
                String::from_utf8_lossy(&f.value)
            )
        })
        .collect();
    println!("{}: {}", label, rendered.join(" "));
}
