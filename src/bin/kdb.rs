//! Minimal line-oriented demo shell driving [`kdb::db::DbHandle`]
//! through its dot-commands. Not a SQL compiler — the full SQL-ish
//! parser/REPL this crate feeds is a separate, external concern.

use std::io::{self, BufRead, Write};

use clap::Parser;
use kdb::db::DbHandle;
use kdb::repl::history;
use kdb::storage::schema::{ColumnSchema, ColumnType, TableSchema};
use kdb::storage::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kdb", version, about = "Single-file embedded relational store.")]
struct Cli {
    /// Path to the database file. Created if it doesn't exist.
    #[arg(env = "KDB_PATH", default_value = "kdb.db")]
    path: String,

    /// Bounded page cache capacity.
    #[arg(long, env = "KDB_CACHE_CAPACITY", default_value = "128")]
    cache_capacity: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let mut db = match DbHandle::open_db(&cli.path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("failed to open {}: {e}", cli.path);
            std::process::exit(1);
        }
    };

    let history_path = history::get_home_file(".kdb_history".to_string());
    history::ensure_history_file(&history_path).ok();

    println!("kdb — {} (.help for commands)", cli.path);
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        history::append_history(line, &history_path).ok();
        if line == ".quit" || line == ".exit" {
            break;
        }
        if let Err(e) = dispatch(&mut db, line) {
            println!("Error: {e}");
        }
        io::stdout().flush().ok();
    }

    if let Err(e) = db.close_db() {
        eprintln!("error flushing on close: {e}");
        std::process::exit(1);
    }
}

fn dispatch(db: &mut DbHandle, line: &str) -> kdb::error::Result<()> {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    match cmd {
        ".help" => {
            println!(".tables | .create NAME col:TYPE[,...] | .insert NAME v1,v2,... | .select NAME | .get NAME key | .quit");
            Ok(())
        }
        ".tables" => {
            for name in db.list_tables()? {
                println!("{name}");
            }
            Ok(())
        }
        ".create" => cmd_create(db, rest),
        ".insert" => cmd_insert(db, rest),
        ".select" => cmd_select(db, rest),
        ".get" => cmd_get(db, rest),
        other => {
            println!("unrecognized command {other:?} (try .help)");
            Ok(())
        }
    }
}

fn cmd_create(db: &mut DbHandle, rest: &str) -> kdb::error::Result<()> {
    let (name, cols) = rest
        .split_once(' ')
        .ok_or_else(|| kdb::error::Error::SchemaMismatch("usage: .create NAME col:TYPE[,...]".into()))?;
    let mut columns = Vec::new();
    for (i, part) in cols.split(',').enumerate() {
        let (col_name, ty) = part
            .split_once(':')
            .ok_or_else(|| kdb::error::Error::SchemaMismatch(format!("malformed column {part:?}")))?;
        let col_type = match ty {
            "INTEGER" | "INT" => ColumnType::Integer,
            "TEXT" => ColumnType::Text,
            other => return Err(kdb::error::Error::SchemaMismatch(format!("unknown type {other:?}"))),
        };
        let mut col = ColumnSchema::new(col_name, col_type);
        if i == 0 {
            col = col.primary();
        }
        columns.push(col);
    }
    let schema = TableSchema::new(columns)?;
    db.create_table(name, schema, rest)?;
    println!("created table {name}");
    Ok(())
}

fn cmd_insert(db: &mut DbHandle, rest: &str) -> kdb::error::Result<()> {
    let (name, values) = rest
        .split_once(' ')
        .ok_or_else(|| kdb::error::Error::SchemaMismatch("usage: .insert NAME v1,v2,...".into()))?;
    let mut table = db
        .open_table(name)?
        .ok_or_else(|| kdb::error::Error::NotFound(name.to_string()))?;
    let schema = table.schema().clone();
    let mut row = Vec::new();
    for (col, part) in schema.columns.iter().zip(values.split(',')) {
        let value = match col.col_type {
            ColumnType::Integer => part
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| kdb::error::Error::SchemaMismatch(format!("{part:?} is not an integer")))?,
            ColumnType::Text => Value::Text(part.to_string()),
        };
        row.push(value);
    }
    db.insert(&mut table, row)?;
    println!("inserted into {name}");
    Ok(())
}

fn cmd_select(db: &mut DbHandle, name: &str) -> kdb::error::Result<()> {
    let table = db
        .open_table(name.trim())?
        .ok_or_else(|| kdb::error::Error::NotFound(name.to_string()))?;
    for row in db.select_all(&table)? {
        println!("{row}");
    }
    Ok(())
}

fn cmd_get(db: &mut DbHandle, rest: &str) -> kdb::error::Result<()> {
    let (name, key) = rest
        .split_once(' ')
        .ok_or_else(|| kdb::error::Error::SchemaMismatch("usage: .get NAME key".into()))?;
    let table = db
        .open_table(name)?
        .ok_or_else(|| kdb::error::Error::NotFound(name.to_string()))?;
    let key: u64 = key
        .trim()
        .parse()
        .map_err(|_| kdb::error::Error::SchemaMismatch(format!("{key:?} is not a key")))?;
    match db.select_by_pkey(&table, key)? {
        Some(row) => println!("{row}"),
        None => println!("(not found)"),
    }
    Ok(())
}
