//! relgraph CLI - plan, explain and run selection requests
//!
//! Usage:
//!   relgraph plan <schema.json> <request.json>
//!   relgraph explain <schema.json> <request.json> [--dialect <dialect>]
//!   relgraph run <schema.json> <request.json> [--db <file>] [--seed <file.sql>]
//!
//! A request path of `-` reads the request from stdin.

use clap::{Parser, Subcommand, ValueEnum};
use relgraph::config::{ConnectionError, Driver, Settings, SettingsError};
use relgraph::executor::SqliteManager;
use relgraph::planner::{LevelSource, QueryPlan};
use relgraph::schema::{SchemaDef, SchemaRegistry};
use relgraph::selection::Request;
use relgraph::sql::{Dialect, Emitter};
use relgraph::Engine;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relgraph")]
#[command(about = "relgraph - compile nested selection requests to batched SQL")]
#[command(version)]
struct Cli {
    /// Config file (defaults to RELGRAPH_CONFIG, ./relgraph.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the level structure of a request
    Plan {
        /// Schema description (JSON)
        schema: PathBuf,
        /// Request (JSON), or - for stdin
        request: PathBuf,
    },

    /// Print the SQL each level of a request would run
    Explain {
        schema: PathBuf,
        request: PathBuf,

        /// SQL dialect (overrides the config file)
        #[arg(short, long)]
        dialect: Option<DialectArg>,
    },

    /// Execute a request against a SQLite database and print the JSON response
    Run {
        schema: PathBuf,
        request: PathBuf,

        /// SQLite database file (overrides the config file; in-memory if absent)
        #[arg(long)]
        db: Option<PathBuf>,

        /// SQL script run before the request (e.g. fixtures for an in-memory database)
        #[arg(long)]
        seed: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Postgres,
    Mysql,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Sqlite => Dialect::Sqlite,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Plan { schema, request } => cmd_plan(&settings, &schema, &request),
        Commands::Explain {
            schema,
            request,
            dialect,
        } => cmd_explain(&settings, &schema, &request, dialect),
        Commands::Run {
            schema,
            request,
            db,
            seed,
        } => cmd_run(&settings, &schema, &request, db, seed).await,
    }
}

fn load_registry(path: &Path) -> Result<SchemaRegistry, String> {
    SchemaDef::from_file(path)
        .and_then(SchemaDef::into_registry)
        .map_err(|e| format!("Schema error in '{}': {}", path.display(), e))
}

fn load_request(path: &Path) -> Result<Request, String> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Error reading stdin: {}", e))?;
        buf
    } else {
        fs::read_to_string(path)
            .map_err(|e| format!("Error reading file '{}': {}", path.display(), e))?
    };
    Request::from_json(&text).map_err(|e| format!("Invalid request: {}", e))
}

fn cmd_plan(settings: &Settings, schema: &Path, request: &Path) -> ExitCode {
    let result = load_registry(schema).and_then(|registry| {
        let request = load_request(request)?;
        relgraph::planner::Planner::new(&registry)
            .with_max_depth(settings.execution.max_depth)
            .plan_request(&request)
            .map_err(|e| format!("Planning error: {}", e))
    });

    match result {
        Ok(plan) => {
            print_plan(&plan);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_plan(plan: &QueryPlan) {
    println!(
        "Request: {} ({})",
        plan.entity,
        if plan.single_root() { "object" } else { "list" }
    );
    for level in &plan.levels {
        let source = match &level.source {
            LevelSource::Root { .. } => "root".to_string(),
            LevelSource::Batched { parent } => format!("batched from level {}", parent),
            LevelSource::Junction { parent, table, .. } => {
                format!("junction {} from level {}", table, parent)
            }
        };
        println!(
            "  Level {} [depth {}] {} AS {} ({})",
            level.id, level.depth, level.node.entity, level.node.alias, source
        );
        for (node, _) in level.node.joins() {
            println!("    joins {} AS {}", node.entity, node.alias);
        }
        let columns: Vec<_> = level
            .columns
            .iter()
            .map(|c| format!("{}.{}", c.alias, c.column))
            .collect();
        println!("    columns: {}", columns.join(", "));
    }
}

fn cmd_explain(
    settings: &Settings,
    schema: &Path,
    request: &Path,
    dialect: Option<DialectArg>,
) -> ExitCode {
    let dialect = match dialect {
        Some(d) => Dialect::from(d),
        None => match settings.dialect() {
            Ok(d) => d,
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };
    let mut emitter = Emitter::new(dialect);
    if let Some(schema) = settings.schema() {
        emitter = emitter.with_schema(schema);
    }

    let result = load_registry(schema).and_then(|registry| {
        let request = load_request(request)?;
        relgraph::planner::Planner::new(&registry)
            .with_max_depth(settings.execution.max_depth)
            .plan_request(&request)
            .map(|plan| emitter.explain(&plan))
            .map_err(|e| format!("Planning error: {}", e))
    });

    match result {
        Ok(statements) => {
            for (i, stmt) in statements.iter().enumerate() {
                println!("-- Level {} ({})", i, dialect);
                if !stmt.params.is_empty() {
                    let params: Vec<_> = stmt.params.iter().map(|p| p.to_string()).collect();
                    println!("-- Params: {}", params.join(", "));
                }
                println!("{};", stmt.sql);
                println!();
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_run(
    settings: &Settings,
    schema: &Path,
    request: &Path,
    db: Option<PathBuf>,
    seed: Option<PathBuf>,
) -> ExitCode {
    let registry = match load_registry(schema) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let request = match load_request(request) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let manager = match open_database(settings, db) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(seed) = seed {
        let script = match fs::read_to_string(&seed) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error reading file '{}': {}", seed.display(), e);
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = manager.seed(&script) {
            eprintln!("Seed error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    // SQLite has no schemas; the qualifier only applies to emitted SQL for other dialects.
    let mut run_settings = settings.clone();
    run_settings.dialect = Dialect::Sqlite.to_string();
    run_settings.schema = String::new();

    let engine = match Engine::from_settings(&run_settings, registry, manager) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let response = engine.respond(&request).await;
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing response: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if response.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// The `--db` file, else the configured database, else `DB_*` from the
/// environment, else a fresh in-memory database.
fn open_database(settings: &Settings, db: Option<PathBuf>) -> Result<SqliteManager, String> {
    if let Some(path) = db {
        return Ok(SqliteManager::file(path));
    }

    match settings.connection() {
        Ok(conn) if conn.driver != Driver::Sqlite => Err(format!(
            "Only the sqlite driver can execute requests, not {}",
            conn.driver.as_str()
        )),
        Ok(conn) if !conn.database.is_empty() && conn.database != ":memory:" => {
            Ok(SqliteManager::file(conn.to_connection_string()))
        }
        Ok(_) | Err(SettingsError::Connection(ConnectionError::MissingEnvVar(_))) => {
            SqliteManager::memory().map_err(|e| format!("Database error: {}", e))
        }
        Err(e) => Err(format!("Configuration error: {}", e)),
    }
}
