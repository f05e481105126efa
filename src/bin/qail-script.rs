//! qail-script — run named SQL scripts from the command line
//!
//! # Usage
//!
//! ```bash
//! # List the scripts a directory provides
//! qail-script list --scripts ./sql
//!
//! # Show a script and how it renders
//! qail-script show Queries.ResourceQuery --scripts ./sql --dialect postgres
//!
//! # Run a query / a command
//! qail-script query ResourceQuery --param param=1
//! qail-script exec ResourceCommand --param id=1 --param value=Test
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use qail_script::{
    ActionOptions, Category, CompiledScript, Configuration, Database, Dialect,
    DirectoryScriptProvider, ParameterSet, Row, ScriptProvider, ScriptedAction, Settings, Value,
};
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qail-script")]
#[command(version)]
#[command(about = "Run named SQL scripts", long_about = None)]
#[command(after_help = "EXAMPLES:
    qail-script list --scripts ./sql
    qail-script show Queries.ResourceQuery --scripts ./sql --dialect postgres
    qail-script query ResourceQuery --param param=1 --database-url sqlite://app.db")]
struct Cli {
    /// Settings file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the logical names of every script in a directory
    List {
        #[command(flatten)]
        scripts: ScriptsArg,
    },
    /// Show a script, its rendered SQL and its placeholder order
    Show {
        /// Full logical name, e.g. Queries.ResourceQuery
        name: String,

        #[command(flatten)]
        scripts: ScriptsArg,

        /// Placeholder style to render
        #[arg(long, value_enum, default_value = "sqlite")]
        dialect: DialectArg,
    },
    /// Run Queries.<NAME> and print the rows
    Query {
        name: String,

        #[command(flatten)]
        run: RunArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Run Commands.<NAME> and print the affected-row count
    Exec {
        name: String,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct ScriptsArg {
    /// Script directory
    #[arg(short, long, env = "QAIL_SCRIPTS_DIR")]
    scripts: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    scripts: ScriptsArg,

    /// Parameter as key=value (repeatable)
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,

    /// Database connection URL
    #[arg(long, env = "QAIL_DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Sqlite,
    Postgres,
    Mysql,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("qail_script=debug,info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if let Err(e) = run(&cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let settings = load_settings(cli.config.as_ref())?;

    match &cli.command {
        Commands::List { scripts } => {
            let provider = open_scripts(scripts, &settings)?;
            let names = provider.names();
            if names.is_empty() {
                println!("{}", "(no scripts)".dimmed());
            }
            for name in names {
                println!("{}", name);
            }
        }
        Commands::Show {
            name,
            scripts,
            dialect,
        } => {
            let provider = open_scripts(scripts, &settings)?;
            let source = provider
                .get(name)
                .ok_or_else(|| anyhow!("no script named '{}'", name))?;
            show_script(name, &CompiledScript::compile(source)?, (*dialect).into());
        }
        Commands::Query { name, run, format } => {
            let (action, db) = prepare(Category::Queries, name, run, &settings).await?;
            let mut rx = action.fetch(Some(&db), &Handle::current());
            let mut rows = Vec::new();
            while let Some(row) = rx.recv().await {
                rows.push(row?);
            }
            format_output(&rows, format);
        }
        Commands::Exec { name, run } => {
            let (action, db) = prepare(Category::Commands, name, run, &settings).await?;
            let affected = action.execute(Some(&db)).await?;
            println!("{} {} rows affected", "✓".green(), affected);
        }
    }

    Ok(())
}

fn load_settings(path: Option<&PathBuf>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("reading settings from {}", path.display()))?,
        None => match Settings::default_path().filter(|p| p.is_file()) {
            Some(path) => Settings::load(&path)?,
            None => Settings::default(),
        },
    };
    Ok(settings.with_env())
}

fn open_scripts(arg: &ScriptsArg, settings: &Settings) -> anyhow::Result<DirectoryScriptProvider> {
    let dir = arg
        .scripts
        .clone()
        .or_else(|| settings.scripts_dir.clone())
        .context("no script directory; use --scripts or set QAIL_SCRIPTS_DIR")?;
    Ok(DirectoryScriptProvider::new(dir)?)
}

async fn prepare(
    category: Category,
    name: &str,
    args: &RunArgs,
    settings: &Settings,
) -> anyhow::Result<(ScriptedAction, Database)> {
    let provider = open_scripts(&args.scripts, settings)?;
    let url = args
        .database_url
        .clone()
        .or_else(|| settings.database_url.clone());
    let Some(url) = url else {
        bail!("no database URL; use --database-url or set QAIL_DATABASE_URL");
    };

    info!(%category, name, "loading script");
    let options = ActionOptions::new()
        .provider(&provider)
        .config(Arc::new(Configuration::default()));
    let mut action = ScriptedAction::load(category, name, options)?;
    action.set_parameters(args.params.iter().cloned().collect::<ParameterSet>());

    let db = Database::connect_with(&url, &settings.pool).await?;
    Ok((action, db))
}

fn show_script(name: &str, script: &CompiledScript, dialect: Dialect) {
    println!("{} {}", "Script:".dimmed(), name.cyan().bold());
    println!();
    println!("{}", script.source().white());
    println!();

    let rendered = script.render(dialect);
    println!("{} {}", "Rendered for".green().bold(), dialect.to_string().green().bold());
    println!("{}", rendered.sql.white());

    if !rendered.bindings.is_empty() {
        println!();
        println!("{}", "Bindings:".cyan());
        for (i, name) in rendered.bindings.iter().enumerate() {
            let marker = if dialect.numbered_placeholders() {
                format!("${}", i + 1)
            } else {
                format!("#{}", i + 1)
            };
            println!("  {} = @{}", marker, name.yellow());
        }
    }
}

/// Parse `key=value`; the value is read as an integer, a float, a boolean,
/// `null`, or else text.
fn parse_param(arg: &str) -> Result<(String, Value), String> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", arg))?;
    let key = key.trim().trim_start_matches('@');
    if key.is_empty() {
        return Err(format!("missing parameter name in '{}'", arg));
    }

    let value = if let Ok(n) = raw.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if raw == "true" {
        Value::Bool(true)
    } else if raw == "false" {
        Value::Bool(false)
    } else if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else {
        Value::Text(raw.to_string())
    };
    Ok((key.to_string(), value))
}

fn format_output(rows: &[Row], format: &OutputFormat) {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| serde_json::Value::Object(row.to_json()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Table => {
            let columns = rows[0].columns();

            // Calculate column widths
            let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
            for row in rows {
                for (i, value) in row.values().iter().enumerate() {
                    if let Some(w) = widths.get_mut(i) {
                        *w = (*w).max(value.to_string().chars().count());
                    }
                }
            }

            // Print header
            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = *w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            // Print separator
            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            // Print rows
            for row in rows {
                let cells: Vec<String> = row
                    .values()
                    .iter()
                    .zip(&widths)
                    .map(|(v, w)| format!("{:width$}", v.to_string(), width = *w))
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", rows.len().to_string().cyan());
        }
    }
}
