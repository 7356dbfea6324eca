//! `pqm`: look at live tables the way the reconciler sees them.

mod config;

use clap::{Parser, Subcommand};
use config::{CliError, DbArgs};
use owo_colors::OwoColorize;
use pqm::schema::LiveSchema;
use pqm::schema::codegen::live_to_rust;

/// Inspect live Postgres tables and generate pqm declarations.
#[derive(Debug, Parser)]
#[command(name = "pqm", version, about)]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the snapshot the reconciler would diff against
    Inspect {
        /// Table name in the current schema
        table: String,
    },
    /// Print a Rust declaration matching the live table
    Codegen {
        /// Table name in the current schema
        table: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let client = cli.db.connect().await?;
    let options = cli.db.options();

    let table = match &cli.command {
        Commands::Inspect { table } | Commands::Codegen { table } => table,
    };
    let live = pqm::read_live_schema(&client, table, &options).await?;
    if live.is_empty() {
        return Err(CliError::TableNotFound(table.clone()));
    }

    match cli.command {
        Commands::Inspect { .. } => print_live(&live, &options.identity_column),
        Commands::Codegen { .. } => println!("{}", live_to_rust(&live)),
    }
    Ok(())
}

fn print_live(live: &LiveSchema, identity_column: &str) {
    println!(
        "{} ({} columns, {} constraints)",
        live.name.bold(),
        live.columns.len(),
        live.keys.len()
    );
    println!("  {}", format!("{}: bigserial PRIMARY KEY", identity_column).dimmed());

    for (name, col) in &live.columns {
        let mut ty = if col.data_type == "ARRAY" {
            format!("{}[]", col.udt_name.trim_start_matches('_'))
        } else {
            col.data_type.clone()
        };
        if col.length > 0 {
            ty = format!("{}({})", ty, col.length);
        }

        let mut attrs = Vec::new();
        if col.not_null {
            attrs.push("NOT NULL".to_string());
        }
        if !col.default.is_empty() {
            attrs.push(format!("DEFAULT {}", col.default));
        }
        let attrs = if attrs.is_empty() {
            String::new()
        } else {
            format!(" [{}]", attrs.join(", "))
        };

        println!("  {}: {}{}", name.cyan(), ty, attrs.dimmed());
    }

    for (name, key) in &live.keys {
        let kind = if key.is_unique {
            "UNIQUE".green().to_string()
        } else if key.is_reference {
            "FK".yellow().to_string()
        } else {
            "CONSTRAINT".to_string()
        };
        if key.is_reference {
            println!(
                "  {} {}: {} -> {}.{}",
                kind,
                name,
                key.from_columns.join(", "),
                key.to_table,
                key.to_columns.join(", ")
            );
        } else {
            println!("  {} {}: {}", kind, name, key.from_columns.join(", "));
        }
    }
}
