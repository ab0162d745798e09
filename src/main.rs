use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use numbers4_api::api::{ApiClient, SyncOutcome};
use numbers4_api::config;
use numbers4_api::database;
use numbers4_api::freshness::ClientCache;
use numbers4_api::pipeline::{self, UpdateOptions};
use numbers4_api::publish::PublishOptions;
use numbers4_api::server::{self, AppState};
use numbers4_api::validate;

#[derive(Parser)]
#[command(name = "numbers4-api", about = "Publish Numbers4 draw results as static JSON")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append generator output (*.json rows) to the archive
    Ingest { dir: PathBuf },
    /// Seed an empty archive from a published numbers4_all_full.json
    Import { file: PathBuf },
    /// Build, validate and publish the four JSON files
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        compact: bool,
    },
    /// Locked ingest + export, optionally committing the result
    Update {
        dir: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        compact: bool,
        #[arg(long)]
        commit: bool,
        #[arg(long)]
        push: bool,
    },
    /// Check a published directory for inconsistencies
    Validate {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Serve the published files over HTTP
    Serve {
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,
    },
    /// Compare the cached draw number against a published version.json
    Check {
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        sync: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = config::load()?;

    run(cli.command, config).await.inspect_err(|e| {
        tracing::error!("{:#}", e);
    })
}

async fn run(command: Command, config: config::Config) -> Result<()> {
    match command {
        Command::Ingest { dir } => {
            let mut conn = database::open_database(&config.database_path)?;
            let summary = pipeline::ingest_dir(&mut conn, &dir)
                .with_context(|| format!("ingesting {}", dir.display()))?;
            println!(
                "🎟️ {} appended, {} filled, {} unchanged",
                summary.appended, summary.filled, summary.unchanged
            );
        }
        Command::Import { file } => {
            let mut conn = database::open_database(&config.database_path)?;
            let imported = pipeline::import_file(&mut conn, &file)
                .with_context(|| format!("importing {}", file.display()))?;
            println!("🎟️ Imported {} draws", imported);
        }
        Command::Export { out, compact } => {
            let out = out.unwrap_or(config.api_dir);
            let conn = database::open_database(&config.database_path)?;
            let options = PublishOptions {
                compact: compact || config.compact,
            };
            let report = pipeline::export_to(&conn, &out, &options)?;
            print_report(&report);
        }
        Command::Update {
            dir,
            out,
            compact,
            commit,
            push,
        } => {
            let options = UpdateOptions {
                input_dir: dir,
                database_path: config.database_path,
                out_dir: out.unwrap_or(config.api_dir),
                publish: PublishOptions {
                    compact: compact || config.compact,
                },
                commit,
                push,
            };
            let summary = pipeline::run_update(&options)?;
            match &summary.published {
                Some(report) => print_report(report),
                None => println!("🎯 Already up to date. Nothing to publish."),
            }
            if let Some(hash) = &summary.commit {
                println!("📦 Committed {}", hash);
            }
        }
        Command::Validate { dir } => {
            let dir = dir.unwrap_or(config.api_dir);
            let violations = validate::validate_dir(&dir)?;
            if !violations.is_empty() {
                for violation in &violations {
                    eprintln!("✗ {}", violation);
                }
                bail!("{} violation(s) in {}", violations.len(), dir.display());
            }
            println!("✅ {} is consistent", dir.display());
        }
        Command::Serve { dir, bind } => {
            let state = AppState::new(dir.unwrap_or(config.api_dir), config.cache_max_age)?;
            server::serve(state, bind.unwrap_or(config.bind_addr)).await?;
        }
        Command::Check { base_url, sync } => {
            let client = ApiClient::new(base_url.unwrap_or(config.base_url));
            if sync {
                match client.sync(&config.cache_path).await? {
                    SyncOutcome::UpToDate { latest_draw_no } => {
                        println!("🎯 Up to date (第{}回)", latest_draw_no)
                    }
                    SyncOutcome::Refreshed {
                        previous, version, ..
                    } => println!(
                        "✅ Refreshed: {:?} → {} ({})",
                        previous, version.latest_draw_no, version.version
                    ),
                }
            } else {
                let cache = ClientCache::load(&config.cache_path)?;
                let (version, freshness) = client.check(cache.latest_draw_no).await?;
                if freshness.is_stale() {
                    println!(
                        "📥 Stale: cached {:?}, published {}. Re-fetch all_min and all_full.",
                        cache.latest_draw_no, version.latest_draw_no
                    );
                } else {
                    println!("🎯 Up to date (第{}回)", version.latest_draw_no);
                }
            }
        }
    }
    Ok(())
}

fn print_report(report: &numbers4_api::PublishReport) {
    for file in &report.files {
        println!(
            "  wrote {} ({:.1} KB)",
            file.path.display(),
            file.bytes as f64 / 1024.0
        );
    }
    println!(
        "✅ Published 第{}回 ({}) as version {}",
        report.latest_draw_no, report.latest_date, report.version
    );
}
