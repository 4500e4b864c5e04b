use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use greymoon_core::{LeadStatus, ScrapeRun};
use greymoon_ingest::{build_ingestor, Backends, IngestConfig, PollerReport};
use greymoon_storage::Transition;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "greymoon")]
#[command(about = "Greymoon lead ingestion command-line interface")]
struct Cli {
    /// Keep leads and runs in memory instead of PostgreSQL.
    #[arg(long, global = true)]
    in_memory: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply database migrations.
    Migrate,
    /// Start one scrape run and poll it until the remote job finishes.
    Scrape {
        /// Craigslist site codes, comma separated.
        #[arg(long, value_delimiter = ',', required = true)]
        cities: Vec<String>,
    },
    /// Scrape cities in chunks, one run at a time. Defaults to every known city.
    Sweep {
        #[arg(long, value_delimiter = ',')]
        cities: Vec<String>,
    },
    /// Abort a running scrape.
    Abort { run_id: String },
    /// Show the most recent run.
    Status,
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List the newest leads.
    Leads {
        #[arg(long, default_value_t = 500)]
        limit: usize,
    },
    SetStatus {
        external_id: String,
        status: LeadStatus,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("greymoon=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = IngestConfig::from_env();
    let backends = if cli.in_memory {
        Backends::memory()
    } else {
        Backends::postgres(&config).await?
    };

    match cli.command {
        Commands::Migrate if cli.in_memory => println!("nothing to migrate in memory"),
        Commands::Migrate => {
            // Connecting already ran the embedded migrations.
            println!("migrations applied");
        }
        Commands::Scrape { cities } => {
            let ingestor = build_ingestor(&config, &backends)?;
            let handle = ingestor.start_run(&cities).await?;
            info!(run_id = handle.run_id(), "waiting for run to finish");
            let report = handle.join().await.context("poller task panicked")?;
            print_report(&report);
        }
        Commands::Sweep { cities } => {
            let cities = if cities.is_empty() {
                greymoon_apify::US_CITIES
                    .iter()
                    .map(|c| c.to_string())
                    .collect()
            } else {
                cities
            };
            let ingestor = build_ingestor(&config, &backends)?;
            for report in ingestor.sweep(&cities).await? {
                print_report(&report);
            }
        }
        Commands::Abort { run_id } => {
            let ingestor = build_ingestor(&config, &backends)?;
            match ingestor.abort_run(&run_id).await? {
                Transition::Applied => println!("run {run_id} aborted"),
                Transition::AlreadyTerminal(status) => {
                    println!("run {run_id} already finished with status {status}")
                }
            }
        }
        Commands::Status => match backends.runs.latest().await? {
            Some(run) => print_run(&run),
            None => println!("no runs recorded"),
        },
        Commands::History { limit } => {
            for run in backends.runs.history(limit).await? {
                print_run(&run);
            }
        }
        Commands::Leads { limit } => {
            for lead in backends.leads.recent(limit).await? {
                println!(
                    "{}\t{}\t{:>3}\t{}\t{}\t{}",
                    lead.external_id,
                    lead.status,
                    lead.score,
                    lead.phone.as_deref().unwrap_or("-"),
                    lead.location.as_deref().unwrap_or("-"),
                    lead.title
                );
            }
        }
        Commands::SetStatus {
            external_id,
            status,
        } => {
            if backends.leads.set_status(&external_id, status).await? {
                println!("lead {external_id} is now {status}");
            } else {
                anyhow::bail!("no lead with external id {external_id}");
            }
        }
    }

    Ok(())
}

fn print_report(report: &PollerReport) {
    println!(
        "run complete: run_id={} status={} offset={} pages={} accepted={} duplicates={} rejected={}",
        report.run_id,
        report.final_status,
        report.offset,
        report.pages_fetched,
        report.accepted,
        report.duplicates,
        report.rejected
    );
}

fn print_run(run: &ScrapeRun) {
    let finished = run
        .finished_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}\t{}\tleads={}\tstarted={}\tfinished={}",
        run.run_id,
        run.status,
        run.leads_collected,
        run.created_at.to_rfc3339(),
        finished
    );
}
