//! `clipzip`: browse the extraction catalog and run extractions from a shell.
//!
//! Usage:
//!   # Collections intersecting an area (WKT in the given CRS)
//!   clipzip collections --wkt 'POLYGON((...))' --crs 3978
//!
//!   # Queue an extraction and follow it
//!   clipzip extract --wkt 'POLYGON((...))' --email me@example.com \
//!       --collection nrn_rrn__roads --collection cdem_mpi__cdem
//!
//!   # Follow a job queued earlier
//!   clipzip job 0b6b8f3e-...
//!
//! Logs go to stderr; `RUST_LOG=clipzip_engine=debug` shows every poll.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use clipzip_client::{CatalogService, ExtractionInputs, HttpCatalogService};
use clipzip_engine::{EngineConfig, JobHandle, JobTracker};
use clipzip_types::{CatalogSnapshot, Crs, JobId, JobRecord, JobState, ThemeCollections};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "clipzip")]
#[command(about = "Clip and extract geospatial collections")]
struct Args {
    /// RON config file (see EngineConfig)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Service root, overrides the config file
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List collections, grouped by theme and parent
    Collections {
        /// Area of interest; everything when omitted
        #[arg(long)]
        wkt: Option<String>,

        /// EPSG code of the WKT
        #[arg(long, default_value_t = Crs::CANADA_ATLAS_LAMBERT.code())]
        crs: u32,

        /// Language tag, overrides the config file
        #[arg(long)]
        lang: Option<String>,

        /// Print the raw collection list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Queue an extraction
    Extract {
        #[arg(long)]
        wkt: String,

        #[arg(long)]
        email: String,

        /// Collection id; repeat for several
        #[arg(long = "collection", required = true)]
        collections: Vec<String>,

        #[arg(long, default_value_t = Crs::CANADA_ATLAS_LAMBERT.code())]
        crs: u32,

        /// EPSG code of the extracted data
        #[arg(long)]
        out_crs: Option<u32>,

        /// Print the job id and exit instead of polling
        #[arg(long)]
        no_wait: bool,
    },

    /// Follow a queued job until it finishes
    Job { job_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(url) = args.url {
        config.service_url = url;
    }

    let service: Arc<dyn CatalogService> = Arc::new(HttpCatalogService::new(&config.service_url)?);
    tracing::debug!(url = %config.service_url, "using service");

    match args.command {
        Command::Collections { wkt, crs, lang, json } => {
            let lang = lang.unwrap_or_else(|| config.language.clone());
            let collections = service.list_collections(wkt.as_deref(), Crs(crs), &lang).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&collections)?);
            } else {
                let snapshot = CatalogSnapshot::build(1, collections);
                print_group("Features", snapshot.features());
                print_group("Coverages", snapshot.coverages());
            }
        }
        Command::Extract {
            wkt,
            email,
            collections,
            crs,
            out_crs,
            no_wait,
        } => {
            let tracker = Arc::new(JobTracker::new(service, config.job_poll_interval()));
            let inputs = ExtractionInputs {
                geom: wkt,
                geom_crs: Crs(crs),
                collections,
                email,
                out_crs: out_crs.map(Crs),
            };
            let handle = tracker.submit(inputs).await;
            if handle.state() == JobState::Dismissed {
                let record = handle.record();
                bail!("extraction refused: {}", record.failure.unwrap_or_default());
            }
            println!("{}", handle.job_id());
            if !no_wait {
                follow(&tracker, handle).await?;
            }
        }
        Command::Job { job_id } => {
            let tracker = JobTracker::new(service, config.job_poll_interval());
            let handle = tracker.adopt(JobId::new(job_id));
            follow(&tracker, handle).await?;
        }
    }

    Ok(())
}

async fn follow(tracker: &JobTracker, handle: JobHandle) -> Result<()> {
    let record = tracker
        .poll_until_terminal(handle.job_id())
        .await
        .context("job is not tracked")?;
    report(&record)
}

fn report(record: &JobRecord) -> Result<()> {
    match (record.state, &record.result_url) {
        (JobState::Succeeded, Some(url)) => {
            println!("{url}");
            Ok(())
        }
        (state, _) => bail!(
            "job {} {}: {}",
            record.job_id,
            state,
            record.failure.as_deref().unwrap_or("no reason given")
        ),
    }
}

fn print_group(label: &str, themes: &[ThemeCollections]) {
    if themes.is_empty() {
        return;
    }
    println!("{label}");
    for theme in themes {
        println!("  {}", theme.theme.title);
        for parent in &theme.parents {
            println!("    {}", parent.parent.title);
            for c in &parent.collections {
                println!("      {:<40} {} (max {} km²)", c.id.as_str(), c.title, c.max_extract_area);
            }
        }
    }
}
