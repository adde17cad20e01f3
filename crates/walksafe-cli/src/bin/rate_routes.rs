//! Rate the walking routes between two places and print them as JSON.
//!
//! Reads service settings from `WALKSAFE_*` environment variables.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walksafe_cli::{rate_trip, Config};
use walksafe_directions::{DirectionsClient, Location};
use walksafe_opendata::{FeatureCollector, OpenDataClient};

/// Score candidate walking routes by lighting, sidewalks and traffic
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Start: an address or "lat,lon"
    #[arg(long)]
    from: Location,

    /// Destination: an address or "lat,lon"
    #[arg(long)]
    to: Location,

    /// Number of query cells (must be a perfect square)
    #[arg(long)]
    cells: Option<usize>,

    /// Also print failed and truncated cells
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("walksafe_core=debug".parse()?)
                .add_directive("walksafe_opendata=debug".parse()?)
                .add_directive("walksafe_directions=debug".parse()?)
                .add_directive("walksafe_cli=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    let mut options = config.assessment();
    if let Some(cells) = args.cells {
        options.cell_count = cells;
    }

    if config.gmaps_api_key.is_empty() {
        tracing::warn!("WALKSAFE_GMAPS_API_KEY is not set; the directions provider will refuse requests");
    }

    let directions =
        DirectionsClient::new(config.directions()).context("Failed to build directions client")?;
    let opendata =
        OpenDataClient::new(config.opendata()).context("Failed to build feature API client")?;
    let collector = FeatureCollector::new(opendata, config.collector());

    let report = rate_trip(&directions, &collector, &args.from, &args.to, options)
        .await
        .context("Route assessment failed")?;

    for skipped in &report.skipped {
        tracing::warn!(polyline = %skipped.polyline, reason = %skipped.reason, "route not rated");
    }
    if report.is_partial() {
        tracing::warn!(
            failed = report.failed_boxes.len(),
            truncated = report.truncated_boxes.len(),
            "feature coverage is incomplete"
        );
    }

    let output = if args.verbose {
        serde_json::json!({
            "routes": report.assessments(),
            "failedCells": report
                .failed_boxes
                .iter()
                .map(|failure| serde_json::json!({
                    "cell": failure.box_index,
                    "category": failure.category,
                    "reason": failure.reason,
                }))
                .collect::<Vec<_>>(),
            "truncatedCells": report
                .truncated_boxes
                .iter()
                .map(|truncated| serde_json::json!({
                    "cell": truncated.box_index,
                    "category": truncated.category,
                }))
                .collect::<Vec<_>>(),
        })
    } else {
        serde_json::to_value(report.assessments())?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
