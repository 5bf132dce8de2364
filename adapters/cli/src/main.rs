#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs the MetroMesh fleet simulation.

mod settings;
mod simulation;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use metromesh_core::UnitId;
use metromesh_system_campaign::{max_zones_for, CampaignEstimate, CampaignRequest};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    settings::Settings,
    simulation::{Report, Simulation},
};

/// Command-line arguments accepted by the `metromesh` binary.
#[derive(Debug, Parser)]
#[command(name = "metromesh", version, about = "Advertising fleet simulation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Boots the world, optionally starts a campaign, and runs simulated time.
    Simulate(SimulateArgs),
    /// Lists the zones available to campaigns.
    Zones {
        /// Settings file overriding the reference deployment.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Prints the reach and price estimate of a campaign.
    Estimate {
        /// Units booked.
        #[arg(long)]
        units: u32,
        /// Campaign length in weeks.
        #[arg(long)]
        weeks: u32,
    },
}

#[derive(Debug, Args)]
struct SimulateArgs {
    /// Settings file overriding the reference deployment.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed overriding the one from the settings file.
    #[arg(long)]
    seed: Option<u64>,
    /// Simulated seconds to run.
    #[arg(long, default_value_t = 60)]
    duration: u64,
    /// Units to deploy in a campaign; requires at least one `--zone`.
    #[arg(long, requires = "zones")]
    campaign_units: Option<u32>,
    /// Zone served by the campaign; repeat for several zones.
    #[arg(long = "zone", id = "zones", requires = "campaign_units")]
    zones: Vec<String>,
    /// Campaign length in weeks.
    #[arg(long, default_value_t = 4)]
    campaign_weeks: u32,
    /// Advertised discount in percent.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    promotion: u8,
    /// Simulated seconds after which the campaign ends and the global fleet returns.
    #[arg(long, requires = "campaign_units")]
    campaign_for: Option<u64>,
    /// Unit whose live log is recorded.
    #[arg(long)]
    track: Option<String>,
    /// Output layout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Summary,
    Json,
}

/// Entry point for the MetroMesh command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate(args) => simulate(args),
        Commands::Zones { config } => zones(config),
        Commands::Estimate { units, weeks } => {
            print_estimate(units, weeks, &CampaignEstimate::new(units, weeks));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn simulate(args: SimulateArgs) -> Result<()> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }
    let geofences = settings.geofences()?;
    let epoch = settings.epoch.unwrap_or_else(Utc::now);

    let mut simulation = Simulation::new(&settings, geofences, epoch);
    simulation.boot();
    info!(seed = settings.seed, units = settings.fleet_size, "simulation booted");

    if let Some(unit_count) = args.campaign_units {
        simulation
            .start_campaign(CampaignRequest {
                unit_count,
                zones: args.zones,
                duration_weeks: args.campaign_weeks,
                promotion_percent: args.promotion,
            })
            .context("campaign request refused")?;
    }

    if let Some(id) = args.track {
        simulation.track(UnitId::new(id))?;
    }

    let duration = Duration::from_secs(args.duration);
    match args.campaign_for {
        Some(seconds) if simulation.campaign_active() => {
            let campaign = Duration::from_secs(seconds).min(duration);
            simulation.advance(campaign);
            simulation.stop_campaign();
            simulation.advance(duration - campaign);
        }
        _ => simulation.advance(duration),
    }

    let report = simulation.report();
    match args.format {
        OutputFormat::Summary => print_summary(&report),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        ),
    }
    Ok(())
}

fn zones(config: Option<PathBuf>) -> Result<()> {
    let geofences = Settings::load(config.as_deref())?.geofences()?;
    for zone in geofences.zones.zones() {
        println!(
            "{:<20} anchor ({:.4}, {:.4})  {} vertices",
            zone.name,
            zone.anchor.latitude(),
            zone.anchor.longitude(),
            zone.polygon.vertices().len()
        );
    }
    Ok(())
}

fn print_estimate(units: u32, weeks: u32, estimate: &CampaignEstimate) {
    println!("{units} units over {weeks} week(s)");
    println!("  impressions: {}", estimate.impressions);
    println!("  cost:        ${}", estimate.cost);
    println!("  CPM:         ${:.2}", estimate.cpm);
    println!("  zones:       up to {}", max_zones_for(units));
}

fn print_summary(report: &Report) {
    println!(
        "fleet at {} after {} tick(s), revision {}, {:?} mode",
        report.clock.to_rfc3339(),
        report.ticks,
        report.revision.get(),
        report.mode
    );
    println!(
        "  units: {} ({} outdoor, {} indoor)",
        report.units.len(),
        report.outdoor,
        report.indoor
    );
    if let Some(campaign) = &report.campaign {
        println!(
            "  campaign: {} units across {}, {} week(s), {}% promotion",
            campaign.request.unit_count,
            campaign.request.zones.join(", "),
            campaign.request.duration_weeks,
            campaign.request.promotion_percent
        );
        print_estimate(
            campaign.request.unit_count,
            campaign.request.duration_weeks,
            &campaign.estimate,
        );
    }
    if let Some(tracked) = &report.tracked {
        println!("  tracking {} ({} entries)", tracked.unit, tracked.log.len());
        for entry in &tracked.log {
            println!(
                "    {}  ({:.5}, {:.5})  {} km/h  {} m",
                entry.timestamp.format("%H:%M:%S"),
                entry.position.latitude(),
                entry.position.longitude(),
                entry.speed_kmh,
                entry.distance_meters
            );
        }
    }
}
