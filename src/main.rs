use clap::{Parser, Subcommand};
use provpop::config::AppConfig;
use provpop::matching::MatchOutcome;
use provpop::types::{PopulationRecord, Province};
use provpop::{consolidate, data, export, impute, lookup, matching, population};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full reconciliation and write the population table
    Build {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Run matching only and report diagnostics, writing nothing
    Check {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Build { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let (land, _records, outcome) = run_pipeline(&app_config)?;

            let finals = impute::impute(&land, &outcome);
            export::write_population_csv(
                &app_config.output.dir.join("Population.csv"),
                &land,
                &finals,
            )?;
            if app_config.output.debug_csv {
                export::write_debug_csv(
                    &app_config.output.dir.join("Population_debug.csv"),
                    &land,
                    &outcome,
                )?;
            }
            report_unmatched(&outcome);
        }
        Commands::Check { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let (land, records, outcome) = run_pipeline(&app_config)?;

            info!(
                "{} provinces, {} deduplicated records, {} matched, {} unmatched",
                land.len(),
                records.len(),
                outcome.assignments.len(),
                outcome.unmatched.len()
            );
            report_unmatched(&outcome);
        }
    }

    Ok(())
}

fn run_pipeline(
    config: &AppConfig,
) -> anyhow::Result<(Vec<Province>, Vec<PopulationRecord>, MatchOutcome)> {
    let raw = data::load_provinces(config)?;
    let land = consolidate::consolidate(raw, consolidate::MIN_AREA_ABS);
    let records = population::load_population(&config.input.population_dir)?;
    let index = lookup::build_lookup(&land);
    let outcome = matching::match_records(&records, &index);
    Ok((land, records, outcome))
}

fn report_unmatched(outcome: &MatchOutcome) {
    if outcome.unmatched.is_empty() {
        return;
    }
    warn!(
        "Unmatched population records: {} (showing first 10)",
        outcome.unmatched.len()
    );
    for (region, country) in outcome.unmatched.iter().take(10) {
        warn!(" - {} ({})", region, country);
    }
}
