use anyhow::{Context, bail};
use clap::Parser;
use log::{error, info};
use std::time::Instant;

use surgical_outcomes::cli::Cli;
use surgical_outcomes::{AnalysisConfig, ReportRunner, load_sheets, write_report};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let start = Instant::now();

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;
    info!("{config}");

    let sheets = load_sheets(&config.sheets, &config.column_aliases)
        .await
        .context("loading sheets")?;

    let runner = ReportRunner::new(&config)?.with_progress(!cli.quiet);
    let mut failed_outcomes = 0;
    for report_config in &config.reports {
        let report = runner
            .run_report(report_config, &sheets)
            .with_context(|| format!("running report '{}'", report_config.name))?;
        let files = write_report(&report, &config.output_dir)
            .with_context(|| format!("writing report '{}'", report.name))?;
        info!("Report '{}' written to {}", report.name, files.json.display());

        for failure in report.failures() {
            error!(
                "Report '{}': outcome {} could not be modelled: {}",
                report.name, failure.outcome, failure.reason
            );
            failed_outcomes += 1;
        }
    }

    info!("Analysis finished in {:?}", start.elapsed());
    if failed_outcomes > 0 {
        bail!("{failed_outcomes} outcome model(s) failed; see the reports for details");
    }
    Ok(())
}
