//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

use crate::config::{AnalysisConfig, FailurePolicy};
use crate::models::HousingStatus;

/// A `--sheet housing=path` override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetOverride {
    pub housing_status: HousingStatus,
    pub path: PathBuf,
}

fn parse_sheet_override(arg: &str) -> Result<SheetOverride, String> {
    let (housing, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected <housing>=<path>, got '{arg}'"))?;
    if path.trim().is_empty() {
        return Err(format!("missing path in '{arg}'"));
    }
    Ok(SheetOverride {
        housing_status: housing.parse()?,
        path: PathBuf::from(path.trim()),
    })
}

#[derive(Parser, Debug)]
#[command(name = "surgical-outcomes")]
#[command(version)]
#[command(about = "Surgical admission outcomes by housing status", long_about = None)]
pub struct Cli {
    /// JSON configuration file; defaults are used when omitted
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Replace the sheet of a housing group, e.g. --sheet homeless=data/h.csv
    #[arg(long = "sheet", value_name = "HOUSING=PATH", value_parser = parse_sheet_override)]
    pub sheets: Vec<SheetOverride>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Significance threshold for every model
    #[arg(long, value_name = "P")]
    pub threshold: Option<f64>,

    /// Stop at the first outcome whose model cannot be fitted
    #[arg(long)]
    pub abort_on_model_error: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Apply the command-line overrides to a loaded configuration
    pub fn apply(&self, config: &mut AnalysisConfig) {
        for sheet in &self.sheets {
            config.override_sheet(sheet.housing_status, sheet.path.clone());
        }
        if let Some(output) = &self.output {
            config.output_dir.clone_from(output);
        }
        if let Some(threshold) = self.threshold {
            config.set_threshold(threshold);
        }
        if self.abort_on_model_error {
            config.on_model_error = FailurePolicy::Abort;
        }
    }
}
