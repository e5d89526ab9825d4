//! CreativeGate CLI - Bridge interface for the HTTP layer
//!
//! Commands: rules, formats, validate, scan, plan
//! Outputs JSON to stdout
//! Returns non-zero on validation failure

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::ExitCode;

use creativegate_core::{
    brief::CreativeBrief,
    detector::{ContentDetector, HeuristicDetector},
    formats::FormatRegistry,
    layout::ArtSource,
    pipeline::GenerationPipeline,
    rules::ComplianceRuleSet,
    ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "creativegate-cli")]
#[command(about = "CreativeGate CLI - Compliance Gate and Layout Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to rule set directory
    #[arg(long, default_value = "rules")]
    rules_dir: PathBuf,

    /// Path to format profile directory
    #[arg(long, default_value = "formats")]
    formats_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the active rule set
    Rules,

    /// List output format profiles
    Formats,

    /// Validate a brief against the compliance gate
    Validate {
        /// JSON payload (CreativeBrief)
        #[arg(short, long)]
        payload: String,

        /// Target format ids; defaults to every known format
        #[arg(short, long)]
        formats: Vec<String>,
    },

    /// Scan a raster image for people or alcohol containers
    Scan {
        /// Path to the image file
        #[arg(short, long)]
        image: PathBuf,
    },

    /// Solve render plans for a brief
    Plan {
        /// JSON payload (PlanRequest)
        #[arg(short, long)]
        payload: String,
    },
}

/// Plan requests carry art geometry, not pixels; the rasterizer on the
/// other side of the bridge owns the image data.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanRequest {
    brief: CreativeBrief,
    product: ArtSource,
    logo: ArtSource,
    #[serde(default)]
    formats: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let rules = match ComplianceRuleSet::load_from_dir(&cli.rules_dir, ENGINE_VERSION) {
        Ok(r) => r,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to load rule sets: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };

    let formats = match FormatRegistry::load_from_dir(&cli.formats_dir) {
        Ok(f) => f,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to load formats: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };

    let pipeline = match GenerationPipeline::new(rules, formats) {
        Ok(p) => p,
        Err(e) => {
            eprintln!(r#"{{"error": "{}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Rules => {
            println!(
                "{}",
                serde_json::to_string_pretty(pipeline.rules()).unwrap()
            );
            ExitCode::SUCCESS
        }

        Commands::Formats => {
            println!(
                "{}",
                serde_json::to_string_pretty(&pipeline.list_formats()).unwrap()
            );
            ExitCode::SUCCESS
        }

        Commands::Validate { payload, formats } => {
            let brief: CreativeBrief = match serde_json::from_str(&payload) {
                Ok(b) => b,
                Err(e) => {
                    println!(r#"{{"valid": false, "error": "Invalid payload: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            match pipeline.validate_brief(&brief, &[], &formats) {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report).unwrap());
                    if report.valid {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2) // Validation failure
                    }
                }
                Err(e) => {
                    println!(r#"{{"valid": false, "error": "{}"}}"#, e);
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Scan { image } => {
            let decoded = match image::open(&image) {
                Ok(i) => i.to_rgba8(),
                Err(e) => {
                    println!(r#"{{"error": "Failed to decode image: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            let finding = HeuristicDetector::default().detect(&decoded);
            let output = serde_json::json!({ "finding": finding });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
            ExitCode::SUCCESS
        }

        Commands::Plan { payload } => {
            let request: PlanRequest = match serde_json::from_str(&payload) {
                Ok(r) => r,
                Err(e) => {
                    println!(r#"{{"success": false, "error": "Invalid payload: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            match pipeline.plan(
                &request.brief,
                request.product,
                request.logo,
                &request.formats,
            ) {
                Ok(response) => {
                    println!("{}", serde_json::to_string_pretty(&response).unwrap());
                    if response.report.valid {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2) // Gate failure
                    }
                }
                Err(e) => {
                    let output = serde_json::json!({
                        "success": false,
                        "error": e.to_string(),
                    });
                    println!("{}", serde_json::to_string(&output).unwrap());
                    ExitCode::FAILURE
                }
            }
        }
    }
}
