//! Cargo subcommand: `cargo footprint`
//!
//! Usage:
//!   cargo footprint estimate model.tflite
//!   cargo footprint estimate model.tflite --per-layer -o estimations.txt

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use footprint::parse::TfliteModel;
use footprint::{estimate_model, EstimateOptions, Error};

#[derive(Parser)]
#[command(
    name = "cargo footprint",
    bin_name = "cargo footprint",
    about = "Estimate MACs, ROM and RAM of a fully quantized TFLite model",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Print ROM, best/worst case RAM and MACs of a model
    Estimate {
        /// Path to the .tflite model
        model: PathBuf,
        /// Also write the estimations to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Render as JSON instead of KEY=value lines
        #[arg(long)]
        json: bool,
        /// Include a per-layer breakdown of MACs and live activation bytes
        #[arg(long)]
        per_layer: bool,
        /// Run the estimators one after another on the calling thread
        #[arg(long)]
        sequential: bool,
        /// Accept graphs whose layers do not form a single chain
        #[arg(long)]
        no_topology_check: bool,
    },
}

fn main() {
    env_logger::init();

    // When invoked as `cargo footprint`, cargo passes "footprint" as argv[1]. Strip it.
    let mut args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("footprint") {
        args.remove(1);
    }
    let cli = Cli::parse_from(args);

    let result = match cli.command {
        Commands::Estimate {
            model,
            out,
            json,
            per_layer,
            sequential,
            no_topology_check,
        } => {
            let options = EstimateOptions {
                parallel: !sequential,
                check_topology: !no_topology_check,
            };
            cmd_estimate(&model, out.as_deref(), json, per_layer, &options)
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn cmd_estimate(
    model_path: &Path,
    out: Option<&Path>,
    json: bool,
    per_layer: bool,
    options: &EstimateOptions,
) -> Result<(), Error> {
    let data = fs::read(model_path).map_err(|source| Error::Io {
        path: model_path.to_path_buf(),
        source,
    })?;
    let model = TfliteModel::from_bytes(&data)?;
    let report = estimate_model(&model, options)?;

    let rendered = if json {
        let report = if per_layer { report } else { report.totals() };
        report.to_json()?
    } else {
        let mut text = report.to_string();
        if per_layer {
            text.push_str("\n\n");
            text.push_str(report.layer_table().trim_end());
        }
        text
    };

    if !json {
        println!("Estimations:");
    }
    println!("{rendered}");

    if let Some(path) = out {
        footprint::estimate::report::write_to(path, &rendered)?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}
