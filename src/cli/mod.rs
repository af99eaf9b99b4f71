// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for `wr_calibrate`
//! subcommands are contained in modules.
//!
//! All booleans must have `#[serde(default)]` annotated, and anything that
//! isn't a boolean must be optional. This allows all arguments to be
//! optional *and* usable in an arguments file.
//!
//! Only 3 things should be public in this module: `WrCalibrate`,
//! `WrCalibrate::run`, and `WrCalError`.

#[macro_use]
mod common;
mod error;
mod fiber_asymmetry;
mod fiber_latency;
mod port_delay;
mod record;

pub use error::WrCalError;

use std::path::PathBuf;

use clap::{AppSettings, Args, Parser, Subcommand};
use log::info;

use crate::PROGRESS_BARS;

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = r#"Calibration software for White Rabbit (WR) time-transfer devices.
Measures reference-fiber latency and asymmetry, and calibrates per-port
transmit/receive delays against a WR calibrator."#
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct WrCalibrate {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Only verify that arguments were correctly ingested and print out
    /// high-level information.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,

    /// Save the input arguments into a new TOML file that can be used to
    /// reproduce this run.
    #[clap(long)]
    #[clap(global = true)]
    save_toml: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(alias = "latency")]
    #[clap(
        about = "Measure the latency of the two reference fibers (delta1, delta2) with a pair of WR devices."
    )]
    FiberLatency(fiber_latency::FiberLatencyArgs),

    #[clap(alias = "asymmetry")]
    #[clap(
        about = "Measure the reference fiber's asymmetry coefficient for one SFP type and port."
    )]
    FiberAsymmetry(fiber_asymmetry::FiberAsymmetryArgs),

    #[clap(alias = "calibrate-port")]
    #[clap(
        about = "Calibrate the transmit/receive delays of one port against the WR calibrator."
    )]
    PortDelay(port_delay::PortDelayArgs),

    #[clap(alias = "show-record")]
    #[clap(about = "Print the contents of a calibration record file.")]
    RecordShow(record::RecordShowArgs),
}

impl WrCalibrate {
    pub fn run(self) -> Result<(), WrCalError> {
        // Set up logging.
        let GlobalArgs {
            verbosity,
            dry_run,
            no_progress_bars,
            save_toml,
        } = self.global_opts;
        setup_logging(verbosity).expect("Failed to initialise logging.");
        // Enable progress bars if the user didn't say "no progress bars".
        if !no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        // Print the version of wr_calibrate and its build-time information.
        let sub_command = match &self.command {
            Command::FiberLatency(_) => "fiber-latency",
            Command::FiberAsymmetry(_) => "fiber-asymmetry",
            Command::PortDelay(_) => "port-delay",
            Command::RecordShow(_) => "record-show",
        };
        info!("wr_calibrate {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        macro_rules! merge_save_run {
            ($args:expr) => {{
                let args = $args.merge()?;
                if let Some(toml) = save_toml {
                    use std::{
                        fs::File,
                        io::{BufWriter, Write},
                    };

                    let mut f = BufWriter::new(File::create(toml)?);
                    let toml_str = toml::to_string(&args).expect("toml serialisation error");
                    f.write_all(toml_str.as_bytes())?;
                }
                args.run(dry_run)?;
            }};
        }

        match self.command {
            Command::FiberLatency(args) => {
                merge_save_run!(args)
            }

            Command::FiberAsymmetry(args) => {
                merge_save_run!(args)
            }

            Command::PortDelay(args) => {
                merge_save_run!(args)
            }

            Command::RecordShow(args) => {
                args.run()?;
            }
        }

        Ok(())
    }
}

fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.init();

    Ok(())
}

/// Write many info-level log lines of how this executable was compiled.
fn display_build_info() {
    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => {
            info!("Compiled on git commit hash: {hash}{dirty}");
        }
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {}", hr);
    }
    info!("            {}", BUILT_TIME_UTC);
    info!("         with compiler {}", RUSTC_VERSION);
    info!("");
}
