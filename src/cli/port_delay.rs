// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Arguments for the port-delay subcommand.

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::common::{
    load_record_if_present, parse_sfp, HardwareArgs, WrCalArgsError, ARG_FILE_HELP,
    DEFAULT_NUM_SAMPLES, DEFAULT_PORT, DEFAULT_RECORD_FILE, DEFAULT_TIME_BETWEEN_SAMPLES,
    NUM_SAMPLES_HELP, PORT_HELP, RECORD_HELP, SFP_HELP, TIME_BETWEEN_SAMPLES_HELP,
};
use super::WrCalError;
use crate::{calibrate::PortDelayParams, device::DriverRegistry};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct PortDelayArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    args_file: Option<PathBuf>,

    /// The smallest PPS skew worth correcting \[ps\]; refinement stops
    /// below it. What is achievable depends on the measuring instrument.
    #[clap(short, long, help_heading = "CALIBRATION")]
    error: Option<f64>,

    #[clap(short, long, help = NUM_SAMPLES_HELP.as_str(), help_heading = "SAMPLING")]
    num_samples: Option<u32>,

    #[clap(short, long, help = TIME_BETWEEN_SAMPLES_HELP.as_str(), help_heading = "SAMPLING")]
    time_between_samples: Option<u64>,

    #[clap(short, long, help = PORT_HELP.as_str(), help_heading = "CALIBRATION")]
    port: Option<u8>,

    #[clap(short, long, help = SFP_HELP.as_str(), help_heading = "CALIBRATION")]
    sfp: Option<String>,

    #[clap(short, long, help = RECORD_HELP.as_str(), help_heading = "OUTPUT FILES")]
    record: Option<PathBuf>,

    // Nested last so the TOML serializer writes all values before the
    // [hardware] table.
    #[clap(flatten)]
    #[serde(rename = "hardware")]
    #[serde(default)]
    hardware: HardwareArgs,
}

impl PortDelayArgs {
    /// Consolidate the command-line arguments with any argument file,
    /// preferring the CLI where both specify a value.
    pub(super) fn merge(self) -> Result<PortDelayArgs, WrCalError> {
        debug!("Merging command-line arguments with the argument file");
        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let PortDelayArgs {
                args_file: _,
                hardware,
                error,
                num_samples,
                time_between_samples,
                port,
                sfp,
                record,
            } = unpack_arg_file!(arg_file);

            Ok(PortDelayArgs {
                args_file: None,
                hardware: cli_args.hardware.merge(hardware),
                error: cli_args.error.or(error),
                num_samples: cli_args.num_samples.or(num_samples),
                time_between_samples: cli_args.time_between_samples.or(time_between_samples),
                port: cli_args.port.or(port),
                sfp: cli_args.sfp.or(sfp),
                record: cli_args.record.or(record),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), WrCalError> {
        let PortDelayArgs {
            args_file: _,
            hardware,
            error,
            num_samples,
            time_between_samples,
            port,
            sfp,
            record,
        } = self;

        let sfp = parse_sfp(sfp.as_deref())?;
        let error = error.ok_or(WrCalArgsError::NoErrorThreshold)?;
        let params = PortDelayParams {
            error,
            n_samples: num_samples.unwrap_or(DEFAULT_NUM_SAMPLES),
            t_samples: time_between_samples.unwrap_or(DEFAULT_TIME_BETWEEN_SAMPLES),
            port: port.unwrap_or(DEFAULT_PORT),
            sfp,
        };
        let record_file = record.unwrap_or_else(|| PathBuf::from(DEFAULT_RECORD_FILE));

        info!(
            "Calibrating port {} with a {} SFP down to {} ps",
            params.port, params.sfp, params.error
        );
        info!(
            "Sampling {} readings, {} s apart",
            params.n_samples, params.t_samples
        );
        info!("Updating calibration record '{}'", record_file.display());
        if dry_run {
            info!("Dry run; no hardware will be touched");
            return Ok(());
        }

        let registry = DriverRegistry::builtin();
        let mut session = hardware.into_session(&registry)?;
        load_record_if_present(&mut session, &record_file)?;

        session.calibrate_device_port(&params)?;
        session.write_record(&record_file)?;
        info!("Calibration record stored in '{}'", record_file.display());

        session.remove_devices()?;
        Ok(())
    }
}
