// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Common arguments for the calibration subcommands. Every subcommand
//! attaches hardware the same way and shares the sampling defaults, so
//! those live here.

use std::path::Path;

use clap::Parser;
use log::{debug, info, log_enabled, Level::Debug};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::WrCalError;
use crate::{
    calibrate::{CalibrationSession, ConsoleOperator},
    device::{DeviceParams, DriverRegistry, InstrumentParams, SfpColor, SFP_COLOURS},
};

pub(super) const DEFAULT_NUM_SAMPLES: u32 = 10;
pub(super) const DEFAULT_TIME_BETWEEN_SAMPLES: u64 = 5;
pub(super) const DEFAULT_RECORD_FILE: &str = "wr_calibration.conf";
pub(super) const DEFAULT_PORT: u8 = 1;
pub(super) const DEFAULT_SFP: &str = "blue";

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_HELP: String =
        "All arguments may be specified in a TOML file. Any CLI arguments override arguments set in the file.".to_string();

    pub(super) static ref NUM_SAMPLES_HELP: String =
        format!("The number of readings averaged into one mean. Default: {DEFAULT_NUM_SAMPLES}");

    pub(super) static ref TIME_BETWEEN_SAMPLES_HELP: String =
        format!("Seconds between successive readings. Default: {DEFAULT_TIME_BETWEEN_SAMPLES}");

    pub(super) static ref RECORD_HELP: String =
        format!("The calibration record file to update. Default: {DEFAULT_RECORD_FILE}");

    pub(super) static ref PORT_HELP: String =
        format!("The port the devices are linked through. Default: {DEFAULT_PORT}");

    pub(super) static ref SFP_HELP: String =
        format!("The SFP module type in the slave's port. Valid types: {}. Default: {DEFAULT_SFP}", *SFP_COLOURS);
}

#[derive(Error, Debug)]
pub(super) enum WrCalArgsError {
    #[error("'{0}' is not a valid device spec; expected NAME,INTERFACE[,PORT]")]
    BadDeviceSpec(String),

    #[error("'{0}' is not a valid instrument spec; expected NAME,PORT,MASTER_CHAN,SLAVE_CHAN")]
    BadInstrumentSpec(String),

    #[error("'{0}' is not a recognised SFP module type. Valid types: {}", *SFP_COLOURS)]
    BadSfp(String),

    #[error("A convergence threshold (--error) is needed to calibrate a port")]
    NoErrorThreshold,
}

macro_rules! unpack_arg_file {
    ($arg_file:expr) => {{
        use std::{fs::File, io::Read};

        use crate::cli::WrCalError;

        debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        match $arg_file.extension().and_then(|e| e.to_str()) {
            Some("toml") => {
                debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match toml::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(WrCalError::ArgFile(format!(
                            "Couldn't decode toml structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }

            _ => {
                return Err(WrCalError::ArgFile(format!(
                    "Argument file '{}' doesn't have a supported extension! Supported: toml",
                    $arg_file.display()
                )))
            }
        }
    }};
}

/// The hardware a session talks to. A device is specified as
/// `NAME,INTERFACE[,PORT]`, an instrument as
/// `NAME,PORT,MASTER_CHAN,SLAVE_CHAN`; the names resolve through the
/// driver registry.
#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct HardwareArgs {
    /// The WR device drivers to attach, master first where two are needed.
    /// Format: NAME,INTERFACE[,PORT].
    #[clap(short, long, multiple_values(true), help_heading = "HARDWARE")]
    devices: Option<Vec<String>>,

    /// The measurement-instrument driver to attach. Format:
    /// NAME,PORT,MASTER_CHAN,SLAVE_CHAN.
    #[clap(short, long, help_heading = "HARDWARE")]
    instrument: Option<String>,
}

impl HardwareArgs {
    pub(super) fn merge(self, other: Self) -> Self {
        HardwareArgs {
            devices: self.devices.or(other.devices),
            instrument: self.instrument.or(other.instrument),
        }
    }

    /// Build a session from the registered drivers: attach every requested
    /// device in order, then the instrument. Missing hardware isn't an
    /// error here; the operations check their own preconditions.
    pub(super) fn into_session(
        self,
        registry: &DriverRegistry,
    ) -> Result<CalibrationSession, WrCalError> {
        let mut session = CalibrationSession::new(Box::new(ConsoleOperator::new()));
        if log_enabled!(Debug) {
            session.enable_dbg();
        }

        for spec in self.devices.unwrap_or_default() {
            let (name, params) = parse_device_spec(&spec)?;
            session.add_device_by_name(registry, &name, &params)?;
        }
        if let Some(spec) = self.instrument {
            let (name, params) = parse_instrument_spec(&spec)?;
            session.set_instrument_by_name(registry, &name, &params)?;
        }
        Ok(session)
    }
}

fn parse_device_spec(spec: &str) -> Result<(String, DeviceParams), WrCalArgsError> {
    let bad = || WrCalArgsError::BadDeviceSpec(spec.to_string());
    let mut parts = spec.split(',');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(interface), port, None) if !name.is_empty() => {
            let port = match port {
                Some(p) => p.trim().parse().map_err(|_| bad())?,
                None => 0,
            };
            Ok((
                name.trim().to_string(),
                DeviceParams {
                    interface: interface.trim().to_string(),
                    port,
                },
            ))
        }
        _ => Err(bad()),
    }
}

fn parse_instrument_spec(spec: &str) -> Result<(String, InstrumentParams), WrCalArgsError> {
    let bad = || WrCalArgsError::BadInstrumentSpec(spec.to_string());
    let mut parts = spec.split(',');
    match (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) {
        (Some(name), Some(port), Some(master_chan), Some(slave_chan), None)
            if !name.is_empty() =>
        {
            Ok((
                name.trim().to_string(),
                InstrumentParams {
                    port: port.trim().to_string(),
                    master_chan: master_chan.trim().parse().map_err(|_| bad())?,
                    slave_chan: slave_chan.trim().parse().map_err(|_| bad())?,
                },
            ))
        }
        _ => Err(bad()),
    }
}

/// Parse the `--sfp` argument, defaulting to blue.
pub(super) fn parse_sfp(sfp: Option<&str>) -> Result<SfpColor, WrCalArgsError> {
    match sfp {
        Some(s) => s.parse().map_err(|_| WrCalArgsError::BadSfp(s.to_string())),
        None => Ok(SfpColor::Blue),
    }
}

/// Load `path` into the session if it exists. Operations append to what
/// the record already holds, and the whole record is rewritten afterwards.
pub(super) fn load_record_if_present(
    session: &mut CalibrationSession,
    path: &Path,
) -> Result<(), WrCalError> {
    if path.exists() {
        session.load_record(path)?;
        info!("Loaded calibration record from '{}'", path.display());
    } else {
        debug!(
            "No calibration record at '{}'; starting from an empty one",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_specs_parse() {
        let (name, params) = parse_device_spec("wr-len,/dev/ttyUSB0,2").unwrap();
        assert_eq!(name, "wr-len");
        assert_eq!(params.interface, "/dev/ttyUSB0");
        assert_eq!(params.port, 2);

        // The port is optional.
        let (_, params) = parse_device_spec("wr-len,/dev/ttyUSB1").unwrap();
        assert_eq!(params.port, 0);

        assert!(parse_device_spec("wr-len").is_err());
        assert!(parse_device_spec("wr-len,/dev/ttyUSB0,x").is_err());
        assert!(parse_device_spec("wr-len,/dev/ttyUSB0,1,extra").is_err());
    }

    #[test]
    fn instrument_specs_parse() {
        let (name, params) = parse_instrument_spec("fca3103,/dev/usbtmc0,1,2").unwrap();
        assert_eq!(name, "fca3103");
        assert_eq!(params.port, "/dev/usbtmc0");
        assert_eq!(params.master_chan, 1);
        assert_eq!(params.slave_chan, 2);

        assert!(parse_instrument_spec("fca3103,/dev/usbtmc0,1").is_err());
        assert!(parse_instrument_spec("fca3103,/dev/usbtmc0,a,b").is_err());
    }

    #[test]
    fn sfp_arguments_parse() {
        assert_eq!(parse_sfp(None).unwrap(), SfpColor::Blue);
        assert_eq!(parse_sfp(Some("violet")).unwrap(), SfpColor::Violet);
        assert!(matches!(
            parse_sfp(Some("green")),
            Err(WrCalArgsError::BadSfp(_))
        ));
    }
}
