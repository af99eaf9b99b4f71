// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The calibration session and its three operations: fiber latency, fiber
//! asymmetry and per-port delay calibration.
//!
//! Everything here is strictly single-threaded and blocking. The two kinds
//! of suspension are the track-phase poll (fixed interval, no timeout) and
//! the operator gates, where the procedure waits for a human to reconnect
//! fibers or instrument probes and acknowledge.

mod error;
pub(crate) mod fiber_asymmetry;
pub(crate) mod fiber_latency;
pub(crate) mod port_delay;

pub use error::CalibrateError;
pub use fiber_asymmetry::FiberAsymmetryParams;
pub use fiber_latency::FiberLatencyParams;
pub use port_delay::PortDelayParams;

use std::{path::Path, thread, time::Duration};

use console::Term;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use is_terminal::IsTerminal;
use log::debug;

use crate::{
    device::{
        DeviceParams, DriverError, DriverRegistry, Instrument, InstrumentParams, SfpColor,
        SfpConfig, WrDevice,
    },
    record::{CalibrationRecord, FiberLatency, PortDelay, RecordReadError, RecordWriteError},
    PROGRESS_BARS,
};

/// Default spacing of the track-phase poll.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The fiber configurations a latency measurement steps through, in order.
pub(crate) const FIBERS: [&str; 3] = ["f1", "f2", "f1+f2"];

/// The operator gate: displays an instruction and blocks until the
/// physical step it describes has been acknowledged.
pub trait Operator {
    fn acknowledge(&mut self, instruction: &str) -> Result<(), std::io::Error>;
}

/// Prompts on the terminal and waits for a line. When stdout isn't a TTY
/// the prompt still goes out and a line is read from stdin, so the
/// procedure can be driven by a pipe.
pub struct ConsoleOperator {
    term: Option<Term>,
}

impl ConsoleOperator {
    pub fn new() -> ConsoleOperator {
        ConsoleOperator {
            term: is_a_tty().then(Term::stdout),
        }
    }
}

impl Default for ConsoleOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for ConsoleOperator {
    fn acknowledge(&mut self, instruction: &str) -> Result<(), std::io::Error> {
        match self.term.as_ref() {
            Some(term) => {
                term.write_line(instruction)?;
                term.read_line()?;
            }
            None => {
                println!("{instruction}");
                let mut ack = String::new();
                std::io::stdin().read_line(&mut ack)?;
            }
        }
        Ok(())
    }
}

fn is_a_tty() -> bool {
    std::io::stdout().is_terminal() || std::io::stderr().is_terminal()
}

/// One interactive calibration session: the attached hardware handles, the
/// operator gate and the record the operations fill in. All state is
/// per-instance; nothing is shared between sessions.
pub struct CalibrationSession {
    devices: Vec<Box<dyn WrDevice>>,
    instr: Option<Box<dyn Instrument>>,
    operator: Box<dyn Operator>,
    record: CalibrationRecord,
    poll_interval: Duration,
    show_dbg: bool,
}

impl CalibrationSession {
    pub fn new(operator: Box<dyn Operator>) -> CalibrationSession {
        CalibrationSession {
            devices: vec![],
            instr: None,
            operator,
            record: CalibrationRecord::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            show_dbg: false,
        }
    }

    /// Attach an already-constructed WR device handle. The first attached
    /// device is the master (or the unit under calibration), the second
    /// the slave.
    pub fn add_device(&mut self, mut device: Box<dyn WrDevice>) {
        device.set_debug(self.show_dbg);
        self.devices.push(device);
    }

    /// Resolve a device driver by name and attach the result.
    pub fn add_device_by_name(
        &mut self,
        registry: &DriverRegistry,
        name: &str,
        params: &DeviceParams,
    ) -> Result<(), DriverError> {
        let device = registry.build_device(name, params)?;
        debug!("Attached WR device driver '{name}' on {}", params.interface);
        self.add_device(device);
        Ok(())
    }

    pub fn set_instrument(&mut self, mut instr: Box<dyn Instrument>) {
        instr.set_debug(self.show_dbg);
        self.instr = Some(instr);
    }

    /// Resolve an instrument driver by name and attach the result.
    pub fn set_instrument_by_name(
        &mut self,
        registry: &DriverRegistry,
        name: &str,
        params: &InstrumentParams,
    ) -> Result<(), DriverError> {
        let instr = registry.build_instrument(name, params)?;
        debug!("Attached instrument driver '{name}' on {}", params.port);
        self.set_instrument(instr);
        Ok(())
    }

    /// Close and drop every attached device.
    pub fn remove_devices(&mut self) -> Result<(), DriverError> {
        debug!("Removing {} devices", self.devices.len());
        for device in self.devices.iter_mut() {
            device.close()?;
        }
        self.devices.clear();
        Ok(())
    }

    /// Enable diagnostic output on the session and every attached handle.
    pub fn enable_dbg(&mut self) {
        self.set_dbg(true);
    }

    /// Disable diagnostic output on the session and every attached handle.
    pub fn disable_dbg(&mut self) {
        self.set_dbg(false);
    }

    fn set_dbg(&mut self, enabled: bool) {
        self.show_dbg = enabled;
        for device in self.devices.iter_mut() {
            device.set_debug(enabled);
        }
        if let Some(instr) = self.instr.as_mut() {
            instr.set_debug(enabled);
        }
    }

    /// How often the slave's servo state is polled while waiting for
    /// TRACK_PHASE. There is deliberately no timeout on that wait: a
    /// device that never locks blocks the procedure.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn record(&self) -> &CalibrationRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut CalibrationRecord {
        &mut self.record
    }

    /// Load a stored record. The in-memory record is replaced in full.
    pub fn load_record<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RecordReadError> {
        self.record = CalibrationRecord::read_from_file(path)?;
        Ok(())
    }

    /// Write the session's record to `path`, overwriting any existing file.
    pub fn write_record<P: AsRef<Path>>(&self, path: P) -> Result<(), RecordWriteError> {
        self.record.write_to_file(path)
    }

    /// Measure the latency of the reference fibers (delta1, delta2).
    pub fn fiber_latency(
        &mut self,
        params: &FiberLatencyParams,
    ) -> Result<FiberLatency, CalibrateError> {
        fiber_latency::measure(self, params)
    }

    /// Measure the asymmetry coefficient of the reference fiber for one
    /// (SFP colour, port) combination.
    pub fn fiber_asymmetry(
        &mut self,
        params: &FiberAsymmetryParams,
    ) -> Result<f64, CalibrateError> {
        fiber_asymmetry::measure(self, params)
    }

    /// Calibrate one port of a device against the WR calibrator.
    pub fn calibrate_device_port(
        &mut self,
        params: &PortDelayParams,
    ) -> Result<PortDelay, CalibrateError> {
        port_delay::calibrate(self, params)
    }
}

/// Block until `slave` reports TRACK_PHASE, polling at `poll_interval`.
/// Unbounded by design.
pub(crate) fn wait_for_track_phase(
    slave: &mut dyn WrDevice,
    poll_interval: Duration,
) -> Result<(), DriverError> {
    debug!("Waiting until TRACK_PHASE...");
    while !slave.in_track_phase()? {
        thread::sleep(poll_interval);
    }
    Ok(())
}

/// Average `n_samples` round-trip-time readings spaced `t_samples` seconds
/// apart \[ps\].
pub(crate) fn sample_mean_rtt(
    slave: &mut dyn WrDevice,
    n_samples: u32,
    t_samples: u64,
) -> Result<f64, DriverError> {
    debug!(
        "Measuring round-trip time (will take ~{} s)",
        u64::from(n_samples) * t_samples
    );
    let progress = make_sampling_progress_bar(n_samples, "Sampling round-trip time".to_string());
    let mut mean_rtt = 0.0;
    for _ in 0..n_samples {
        mean_rtt += slave.get_rtt()?;
        progress.inc(1);
        thread::sleep(Duration::from_secs(t_samples));
    }
    progress.finish_and_clear();
    Ok(mean_rtt / f64::from(n_samples))
}

/// Zero both devices' delay and asymmetry state and assign the link roles.
/// `slave_sfp` is the module colour in the slave's port; the master gets
/// the other colour.
pub(crate) fn reset_link(
    master: &mut dyn WrDevice,
    slave: &mut dyn WrDevice,
    slave_sfp: SfpColor,
    port: u8,
) -> Result<(), DriverError> {
    debug!("Erasing SFP databases...");
    master.erase_sfp_config()?;
    slave.erase_sfp_config()?;

    debug!("Writing initial configuration to SFP databases...");
    slave.write_sfp_config(SfpConfig::zeroed(slave_sfp, port))?;
    master.write_sfp_config(SfpConfig::zeroed(slave_sfp.other(), port))?;
    master.load_sfp_config()?;
    slave.load_sfp_config()?;
    slave.set_slaveport(port)?;
    master.set_master()?;
    Ok(())
}

/// Convenience function to make a progress bar while sampling.
fn make_sampling_progress_bar(num_samples: u32, message: String) -> ProgressBar {
    ProgressBar::with_draw_target(
        Some(u64::from(num_samples)),
        if PROGRESS_BARS.load() {
            // Use stdout, not stderr, because the messages printed by the
            // progress bar are valuable.
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg}: [{wide_bar:.blue}] {pos:3}/{len:3} ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message(message)
}
