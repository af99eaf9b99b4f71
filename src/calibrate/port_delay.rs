// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-port delay calibration against the WR calibrator.
//!
//! The unit under calibration syncs as a slave against an already
//! calibrated reference over the short fiber. A coarse estimate from the
//! round-trip time seeds dtx/drx, then the residual PPS skew is folded
//! into them until it drops below the requested error or the iteration
//! cap runs out.

use log::{debug, info, warn};

use super::{CalibrateError, CalibrationSession};
use crate::{
    device::{SfpColor, SfpConfig},
    record::{PortDelay, PortKey},
};

/// Iteration cap on the refinement loop.
const MAX_REFINE_ITERATIONS: u32 = 10;

/// Parameters for calibrating one port of a WR device.
#[derive(Debug, Clone, Copy)]
pub struct PortDelayParams {
    /// Convergence threshold \[ps\]. What is achievable depends on the
    /// measuring instrument.
    pub error: f64,

    /// How many readings make up one mean.
    pub n_samples: u32,

    /// Seconds between readings.
    pub t_samples: u64,

    /// The port under calibration.
    pub port: u8,

    /// The SFP module type in that port.
    pub sfp: SfpColor,
}

pub(super) fn calibrate(
    session: &mut CalibrationSession,
    params: &PortDelayParams,
) -> Result<PortDelay, CalibrateError> {
    if session.devices.is_empty() {
        return Err(CalibrateError::WrDeviceNeeded {
            operation: "Calibrating a device port",
            needed: 1,
            got: 0,
        });
    }
    let Some(instr) = session.instr.as_mut() else {
        return Err(CalibrateError::MeasurementInstrumentNeeded);
    };
    if !session.record.fiber_latency.is_measured() {
        return Err(CalibrateError::FiberLatencyNeeded);
    }
    let key = PortKey {
        sfp: params.sfp,
        port: params.port,
    };
    let Some(&alpha_n) = session.record.fiber_asymmetry.get(&key) else {
        return Err(CalibrateError::FiberAsymmetryNeeded {
            sfp: params.sfp,
            port: params.port,
        });
    };

    let poll_interval = session.poll_interval;
    let delta1 = session.record.fiber_latency.delta1;
    let slave = session.devices[0].as_mut();

    debug!("Erasing SFP database...");
    slave.erase_sfp_config()?;
    slave.write_sfp_config(SfpConfig {
        sfp: params.sfp,
        port: params.port,
        dtx: 0.0,
        drx: 0.0,
        alpha_n,
    })?;
    slave.load_sfp_config()?;
    slave.set_slaveport(params.port)?;

    session.operator.acknowledge(
        "Please connect the WR calibrator to the uncalibrated device with fiber f1 and press Enter",
    )?;
    info!("Starting device calibration procedure");
    super::wait_for_track_phase(slave, poll_interval)?;

    debug!("Calculating coarse Tx and Rx delays...");
    let mean_rtt = super::sample_mean_rtt(slave, params.n_samples, params.t_samples)?;
    let delays = slave.get_phy_delays()?;
    // The reference's rx delay is calibrated; the slave's is its bitslide.
    let coarse = 0.5 * (mean_rtt - delays.master.tx - delays.master.rx - delays.slave.rx - delta1);

    slave.erase_sfp_config()?;
    slave.write_sfp_config(SfpConfig {
        sfp: params.sfp,
        port: params.port,
        dtx: coarse,
        drx: coarse,
        alpha_n,
    })?;
    slave.load_sfp_config()?;
    debug!("Coarse transmission and reception delays = {coarse:.0} ps");

    info!("Calibrating device...");
    // Fold the residual skew into the delays while it is above the
    // requested error. The cap avoids an endless loop on a link that
    // never settles.
    let mut dtx = coarse;
    let mut drx = coarse;
    let mut mean_skew = f64::INFINITY;
    let mut iteration = 0;
    while mean_skew.abs() > params.error && iteration < MAX_REFINE_ITERATIONS {
        super::wait_for_track_phase(slave, poll_interval)?;
        info!("Measuring skew between PPS signals; this can take a long time...");
        mean_skew = instr.mean_time_interval(params.n_samples, params.t_samples)? * 1e12;
        info!("skew = {mean_skew:.1} ps");

        dtx -= mean_skew;
        drx += mean_skew;
        debug!("Writing current delays {dtx:.0},{drx:.0} to the SFP database...");
        slave.erase_sfp_config()?;
        slave.write_sfp_config(SfpConfig {
            sfp: params.sfp,
            port: params.port,
            dtx,
            drx,
            alpha_n,
        })?;
        slave.load_sfp_config()?;
        iteration += 1;
    }

    if mean_skew.abs() > params.error {
        // Soft stop: the latest delays are still stored.
        warn!(
            "No convergence after {MAX_REFINE_ITERATIONS} iterations; storing the latest delays (final skew {mean_skew:.1} ps)"
        );
    }

    let delay = PortDelay { dtx, drx };
    session.record.port_delay.insert(key, delay);
    info!(
        "Port calibrated: dtxs = {:.0} ps, drxs = {:.0} ps",
        delay.dtx, delay.drx
    );
    Ok(delay)
}
