// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The fiber-asymmetry measurement.
//!
//! The same device pair as the latency measurement, linked through f1 and
//! then f2, with the skew between the two PPS outputs read by the
//! measurement instrument. The asymmetry depends on which module type
//! (colour) sits in the slave's port, so the coefficient is stored per
//! (colour, port).

use log::{debug, info};

use super::{CalibrateError, CalibrationSession, FIBERS};
use crate::{device::SfpColor, record::PortKey};

/// A PPS skew at or above this many seconds can only be miswiring.
pub(crate) const MAX_CREDIBLE_SKEW: f64 = 1e-6;

/// Parameters for a fiber-asymmetry measurement.
#[derive(Debug, Clone, Copy)]
pub struct FiberAsymmetryParams {
    /// How many time-interval readings make up one mean.
    pub n_samples: u32,

    /// Seconds between readings.
    pub t_samples: u64,

    /// The port the devices are linked through.
    pub port: u8,

    /// The SFP module type in the slave's port.
    pub sfp: SfpColor,
}

impl Default for FiberAsymmetryParams {
    fn default() -> Self {
        FiberAsymmetryParams {
            n_samples: 10,
            t_samples: 5,
            port: 1,
            sfp: SfpColor::Blue,
        }
    }
}

pub(super) fn measure(
    session: &mut CalibrationSession,
    params: &FiberAsymmetryParams,
) -> Result<f64, CalibrateError> {
    if session.devices.len() < 2 {
        return Err(CalibrateError::WrDeviceNeeded {
            operation: "Measuring fiber asymmetry",
            needed: 2,
            got: session.devices.len(),
        });
    }
    let Some(instr) = session.instr.as_mut() else {
        return Err(CalibrateError::MeasurementInstrumentNeeded);
    };
    if !session.record.fiber_latency.is_measured() {
        return Err(CalibrateError::FiberLatencyNeeded);
    }

    let poll_interval = session.poll_interval;
    let delta2 = session.record.fiber_latency.delta2;
    let (master, slave) = session.devices.split_at_mut(1);
    let master = master[0].as_mut();
    let slave = slave[0].as_mut();

    super::reset_link(master, slave, params.sfp, params.port)?;

    let mut skew = [0.0f64; 2];
    for (i, fiber) in FIBERS.iter().take(2).enumerate() {
        session.operator.acknowledge(&format!(
            "Please connect both WR devices with fiber {fiber} and press Enter"
        ))?;
        session.operator.acknowledge(
            "Now connect their PPS outputs to the measurement instrument and press Enter",
        )?;
        info!("Starting skew measurement over {fiber}");

        super::wait_for_track_phase(slave, poll_interval)?;
        info!("Measuring skew between PPS signals; this can take a long time...");
        let mut mean_skew = instr.mean_time_interval(params.n_samples, params.t_samples)?;
        // The blue module reports the interval with the opposite sign.
        if params.sfp == SfpColor::Blue {
            mean_skew = -mean_skew;
        }
        if mean_skew.abs() >= MAX_CREDIBLE_SKEW {
            return Err(CalibrateError::Measuring { skew: mean_skew });
        }
        skew[i] = mean_skew;
    }

    // s -> ps.
    let skew_f1 = skew[0] * 1e12;
    let skew_f2 = skew[1] * 1e12;
    debug!("Mean skew master to slave with f1: {skew_f1:e} ps");
    debug!("Mean skew master to slave with f2: {skew_f2:e} ps");

    let dif = skew_f2 - skew_f1;
    let alpha = (2.0 * dif) / (0.5 * delta2 - dif);
    let mut alpha_n = 2f64.powi(40) * ((alpha + 1.0) / (alpha + 2.0) - 0.5);
    // A violet module in the slave flips the sign convention.
    if params.sfp == SfpColor::Violet {
        alpha_n = -alpha_n;
    }

    let key = PortKey {
        sfp: params.sfp,
        port: params.port,
    };
    session.record.fiber_asymmetry.insert(key, alpha_n);
    info!("Fiber asymmetry for {key} = {alpha_n:.0}");
    Ok(alpha_n)
}
