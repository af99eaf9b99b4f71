// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The reference-fiber latency measurement.
//!
//! Two WR devices are linked through the short fiber (f1), the long fiber
//! (f2) and both in series (f1+f2). For each configuration the round-trip
//! time is averaged and the master-to-master delay derived by stripping
//! the bitslides; the differences between the three give the latency of
//! each fiber.

use log::{debug, info};

use super::{CalibrateError, CalibrationSession, FIBERS};
use crate::{device::SfpColor, record::FiberLatency};

/// Sampling parameters for a fiber-latency measurement.
#[derive(Debug, Clone, Copy)]
pub struct FiberLatencyParams {
    /// How many round-trip-time readings make up one mean.
    pub n_samples: u32,

    /// Seconds between readings.
    pub t_samples: u64,
}

impl Default for FiberLatencyParams {
    fn default() -> Self {
        FiberLatencyParams {
            n_samples: 10,
            t_samples: 5,
        }
    }
}

pub(super) fn measure(
    session: &mut CalibrationSession,
    params: &FiberLatencyParams,
) -> Result<FiberLatency, CalibrateError> {
    if session.devices.len() < 2 {
        return Err(CalibrateError::WrDeviceNeeded {
            operation: "Measuring fiber latency",
            needed: 2,
            got: session.devices.len(),
        });
    }

    let poll_interval = session.poll_interval;
    let (master, slave) = session.devices.split_at_mut(1);
    let master = master[0].as_mut();
    let slave = slave[0].as_mut();

    // By convention the slave carries the blue SFP and the master the
    // violet one, both on port 1.
    super::reset_link(master, slave, SfpColor::Blue, 1)?;

    let mut delay_mm = [0.0; 3];
    for (i, fiber) in FIBERS.iter().enumerate() {
        session.operator.acknowledge(&format!(
            "Please connect both WR devices with fiber {fiber} on port 1 and press Enter"
        ))?;
        info!("Starting fiber latency measurement over {fiber}");

        super::wait_for_track_phase(slave, poll_interval)?;
        let mean_rtt = super::sample_mean_rtt(slave, params.n_samples, params.t_samples)?;
        debug!("Mean rtt over {fiber}: {mean_rtt} ps");

        // The SFP database rx corrections are zero, so the reported rx
        // delays are the bitslides.
        let delays = slave.get_phy_delays()?;
        delay_mm[i] = mean_rtt - delays.master.rx - delays.slave.rx;
        debug!("delay_mm over {fiber}: {} ps", delay_mm[i]);
    }

    let latency = FiberLatency {
        delta1: delay_mm[2] - delay_mm[1],
        delta2: delay_mm[2] - delay_mm[0],
    };
    session.record.fiber_latency = latency;
    info!(
        "Fiber latency: delta1 = {:.2} ps, delta2 = {:.2} ps",
        latency.delta1, latency.delta2
    );
    Ok(latency)
}
