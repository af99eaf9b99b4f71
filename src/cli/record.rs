// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Arguments for the record-show subcommand.

use std::path::PathBuf;

use clap::Parser;
use log::info;

use super::WrCalError;
use crate::record::CalibrationRecord;

#[derive(Parser, Debug)]
pub(super) struct RecordShowArgs {
    /// Path to the calibration record file.
    #[clap(name = "RECORD_FILE", parse(from_os_str))]
    record: PathBuf,
}

impl RecordShowArgs {
    pub(super) fn run(self) -> Result<(), WrCalError> {
        let record = CalibrationRecord::read_from_file(&self.record)?;

        info!("Fiber latency:");
        info!("-- delta1 : {:.2} ps", record.fiber_latency.delta1);
        info!("-- delta2 : {:.2} ps", record.fiber_latency.delta2);

        info!("Fiber asymmetry:");
        for (key, alpha_n) in &record.fiber_asymmetry {
            info!("-- {key} : {alpha_n:.0}");
        }

        info!("Port delays:");
        for (key, delay) in &record.port_delay {
            info!("-- {key} : {:.0},{:.0}", delay.dtx, delay.drx);
        }

        Ok(())
    }
}
