// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for the calibration operations.

use thiserror::Error;

use crate::device::{DriverError, SfpColor};

#[derive(Error, Debug)]
pub enum CalibrateError {
    #[error("{operation} needs at least {needed} WR devices, but only {got} are attached")]
    WrDeviceNeeded {
        operation: &'static str,
        needed: usize,
        got: usize,
    },

    #[error(
        "To measure the skew between PPS signals a measurement instrument must be attached"
    )]
    MeasurementInstrumentNeeded,

    #[error("A fiber-latency measurement is needed before this operation; run fiber-latency first")]
    FiberLatencyNeeded,

    #[error("No fiber-asymmetry value for port {port} and the {sfp} SFP; run fiber-asymmetry first")]
    FiberAsymmetryNeeded { sfp: SfpColor, port: u8 },

    #[error("The mean time interval between the PPS inputs is {skew:e} s, at or above the 1e-6 s limit. Are the input channels connected the right way around?")]
    Measuring { skew: f64 },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Couldn't read the operator's acknowledgment: {0}")]
    Operator(#[from] std::io::Error),
}
