// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all wr_calibrate-related errors. This should be the
//! *only* error enum that is publicly visible.

use thiserror::Error;

use super::common::WrCalArgsError;
use crate::{
    calibrate::CalibrateError,
    device::DriverError,
    record::{RecordReadError, RecordWriteError},
};

#[derive(Error, Debug)]
pub enum WrCalError {
    /// An error related to argument files.
    #[error("{0}")]
    ArgFile(String),

    /// An error when consolidating subcommand arguments.
    #[error("{0}")]
    Args(String),

    /// An error while driving a calibration operation.
    #[error("{0}")]
    Calibrate(String),

    /// An error from a device or instrument driver.
    #[error("{0}")]
    Driver(String),

    /// An error related to the calibration record file.
    #[error("{0}")]
    Record(String),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<WrCalArgsError> for WrCalError {
    fn from(e: WrCalArgsError) -> WrCalError {
        WrCalError::Args(e.to_string())
    }
}

impl From<CalibrateError> for WrCalError {
    fn from(e: CalibrateError) -> WrCalError {
        WrCalError::Calibrate(e.to_string())
    }
}

impl From<DriverError> for WrCalError {
    fn from(e: DriverError) -> WrCalError {
        WrCalError::Driver(e.to_string())
    }
}

impl From<RecordReadError> for WrCalError {
    fn from(e: RecordReadError) -> WrCalError {
        WrCalError::Record(e.to_string())
    }
}

impl From<RecordWriteError> for WrCalError {
    fn from(e: RecordWriteError) -> WrCalError {
        WrCalError::Record(e.to_string())
    }
}
