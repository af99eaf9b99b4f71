// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for device and instrument drivers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("'{0}' does not name a registered WR device or measurement-instrument driver")]
    DeviceNotFound(String),

    /// A command failed inside a concrete driver.
    #[error("{driver}: {message}")]
    Command { driver: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
