// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Calibration software for White Rabbit (WR) time-transfer devices.

The calibration procedure measures the latency and asymmetry of a pair of
reference fibers with two WR devices and a time-interval counter, then
calibrates the per-port transmit/receive delays of further devices against
a WR calibrator. Results accumulate in a small textual calibration record.
 */

pub mod calibrate;
mod cli;
pub mod device;
pub mod record;

pub use cli::{WrCalError, WrCalibrate};

use crossbeam_utils::atomic::AtomicCell;

/// Are progress bars being drawn?
pub(crate) static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
