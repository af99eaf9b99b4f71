// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contracts for the hardware a calibration session drives.
//!
//! Concrete drivers (register-level WR device access over a serial or
//! network interface, time-interval counters over VISA) live outside this
//! crate; they are attached through the [`WrDevice`] and [`Instrument`]
//! traits, either directly or by name through a [`DriverRegistry`].

mod error;

pub use error::DriverError;

use std::collections::HashMap;

use itertools::Itertools;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

lazy_static::lazy_static! {
    pub(crate) static ref SFP_COLOURS: String = SfpColor::iter().join(", ");
}

/// The colour of an SFP transceiver module, i.e. which of the two link
/// wavelengths it transmits on. The colour decides the sign conventions of
/// the asymmetry calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SfpColor {
    #[strum(serialize = "blue")]
    Blue,

    #[strum(serialize = "violet")]
    Violet,
}

impl SfpColor {
    /// The AXGE serial id that keys this module type in a WR device's SFP
    /// database.
    pub fn serial_id(self) -> &'static str {
        match self {
            SfpColor::Blue => "AXGE-1254-0531",
            SfpColor::Violet => "AXGE-3454-0531",
        }
    }

    /// The colour at the other end of the link.
    pub fn other(self) -> SfpColor {
        match self {
            SfpColor::Blue => SfpColor::Violet,
            SfpColor::Violet => SfpColor::Blue,
        }
    }
}

/// One entry of a WR device's SFP database.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SfpConfig {
    pub sfp: SfpColor,
    pub port: u8,

    /// Transmit delay correction \[ps\].
    pub dtx: f64,

    /// Receive delay correction \[ps\].
    pub drx: f64,

    /// 2^40-scaled fiber asymmetry coefficient.
    pub alpha_n: f64,
}

impl SfpConfig {
    /// An entry with every correction zeroed.
    pub fn zeroed(sfp: SfpColor, port: u8) -> SfpConfig {
        SfpConfig {
            sfp,
            port,
            dtx: 0.0,
            drx: 0.0,
            alpha_n: 0.0,
        }
    }
}

/// The transmit/receive delays one end of the link reports \[ps\]. While the
/// SFP database's rx correction is zero, `rx` is the bitslide.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhyDelays {
    pub tx: f64,
    pub rx: f64,
}

/// Physical delays for both ends of the current link, as reported by the
/// slave device after a timing exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinkDelays {
    pub master: PhyDelays,
    pub slave: PhyDelays,
}

/// A White Rabbit device under the session's control.
///
/// All delay quantities are picoseconds; the round-trip time and the phy
/// delays come straight from the device's servo statistics.
pub trait WrDevice {
    /// Wipe every entry of the device's SFP database.
    fn erase_sfp_config(&mut self) -> Result<(), DriverError>;

    /// Write one SFP database entry.
    fn write_sfp_config(&mut self, config: SfpConfig) -> Result<(), DriverError>;

    /// Make the device re-read its SFP database.
    fn load_sfp_config(&mut self) -> Result<(), DriverError>;

    /// Configure the device as the timing master.
    fn set_master(&mut self) -> Result<(), DriverError>;

    /// Configure the device as a slave synchronising through `port`.
    fn set_slaveport(&mut self, port: u8) -> Result<(), DriverError>;

    /// Whether the timing servo has reached TRACK_PHASE.
    fn in_track_phase(&mut self) -> Result<bool, DriverError>;

    /// Round-trip time of the last timing exchange \[ps\].
    fn get_rtt(&mut self) -> Result<f64, DriverError>;

    /// The physical delays of both link ends \[ps\].
    fn get_phy_delays(&mut self) -> Result<LinkDelays, DriverError>;

    /// Toggle the driver's diagnostic output.
    fn set_debug(&mut self, enabled: bool);

    /// Release the underlying interface.
    fn close(&mut self) -> Result<(), DriverError>;
}

/// A time-interval counter measuring the skew between two
/// pulse-per-second signals.
pub trait Instrument {
    /// The mean time interval between the two configured channels over
    /// `n_samples` readings spaced `t_samples` seconds apart \[s\].
    fn mean_time_interval(&mut self, n_samples: u32, t_samples: u64) -> Result<f64, DriverError>;

    /// Toggle the driver's diagnostic output.
    fn set_debug(&mut self, enabled: bool);
}

/// Parameters a WR device driver is constructed from.
#[derive(Debug, Clone)]
pub struct DeviceParams {
    /// The interface the device is reached over, e.g. a serial device node.
    pub interface: String,
    pub port: u16,
}

/// Parameters a measurement-instrument driver is constructed from.
#[derive(Debug, Clone)]
pub struct InstrumentParams {
    /// The interface the instrument is reached over.
    pub port: String,

    /// Input channel wired to the master's PPS output.
    pub master_chan: u8,

    /// Input channel wired to the slave's PPS output.
    pub slave_chan: u8,
}

pub type DeviceBuilder = fn(&DeviceParams) -> Result<Box<dyn WrDevice>, DriverError>;
pub type InstrumentBuilder = fn(&InstrumentParams) -> Result<Box<dyn Instrument>, DriverError>;

/// An explicit mapping from driver identifiers to constructors. Resolving
/// an identifier that was never registered is an error, not a fallback.
#[derive(Default)]
pub struct DriverRegistry {
    devices: HashMap<&'static str, DeviceBuilder>,
    instruments: HashMap<&'static str, InstrumentBuilder>,
}

impl DriverRegistry {
    pub fn new() -> DriverRegistry {
        DriverRegistry::default()
    }

    /// The registry the command-line interface starts from.
    // TODO: register the WR-LEN serial driver once it is ported to this crate.
    pub fn builtin() -> DriverRegistry {
        DriverRegistry::new()
    }

    pub fn register_device(&mut self, name: &'static str, build: DeviceBuilder) {
        self.devices.insert(name, build);
    }

    pub fn register_instrument(&mut self, name: &'static str, build: InstrumentBuilder) {
        self.instruments.insert(name, build);
    }

    pub fn build_device(
        &self,
        name: &str,
        params: &DeviceParams,
    ) -> Result<Box<dyn WrDevice>, DriverError> {
        match self.devices.get(name) {
            Some(build) => build(params),
            None => Err(DriverError::DeviceNotFound(name.to_string())),
        }
    }

    pub fn build_instrument(
        &self,
        name: &str,
        params: &InstrumentParams,
    ) -> Result<Box<dyn Instrument>, DriverError> {
        match self.instruments.get(name) {
            Some(build) => build(params),
            None => Err(DriverError::DeviceNotFound(name.to_string())),
        }
    }
}
