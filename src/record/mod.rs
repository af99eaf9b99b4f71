// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to read and write calibration records.
//!
//! A record is a small line-oriented text file with three named blocks,
//! each introduced by a `@<block-name>` marker line and holding a single
//! payload line of space-separated `key:value` tokens:
//!
//! ```text
//! #14:21 260806
//! @fiber-latency
//! delta1:11343.6 delta2:2349817.2
//! @fiber-asymmetry
//! blue-wr1:1293
//! @port-delay
//! blue-wr1:253418,253417
//! ```
//!
//! Lines starting with `#` are comments. The asymmetry and delay values
//! are written integer-truncated; the latency deltas keep one decimal.

mod error;
#[cfg(test)]
mod tests;

pub use error::{InvalidPortKey, RecordReadError, RecordWriteError};

use std::{
    fmt::{self, Display},
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
    str::FromStr,
};

use indexmap::IndexMap;
use log::debug;

use crate::device::SfpColor;

/// Key of a per-port calibration entry, rendered `<sfp-colour>-wr<port>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortKey {
    pub sfp: SfpColor,
    pub port: u8,
}

impl Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-wr{}", self.sfp, self.port)
    }
}

impl FromStr for PortKey {
    type Err = InvalidPortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (colour, port) = s
            .split_once("-wr")
            .ok_or_else(|| InvalidPortKey(s.to_string()))?;
        let sfp = colour
            .parse()
            .map_err(|_| InvalidPortKey(s.to_string()))?;
        let port = port.parse().map_err(|_| InvalidPortKey(s.to_string()))?;
        Ok(PortKey { sfp, port })
    }
}

/// The latency of the two reference fibers \[ps\].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FiberLatency {
    pub delta1: f64,
    pub delta2: f64,
}

impl FiberLatency {
    /// `delta1 != 0` is the sentinel for "a latency measurement exists".
    pub fn is_measured(&self) -> bool {
        self.delta1 != 0.0
    }
}

/// Transmit/receive delay corrections for one calibrated port \[ps\].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortDelay {
    pub dtx: f64,
    pub drx: f64,
}

/// All calibration results for one device/fiber combination. Mutated in
/// place by completed calibration operations; the record file is the only
/// persistent artefact of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationRecord {
    pub fiber_latency: FiberLatency,

    /// 2^40-scaled asymmetry coefficients per (SFP colour, port).
    pub fiber_asymmetry: IndexMap<PortKey, f64>,

    /// Transmit/receive delay corrections per (SFP colour, port).
    pub port_delay: IndexMap<PortKey, PortDelay>,
}

/// Parser state: which block the next payload line belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Block {
    None,
    FiberLatency,
    FiberAsymmetry,
    PortDelay,
}

impl CalibrationRecord {
    /// Read a record from `path`. The result fully replaces whatever the
    /// caller held; there is no merging.
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<CalibrationRecord, RecordReadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| RecordReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let record = Self::read(&mut BufReader::new(file))?;
        debug!("Loaded calibration record from '{}'", path.display());
        Ok(record)
    }

    /// Parse a record from a buffer. Single pass; a marker line selects the
    /// block and the following payload line is parsed according to it,
    /// after which the state drops back to "no block". Comments, blank
    /// lines and empty tokens are skipped; anything else malformed aborts
    /// the whole load.
    pub(crate) fn read<T: BufRead>(buf: &mut T) -> Result<CalibrationRecord, RecordReadError> {
        let mut record = CalibrationRecord::default();
        let mut block = Block::None;
        let mut line = String::new();
        let mut line_num: u32 = 0;

        while buf.read_line(&mut line)? > 0 {
            line_num += 1;
            let payload = line.trim_end_matches(['\n', '\r']);

            if payload.starts_with('#') || payload.trim().is_empty() {
                line.clear();
                continue;
            }

            if let Some(marker) = payload.strip_prefix('@') {
                block = match marker {
                    "fiber-latency" => Block::FiberLatency,
                    "fiber-asymmetry" => Block::FiberAsymmetry,
                    "port-delay" => Block::PortDelay,
                    other => {
                        debug!("Skipping unrecognised record block '@{other}' on line {line_num}");
                        Block::None
                    }
                };
                line.clear();
                continue;
            }

            match block {
                Block::None => {
                    debug!("Ignoring line {line_num}; it belongs to no record block")
                }
                Block::FiberLatency => {
                    record.fiber_latency = parse_latency_line(payload, line_num)?
                }
                Block::FiberAsymmetry => {
                    // Replaces the table in full; no merging within a block.
                    record.fiber_asymmetry = parse_asymmetry_line(payload, line_num)?
                }
                Block::PortDelay => record.port_delay = parse_delay_line(payload, line_num)?,
            }

            // Every block's payload is a single line.
            block = Block::None;
            line.clear();
        }

        Ok(record)
    }

    /// Write the record to `path`, overwriting any existing file.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RecordWriteError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| RecordWriteError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        self.write(&mut out)?;
        out.flush().map_err(RecordWriteError::from)?;
        debug!("Wrote calibration record to '{}'", path.display());
        Ok(())
    }

    /// Serialize the record: a timestamp comment, then the three blocks in
    /// their fixed order.
    pub(crate) fn write<W: Write>(&self, out: &mut W) -> Result<(), RecordWriteError> {
        writeln!(out, "{}", chrono::Local::now().format("#%H:%M %y%m%d"))?;

        writeln!(out, "@fiber-latency")?;
        writeln!(
            out,
            "delta1:{:.1} delta2:{:.1}",
            self.fiber_latency.delta1, self.fiber_latency.delta2
        )?;

        writeln!(out, "@fiber-asymmetry")?;
        for (key, alpha_n) in &self.fiber_asymmetry {
            write!(out, "{key}:{} ", *alpha_n as i64)?;
        }
        writeln!(out)?;

        writeln!(out, "@port-delay")?;
        for (key, delay) in &self.port_delay {
            write!(out, "{key}:{},{} ", delay.dtx as i64, delay.drx as i64)?;
        }
        writeln!(out)?;

        Ok(())
    }
}

fn split_token(token: &str, line_num: u32) -> Result<(&str, &str), RecordReadError> {
    token
        .split_once(':')
        .ok_or_else(|| RecordReadError::MalformedToken {
            token: token.to_string(),
            line_num,
        })
}

fn parse_float(string: &str, line_num: u32) -> Result<f64, RecordReadError> {
    string
        .parse()
        .map_err(|_| RecordReadError::ParseFloat {
            string: string.to_string(),
            line_num,
        })
}

fn parse_key(string: &str, line_num: u32) -> Result<PortKey, RecordReadError> {
    string
        .parse()
        .map_err(|source| RecordReadError::InvalidKey { line_num, source })
}

/// Tokens of a payload line. The writer leaves a trailing space, so empty
/// tokens are silently dropped.
fn tokens(payload: &str) -> impl Iterator<Item = &str> {
    payload.split(' ').filter(|t| !t.trim().is_empty())
}

fn parse_latency_line(payload: &str, line_num: u32) -> Result<FiberLatency, RecordReadError> {
    let mut iter = tokens(payload);
    let (first, second) = match (iter.next(), iter.next(), iter.next()) {
        (Some(first), Some(second), None) => (first, second),
        _ => return Err(RecordReadError::MalformedLatencyLine { line_num }),
    };
    let (key1, value1) = split_token(first, line_num)?;
    let (key2, value2) = split_token(second, line_num)?;
    if key1 != "delta1" || key2 != "delta2" {
        return Err(RecordReadError::MalformedLatencyLine { line_num });
    }
    Ok(FiberLatency {
        delta1: parse_float(value1, line_num)?,
        delta2: parse_float(value2, line_num)?,
    })
}

fn parse_asymmetry_line(
    payload: &str,
    line_num: u32,
) -> Result<IndexMap<PortKey, f64>, RecordReadError> {
    let mut asymmetry = IndexMap::new();
    for token in tokens(payload) {
        let (key, value) = split_token(token, line_num)?;
        asymmetry.insert(parse_key(key, line_num)?, parse_float(value, line_num)?);
    }
    Ok(asymmetry)
}

fn parse_delay_line(
    payload: &str,
    line_num: u32,
) -> Result<IndexMap<PortKey, PortDelay>, RecordReadError> {
    let mut delays = IndexMap::new();
    for token in tokens(payload) {
        let (key, value) = split_token(token, line_num)?;
        let (dtx, drx) = value
            .split_once(',')
            .ok_or_else(|| RecordReadError::MalformedDelayPair {
                token: token.to_string(),
                line_num,
            })?;
        delays.insert(
            parse_key(key, line_num)?,
            PortDelay {
                dtx: parse_float(dtx, line_num)?,
                drx: parse_float(drx, line_num)?,
            },
        );
    }
    Ok(delays)
}
