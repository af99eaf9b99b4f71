// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error types for reading and writing calibration records.

use std::path::PathBuf;

use thiserror::Error;

/// Errors associated with loading a calibration record. The whole load is
/// abandoned on the first of these; no partial record is ever applied.
#[derive(Error, Debug)]
pub enum RecordReadError {
    #[error("Couldn't open calibration record file '{path}': {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed token '{token}' on line {line_num}; expected 'key:value'")]
    MalformedToken { token: String, line_num: u32 },

    #[error("Couldn't parse '{string}' as a number on line {line_num}")]
    ParseFloat { string: String, line_num: u32 },

    #[error("Line {line_num}: {source}")]
    InvalidKey {
        line_num: u32,
        source: InvalidPortKey,
    },

    #[error("Malformed port-delay value in '{token}' on line {line_num}; expected 'key:dtx,drx'")]
    MalformedDelayPair { token: String, line_num: u32 },

    #[error("Malformed fiber-latency payload on line {line_num}; expected 'delta1:<value> delta2:<value>'")]
    MalformedLatencyLine { line_num: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors associated with writing a calibration record.
#[derive(Error, Debug)]
pub enum RecordWriteError {
    #[error("Couldn't create calibration record file '{path}': {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A key that doesn't follow the `<sfp-colour>-wr<port>` shape.
#[derive(Error, Debug)]
#[error("'{0}' is not a valid port key; expected '<sfp-colour>-wr<port>', e.g. 'blue-wr1'")]
pub struct InvalidPortKey(pub(crate) String);
