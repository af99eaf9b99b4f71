// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::Cursor;

use approx::assert_abs_diff_eq;
use indoc::indoc;

use super::*;
use crate::device::SfpColor;

const BLUE_WR1: PortKey = PortKey {
    sfp: SfpColor::Blue,
    port: 1,
};
const VIOLET_WR2: PortKey = PortKey {
    sfp: SfpColor::Violet,
    port: 2,
};

fn make_record() -> CalibrationRecord {
    let mut record = CalibrationRecord {
        fiber_latency: FiberLatency {
            delta1: 11343.6,
            delta2: 2349817.3,
        },
        ..Default::default()
    };
    record.fiber_asymmetry.insert(BLUE_WR1, 1293.7);
    record.fiber_asymmetry.insert(VIOLET_WR2, -1293.7);
    record.port_delay.insert(
        BLUE_WR1,
        PortDelay {
            dtx: 253418.9,
            drx: 253417.2,
        },
    );
    record
}

fn parse(text: &str) -> Result<CalibrationRecord, RecordReadError> {
    CalibrationRecord::read(&mut Cursor::new(text))
}

#[test]
fn port_keys_render_and_parse() {
    assert_eq!(BLUE_WR1.to_string(), "blue-wr1");
    assert_eq!(VIOLET_WR2.to_string(), "violet-wr2");
    assert_eq!("blue-wr1".parse::<PortKey>().unwrap(), BLUE_WR1);
    assert_eq!("violet-wr2".parse::<PortKey>().unwrap(), VIOLET_WR2);
    assert!("green-wr1".parse::<PortKey>().is_err());
    assert!("blue-1".parse::<PortKey>().is_err());
    assert!("blue-wrx".parse::<PortKey>().is_err());
}

#[test]
fn written_records_have_the_fixed_block_order() {
    let mut out = vec![];
    make_record().write(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();

    // Timestamp comment first, then the three blocks.
    assert!(lines.next().unwrap().starts_with('#'));
    assert_eq!(lines.next().unwrap(), "@fiber-latency");
    assert_eq!(lines.next().unwrap(), "delta1:11343.6 delta2:2349817.3");
    assert_eq!(lines.next().unwrap(), "@fiber-asymmetry");
    // Asymmetry and delay values are integer-truncated.
    assert_eq!(lines.next().unwrap(), "blue-wr1:1293 violet-wr2:-1293 ");
    assert_eq!(lines.next().unwrap(), "@port-delay");
    assert_eq!(lines.next().unwrap(), "blue-wr1:253418,253417 ");
    assert_eq!(lines.next(), None);
}

#[test]
fn record_round_trips_through_a_file() {
    let record = make_record();

    let tmp_file = tempfile::NamedTempFile::new().expect("Couldn't make tmp file");
    record.write_to_file(tmp_file.path()).unwrap();
    let from_disk = CalibrationRecord::read_from_file(tmp_file.path()).unwrap();

    // Latency deltas are serialized with one decimal and survive exactly.
    assert_abs_diff_eq!(from_disk.fiber_latency.delta1, 11343.6);
    assert_abs_diff_eq!(from_disk.fiber_latency.delta2, 2349817.3);

    // Asymmetry and port-delay values lose their fractional part.
    assert_eq!(from_disk.fiber_asymmetry.len(), 2);
    assert_abs_diff_eq!(from_disk.fiber_asymmetry[&BLUE_WR1], 1293.0);
    assert_abs_diff_eq!(from_disk.fiber_asymmetry[&VIOLET_WR2], -1293.0);
    assert_eq!(from_disk.port_delay.len(), 1);
    assert_abs_diff_eq!(from_disk.port_delay[&BLUE_WR1].dtx, 253418.0);
    assert_abs_diff_eq!(from_disk.port_delay[&BLUE_WR1].drx, 253417.0);
}

#[test]
fn reading_a_missing_file_is_an_open_error() {
    let result = CalibrationRecord::read_from_file("/definitely/not/here.conf");
    assert!(matches!(result, Err(RecordReadError::Open { .. })));
}

#[test]
fn comments_and_blank_lines_are_skipped() {
    let record = parse(indoc! {"
        #14:21 260806
        # another comment

        @fiber-latency

        delta1:100.5 delta2:2000.0

        @fiber-asymmetry
        blue-wr1:42
    "})
    .unwrap();

    assert_abs_diff_eq!(record.fiber_latency.delta1, 100.5);
    assert_abs_diff_eq!(record.fiber_latency.delta2, 2000.0);
    assert_abs_diff_eq!(record.fiber_asymmetry[&BLUE_WR1], 42.0);
    assert!(record.port_delay.is_empty());
}

#[test]
fn unknown_blocks_are_skipped_with_their_payload() {
    let record = parse(indoc! {"
        @servo-state
        state:TRACK_PHASE
        @fiber-latency
        delta1:1.0 delta2:2.0
    "})
    .unwrap();
    assert_abs_diff_eq!(record.fiber_latency.delta1, 1.0);
    assert_abs_diff_eq!(record.fiber_latency.delta2, 2.0);
}

#[test]
fn a_later_block_replaces_an_earlier_one_in_full() {
    let record = parse(indoc! {"
        @fiber-asymmetry
        blue-wr1:10 violet-wr2:20
        @fiber-asymmetry
        blue-wr2:30
    "})
    .unwrap();

    // No merging within a block type: only the second line's key remains.
    assert_eq!(record.fiber_asymmetry.len(), 1);
    let blue_wr2 = PortKey {
        sfp: SfpColor::Blue,
        port: 2,
    };
    assert_abs_diff_eq!(record.fiber_asymmetry[&blue_wr2], 30.0);
}

#[test]
fn a_token_without_a_colon_fails_the_whole_load() {
    let result = parse(indoc! {"
        @fiber-asymmetry
        blue-wr1=42
    "});
    assert!(matches!(
        result,
        Err(RecordReadError::MalformedToken { token, line_num: 2 }) if token == "blue-wr1=42"
    ));
}

#[test]
fn a_non_numeric_value_fails_the_whole_load() {
    let result = parse(indoc! {"
        @fiber-latency
        delta1:fast delta2:2.0
    "});
    assert!(matches!(
        result,
        Err(RecordReadError::ParseFloat { string, line_num: 2 }) if string == "fast"
    ));
}

#[test]
fn a_port_delay_pair_without_a_comma_fails_the_whole_load() {
    let result = parse(indoc! {"
        @port-delay
        blue-wr1:100
    "});
    assert!(matches!(
        result,
        Err(RecordReadError::MalformedDelayPair { .. })
    ));
}

#[test]
fn a_malformed_key_fails_the_whole_load() {
    let result = parse(indoc! {"
        @fiber-asymmetry
        green-wr1:42
    "});
    assert!(matches!(result, Err(RecordReadError::InvalidKey { .. })));
}

#[test]
fn latency_lines_need_exactly_the_two_fixed_keys() {
    assert!(matches!(
        parse("@fiber-latency\ndelta1:1.0\n"),
        Err(RecordReadError::MalformedLatencyLine { .. })
    ));
    assert!(matches!(
        parse("@fiber-latency\ndelta2:1.0 delta1:2.0\n"),
        Err(RecordReadError::MalformedLatencyLine { .. })
    ));
    assert!(matches!(
        parse("@fiber-latency\ndelta1:1.0 delta2:2.0 delta3:3.0\n"),
        Err(RecordReadError::MalformedLatencyLine { .. })
    ));
}

#[test]
fn unmeasured_latency_is_the_zero_sentinel() {
    let record = CalibrationRecord::default();
    assert!(!record.fiber_latency.is_measured());
    let record = parse("@fiber-latency\ndelta1:11343.6 delta2:2349817.3\n").unwrap();
    assert!(record.fiber_latency.is_measured());
}
