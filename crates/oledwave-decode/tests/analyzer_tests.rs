//! End-to-end tests for frame decoding against the SSD1306 command table.
//!
//! These cover:
//! - Exact and family opcode resolution over the whole opcode space
//! - Read filtering and address/direction extraction
//! - D/C# classification of write payloads

use oledwave_decode::{
    Analyzer, Command, CommandTable, DataCommand, Direction, I2cFrame, OutputEvent,
};
use proptest::prelude::*;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub fn transaction_frames(raw_address: u8, payload: &[u8]) -> Vec<I2cFrame> {
        let mut frames = vec![I2cFrame::start(10.0), I2cFrame::address(raw_address)];
        frames.extend(payload.iter().map(|&b| I2cFrame::data(b)));
        frames.push(I2cFrame::stop(11.0));
        frames
    }

    pub fn decode_all(analyzer: &mut Analyzer, frames: &[I2cFrame]) -> Vec<OutputEvent> {
        frames.iter().filter_map(|f| analyzer.decode(f)).collect()
    }

    /// Families in the built-in table as (base, count).
    pub fn families(table: &CommandTable) -> Vec<(u8, u16)> {
        table
            .iter()
            .filter_map(|(_, command)| match command {
                Command::Indexed(d) if d.address_count() > 1 => {
                    Some((d.base_address(), d.address_count()))
                }
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn exact_keys_resolve_to_their_own_entry() {
    let table = CommandTable::ssd1306();
    for (key, entry) in table.iter() {
        let resolved = table.resolve(key).unwrap();
        assert!(std::ptr::eq(resolved, entry), "0x{key:02x}");
    }
}

#[test]
fn every_family_member_resolves_to_family() {
    let table = CommandTable::ssd1306();
    for (base, count) in helpers::families(&table) {
        for offset in 0..count {
            let opcode = base + offset as u8;
            let Some(Command::Indexed(d)) = table.resolve(opcode) else {
                panic!("0x{opcode:02x} did not resolve");
            };
            assert_eq!(d.base_address(), base);
            let rendered = table.decode_command(&[0x00, opcode]).unwrap();
            assert_eq!(
                rendered,
                format!("{}[{:x}] ({:#x})", d.description(), offset, opcode)
            );
        }
    }
}

#[test]
fn page_start_example() {
    let mut analyzer = Analyzer::new();
    let frames = helpers::transaction_frames(0x78, &[0x00, 0xB5]);
    let events = helpers::decode_all(&mut analyzer, &frames);
    assert_eq!(events[0].data.command, "Set Page Start Address[5] (0xb5)");
}

#[test]
fn init_sequence() {
    // Typical 128x64 bring-up, one command per transaction
    let sequence: &[(&[u8], &str)] = &[
        (&[0x00, 0xAE], "Display Off (0xae)"),
        (&[0x00, 0xD5, 0x80], "Set Display Clock Divide Ratio (0xd5)"),
        (&[0x00, 0xA8, 0x3F], "Set Multiplex Ratio (0xa8)"),
        (&[0x00, 0xD3, 0x00], "Set display offset (0xd3)"),
        (&[0x00, 0x40], "Set Display Start Line[0] (0x40)"),
        (&[0x00, 0x8D, 0x14], "Charge Pump Setting (0x8d)"),
        (&[0x00, 0x20, 0x00], "Set Memory Addressing Mode (0x20)"),
        (&[0x00, 0xA1], "Set segment re-map[1] (0xa1)"),
        (&[0x00, 0xC8], "Set COM Output Scan Direction (remapped mode) (0xc8)"),
        (&[0x00, 0xDA, 0x12], "Set COM Pins Hardware Configuration (0xda)"),
        (&[0x00, 0x81, 0xCF], "Set Contrast Control (0x81)"),
        (&[0x00, 0xD9, 0xF1], "Set pre-charge period (0xd9)"),
        (&[0x00, 0xDB, 0x40], "Set Vcomh Deselect Level (0xdb)"),
        (&[0x00, 0xA4], "Entire Display On (follow RAM) (0xa4)"),
        (&[0x00, 0xA6], "Set Normal Display (0xa6)"),
        (&[0x00, 0xAF], "Display On (0xaf)"),
    ];

    let mut analyzer = Analyzer::new();
    let frames: Vec<I2cFrame> = sequence
        .iter()
        .flat_map(|(payload, _)| helpers::transaction_frames(0x78, payload))
        .collect();
    let events = helpers::decode_all(&mut analyzer, &frames);

    let commands: Vec<&str> = events.iter().map(|e| e.data.command.as_str()).collect();
    let expected: Vec<&str> = sequence.iter().map(|(_, c)| *c).collect();
    assert_eq!(commands, expected);
    assert_eq!(analyzer.stats().emitted, sequence.len() as u64);
    assert_eq!(analyzer.stats().unknown_opcodes, 0);
}

#[test]
fn interleaved_reads_do_not_disturb_writes() {
    let mut analyzer = Analyzer::new();
    let mut frames = helpers::transaction_frames(0x79, &[0x43]);
    frames.extend(helpers::transaction_frames(0x78, &[0x40, 1, 2, 3]));
    frames.extend(helpers::transaction_frames(0x79, &[0x00, 0xAF]));
    let events = helpers::decode_all(&mut analyzer, &frames);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data.dc, DataCommand::Data);
    assert_eq!(events[0].data.data, vec!["64", "1", "2", "3"]);
    assert_eq!(analyzer.stats().reads_dropped, 2);
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;

    fn payload() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..32)
    }

    proptest! {
        #[test]
        fn unresolved_opcodes_render_hex_only(opcode in any::<u8>()) {
            let table = CommandTable::ssd1306();
            let rendered = table.decode_command(&[0x00, opcode]).unwrap();
            if table.resolve(opcode).is_none() {
                prop_assert_eq!(rendered, format!("({:#x})", opcode));
            } else {
                let suffix = format!(" ({:#x})", opcode);
                prop_assert!(rendered.ends_with(&suffix), "{} lacks {}", rendered, suffix);
            }
        }

        #[test]
        fn reads_never_produce_events(address in 0u8..0x80, payload in payload()) {
            let mut analyzer = Analyzer::new();
            let raw = (address << 1) | 1;
            let frames = helpers::transaction_frames(raw, &payload);
            let events = helpers::decode_all(&mut analyzer, &frames);
            prop_assert!(events.is_empty());
        }

        #[test]
        fn address_and_direction_round_trip(raw in any::<u8>(), payload in payload()) {
            let mut analyzer = Analyzer::new();
            let frames = helpers::transaction_frames(raw, &payload);
            let events = helpers::decode_all(&mut analyzer, &frames);
            if raw & 1 == 0 {
                prop_assert_eq!(events.len(), 1);
                prop_assert_eq!(events[0].data.address, raw >> 1);
                prop_assert_eq!(events[0].data.direction, Direction::Write);
                prop_assert_eq!(events[0].data.count, payload.len());
            } else {
                prop_assert!(events.is_empty());
            }
        }

        #[test]
        fn control_byte_classification(control in any::<u8>(), rest in payload()) {
            let mut payload = vec![control];
            payload.extend(rest.iter().copied());
            let mut analyzer = Analyzer::new();
            let frames = helpers::transaction_frames(0x78, &payload);
            let events = helpers::decode_all(&mut analyzer, &frames);
            let data = &events[0].data;
            if control & 0x40 != 0 {
                prop_assert_eq!(data.dc, DataCommand::Data);
                prop_assert_eq!(data.command.as_str(), "");
            } else if control == 0x00 && !rest.is_empty() {
                prop_assert_eq!(data.dc, DataCommand::Command);
                prop_assert!(!data.command.is_empty());
            } else {
                prop_assert_eq!(data.dc, DataCommand::Command);
                if control != 0x00 {
                    prop_assert_eq!(data.command.as_str(), "");
                }
            }
        }
    }
}
