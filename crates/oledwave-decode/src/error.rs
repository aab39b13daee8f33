use thiserror::Error;

/// Problems found while building a [`crate::CommandTable`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("opcode 0x{0:02x} has an address count of zero")]
    EmptyFamily(u8),

    #[error("family at 0x{base:02x} with {count} opcodes runs past 0xff")]
    OutOfRange { base: u8, count: u16 },

    #[error("opcode 0x{0:02x} is declared twice")]
    DuplicateKey(u8),

    #[error("entry 0x{first:02x} overlaps entry 0x{second:02x} at opcode 0x{opcode:02x}")]
    Overlap { first: u8, second: u8, opcode: u8 },
}

/// Host or user misconfiguration, surfaced before any frame is decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unknown choice {value:?} for setting {setting:?}")]
    UnknownChoice { setting: String, value: String },
}
