//! SSD1306 instruction set: command table, opcode resolution and rendering.
//!
//! Every entry in a [`CommandTable`] is keyed by the lowest opcode it covers.
//! Plain entries cover exactly their key. Indexed entries cover
//! `base_address..base_address + address_count`, where the low bits of the
//! opcode carry a parameter such as a page or column index.

use std::fmt;
use std::ops::Range;

use log::warn;

use crate::error::TableError;

/// Renders a whole command from the transaction bytes and the family base opcode.
pub type CustomRenderer = fn(bytes: &[u8], base_address: u8) -> String;

/// One controller instruction or instruction family.
#[derive(Clone, Copy)]
pub struct CommandDescriptor {
    description: &'static str,
    address_count: u16,
    base_address: u8,
    custom_handler: Option<CustomRenderer>,
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("description", &self.description)
            .field("address_count", &self.address_count)
            .field("base_address", &format_args!("{:#04x}", self.base_address))
            .field("custom_handler", &self.custom_handler.is_some())
            .finish()
    }
}

impl CommandDescriptor {
    pub fn new(
        base_address: u8,
        description: &'static str,
        address_count: u16,
        custom_handler: Option<CustomRenderer>,
    ) -> Self {
        Self {
            description,
            address_count,
            base_address,
            custom_handler,
        }
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn address_count(&self) -> u16 {
        self.address_count
    }

    pub fn base_address(&self) -> u8 {
        self.base_address
    }

    pub fn has_custom_handler(&self) -> bool {
        self.custom_handler.is_some()
    }

    /// Opcodes covered by this family, as a half-open range.
    pub fn opcodes(&self) -> Range<u16> {
        let base = u16::from(self.base_address);
        base..base + self.address_count
    }

    pub fn contains(&self, opcode: u8) -> bool {
        self.opcodes().contains(&u16::from(opcode))
    }

    /// Render `opcode` as a member of this family. `bytes` is the full
    /// transaction payload, control byte included.
    pub fn render(&self, opcode: u8, bytes: &[u8]) -> String {
        if let Some(handler) = self.custom_handler {
            return handler(bytes, self.base_address);
        }
        if self.address_count == 1 {
            return format!("{} ({opcode:#x})", self.description);
        }
        let offset = opcode.wrapping_sub(self.base_address);
        format!("{}[{offset:x}] ({opcode:#x})", self.description)
    }
}

/// A table entry after construction.
#[derive(Debug, Clone, Copy)]
pub enum Command {
    /// Single fixed-meaning opcode with no addressing.
    Plain(&'static str),
    /// Descriptor for a single opcode or an indexed family.
    Indexed(CommandDescriptor),
}

impl Command {
    pub fn description(&self) -> &'static str {
        match self {
            Command::Plain(label) => label,
            Command::Indexed(descriptor) => descriptor.description(),
        }
    }
}

/// Declaration of a table entry before its key is known.
#[derive(Clone, Copy)]
pub enum CommandSpec {
    Plain(&'static str),
    Family {
        description: &'static str,
        address_count: u16,
        custom_handler: Option<CustomRenderer>,
    },
}

impl CommandSpec {
    pub const fn plain(label: &'static str) -> Self {
        CommandSpec::Plain(label)
    }

    pub const fn family(description: &'static str, address_count: u16) -> Self {
        CommandSpec::Family {
            description,
            address_count,
            custom_handler: None,
        }
    }

    pub const fn custom(
        description: &'static str,
        address_count: u16,
        handler: CustomRenderer,
    ) -> Self {
        CommandSpec::Family {
            description,
            address_count,
            custom_handler: Some(handler),
        }
    }

    fn build(self, key: u8) -> Command {
        match self {
            CommandSpec::Plain(label) => Command::Plain(label),
            CommandSpec::Family {
                description,
                address_count,
                custom_handler,
            } => Command::Indexed(CommandDescriptor::new(
                key,
                description,
                address_count,
                custom_handler,
            )),
        }
    }
}

/// SSD1306 fundamental, scrolling-free command set.
pub const SSD1306_COMMANDS: &[(u8, CommandSpec)] = &[
    (0x00, CommandSpec::family("Lower Column Start Address", 16)),
    (0x10, CommandSpec::family("Upper Column Start Address", 16)),
    (0x20, CommandSpec::plain("Set Memory Addressing Mode")),
    (0x21, CommandSpec::plain("Set Column Address")),
    (0x22, CommandSpec::plain("Set Page Address")),
    (0x40, CommandSpec::family("Set Display Start Line", 64)),
    (0x81, CommandSpec::plain("Set Contrast Control")),
    (0x8D, CommandSpec::plain("Charge Pump Setting")),
    (0xA0, CommandSpec::family("Set segment re-map", 2)),
    (0xA4, CommandSpec::plain("Entire Display On (follow RAM)")),
    (0xA5, CommandSpec::plain("Entire Display On (ignore RAM)")),
    (0xA6, CommandSpec::plain("Set Normal Display")),
    (0xA7, CommandSpec::plain("Set Inverse Display")),
    (0xA8, CommandSpec::plain("Set Multiplex Ratio")),
    (0xAE, CommandSpec::plain("Display Off")),
    (0xAF, CommandSpec::plain("Display On")),
    (0xB0, CommandSpec::family("Set Page Start Address", 8)),
    (0xC0, CommandSpec::plain("Set COM Output Scan Direction (normal mode)")),
    (0xC8, CommandSpec::plain("Set COM Output Scan Direction (remapped mode)")),
    (0xD3, CommandSpec::plain("Set display offset")),
    (0xD5, CommandSpec::plain("Set Display Clock Divide Ratio")),
    (0xD9, CommandSpec::plain("Set pre-charge period")),
    (0xDA, CommandSpec::plain("Set COM Pins Hardware Configuration")),
    (0xDB, CommandSpec::plain("Set Vcomh Deselect Level")),
];

/// Immutable opcode registry, in declaration order.
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: Vec<(u8, Command)>,
}

impl CommandTable {
    /// Build a table, rejecting empty families, families running past 0xff,
    /// duplicate keys and entries that share an opcode.
    pub fn try_new(specs: &[(u8, CommandSpec)]) -> Result<Self, TableError> {
        let table = Self::new_unchecked(specs);
        table.validate()?;
        Ok(table)
    }

    /// Build a table without validation.
    ///
    /// If entries overlap, [`CommandTable::resolve`] prefers an exact key
    /// match, then the first containing family in declaration order.
    pub fn new_unchecked(specs: &[(u8, CommandSpec)]) -> Self {
        let entries = specs
            .iter()
            .map(|&(key, spec)| (key, spec.build(key)))
            .collect();
        Self { entries }
    }

    pub fn ssd1306() -> Self {
        Self::new_unchecked(SSD1306_COMMANDS)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &Command)> {
        self.entries.iter().map(|(key, command)| (*key, command))
    }

    pub fn resolve(&self, opcode: u8) -> Option<&Command> {
        if let Some((_, command)) = self.entries.iter().find(|(key, _)| *key == opcode) {
            return Some(command);
        }
        self.entries
            .iter()
            .map(|(_, command)| command)
            .find(|command| matches!(command, Command::Indexed(d) if d.contains(opcode)))
    }

    /// Decode a command stream. `bytes[0]` is the control byte and `bytes[1]`
    /// the opcode; `None` if there is no opcode byte.
    pub fn decode_command(&self, bytes: &[u8]) -> Option<String> {
        let &opcode = bytes.get(1)?;
        let command = self.resolve(opcode);
        if command.is_none() {
            warn!("unknown command: {opcode:#x}");
        }
        Some(render(command, opcode, bytes))
    }

    fn validate(&self) -> Result<(), TableError> {
        let mut spans = Vec::with_capacity(self.entries.len());
        for (key, command) in &self.entries {
            let span = match command {
                Command::Plain(_) => {
                    let start = u16::from(*key);
                    start..start + 1
                }
                Command::Indexed(descriptor) => {
                    if descriptor.address_count == 0 {
                        return Err(TableError::EmptyFamily(*key));
                    }
                    if descriptor.opcodes().end > 0x100 {
                        return Err(TableError::OutOfRange {
                            base: *key,
                            count: descriptor.address_count,
                        });
                    }
                    descriptor.opcodes()
                }
            };
            spans.push((*key, span));
        }

        for (i, (first, a)) in spans.iter().enumerate() {
            for (second, b) in &spans[i + 1..] {
                if first == second {
                    return Err(TableError::DuplicateKey(*first));
                }
                let start = a.start.max(b.start);
                if start < a.end.min(b.end) {
                    return Err(TableError::Overlap {
                        first: *first,
                        second: *second,
                        opcode: start as u8,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::ssd1306()
    }
}

/// Render an opcode with whatever the table resolved for it.
pub fn render(command: Option<&Command>, opcode: u8, bytes: &[u8]) -> String {
    match command {
        None => format!("({opcode:#x})"),
        Some(Command::Plain(label)) => format!("{label} ({opcode:#x})"),
        Some(Command::Indexed(descriptor)) => descriptor.render(opcode, bytes),
    }
}
