//! SSD1306 command decoding on top of reassembled I2C transactions.

pub mod analyzer;
pub mod error;
pub mod i2c;
pub mod settings;
pub mod ssd1306;

pub use analyzer::{Analyzer, AnalyzerStats, DataCommand, OutputEvent, TransactionData};
pub use error::{SettingsError, TableError};
pub use i2c::{AssemblerState, Direction, I2cFrame, Transaction, TransactionAssembler};
pub use settings::{AddressPolicy, Capabilities, DeviceAddress, ResultFormat, ResultTypes};
pub use ssd1306::{Command, CommandDescriptor, CommandSpec, CommandTable, CustomRenderer};
