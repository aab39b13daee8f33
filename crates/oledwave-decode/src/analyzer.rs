//! Turns bus frames into decoded SSD1306 transaction events.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::i2c::{Direction, I2cFrame, Transaction, TransactionAssembler};
use crate::settings::{
    AddressPolicy, Capabilities, DeviceAddress, ResultTypes, ADDRESS_FILTER_SETTING,
    I2C_ADDRESS_SETTING,
};
use crate::ssd1306::CommandTable;

/// D/C# selection, bit 6 of the control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataCommand {
    #[serde(rename = "data")]
    Data,
    #[serde(rename = "command")]
    Command,
    /// No payload to classify.
    #[serde(rename = "")]
    Empty,
}

impl DataCommand {
    pub fn from_control_byte(control: Option<u8>) -> Self {
        match control {
            None => DataCommand::Empty,
            Some(byte) if byte & 0x40 != 0 => DataCommand::Data,
            Some(_) => DataCommand::Command,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataCommand::Data => "data",
            DataCommand::Command => "command",
            DataCommand::Empty => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionData {
    #[serde(rename = "DC")]
    pub dc: DataCommand,
    pub command: String,
    pub address: u8,
    pub count: usize,
    pub data: Vec<String>,
    pub direction: Direction,
}

/// A decoded write transaction, as handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub start_time: f64,
    pub end_time: f64,
    pub data: TransactionData,
}

impl OutputEvent {
    pub const KIND: &'static str = "transaction";

    pub fn new(start_time: f64, end_time: f64, data: TransactionData) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            start_time,
            end_time,
            data,
        }
    }

    /// Build the event for a finished transaction. Reads and transactions
    /// without an address produce nothing.
    pub fn from_transaction(transaction: &Transaction, table: &CommandTable) -> Option<Self> {
        if transaction.is_read {
            return None;
        }
        let address = transaction.address?;
        let control = transaction.data.first().copied();
        let command = match control {
            Some(0x00) => table.decode_command(&transaction.data).unwrap_or_default(),
            _ => String::new(),
        };

        Some(Self::new(
            transaction.start_time,
            transaction.end_time,
            TransactionData {
                dc: DataCommand::from_control_byte(control),
                command,
                address,
                count: transaction.data.len(),
                data: transaction.data.iter().map(|b| b.to_string()).collect(),
                direction: transaction.direction(),
            },
        ))
    }

    /// Look up a field by its dotted name, as used in result format templates.
    pub fn field(&self, key: &str) -> Option<String> {
        let value = match key {
            "type" => self.kind.clone(),
            "start_time" => self.start_time.to_string(),
            "end_time" => self.end_time.to_string(),
            "data.DC" => self.data.dc.as_str().to_string(),
            "data.command" => self.data.command.clone(),
            "data.address" => self.data.address.to_string(),
            "data.count" => self.data.count.to_string(),
            "data.data" => format!("[{}]", self.data.data.join(", ")),
            "data.direction" => match self.data.direction {
                Direction::Read => "read".to_string(),
                Direction::Write => "write".to_string(),
            },
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalyzerStats {
    pub frames: u64,
    pub transactions: u64,
    pub emitted: u64,
    pub reads_dropped: u64,
    pub filtered: u64,
    pub unaddressed: u64,
    pub unknown_opcodes: u64,
}

/// Frame-at-a-time SSD1306 analyzer.
#[derive(Debug)]
pub struct Analyzer {
    table: CommandTable,
    assembler: TransactionAssembler,
    i2c_address: Option<DeviceAddress>,
    policy: AddressPolicy,
    result_types: ResultTypes,
    stats: AnalyzerStats,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self::with_table(CommandTable::ssd1306())
    }

    pub fn with_table(table: CommandTable) -> Self {
        Self {
            table,
            assembler: TransactionAssembler::new(),
            i2c_address: None,
            policy: AddressPolicy::default(),
            result_types: ResultTypes::default(),
            stats: AnalyzerStats::default(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::ssd1306()
    }

    /// Apply user settings. Nothing changes if any value is not one of its
    /// setting's choices.
    pub fn set_settings(
        &mut self,
        settings: &BTreeMap<String, String>,
    ) -> Result<ResultTypes, SettingsError> {
        let mut address = self.i2c_address;
        let mut policy = self.policy;
        for (key, value) in settings {
            match key.as_str() {
                I2C_ADDRESS_SETTING => address = Some(value.parse()?),
                ADDRESS_FILTER_SETTING => policy = value.parse()?,
                _ => warn!("ignoring unknown setting {key:?}"),
            }
        }

        if let Some(address) = address {
            info!("selected device address {address} ({policy:?})");
        }
        self.i2c_address = address;
        self.policy = policy;
        Ok(self.result_types.clone())
    }

    pub fn i2c_address(&self) -> Option<DeviceAddress> {
        self.i2c_address
    }

    pub fn address_policy(&self) -> AddressPolicy {
        self.policy
    }

    pub fn stats(&self) -> &AnalyzerStats {
        &self.stats
    }

    pub fn decode(&mut self, frame: &I2cFrame) -> Option<OutputEvent> {
        self.stats.frames += 1;
        let transaction = self.assembler.push(frame)?;
        self.stats.transactions += 1;
        self.decode_transaction(&transaction)
    }

    /// End of capture: discard any transaction still waiting for its stop.
    pub fn finish(&mut self) -> AnalyzerStats {
        if let Some(open) = self.assembler.reset() {
            debug!(
                "capture ended inside a transaction started at {} ({} bytes)",
                open.start_time,
                open.data.len()
            );
        }
        self.stats
    }

    fn decode_transaction(&mut self, transaction: &Transaction) -> Option<OutputEvent> {
        if transaction.is_read {
            self.stats.reads_dropped += 1;
            debug!("dropping read transaction at {}", transaction.start_time);
            return None;
        }
        let Some(address) = transaction.address else {
            self.stats.unaddressed += 1;
            debug!(
                "dropping transaction at {} without an address frame",
                transaction.start_time
            );
            return None;
        };
        if let (AddressPolicy::Filter, Some(device)) = (self.policy, self.i2c_address) {
            if address != device.value() {
                self.stats.filtered += 1;
                debug!("filtered transaction to 0x{address:02x}, expecting {device}");
                return None;
            }
        }

        let data = &transaction.data;
        if let [0x00, opcode, ..] = data.as_slice() {
            if self.table.resolve(*opcode).is_none() {
                self.stats.unknown_opcodes += 1;
            }
        }

        let event = OutputEvent::from_transaction(transaction, &self.table)?;
        self.stats.emitted += 1;
        Some(event)
    }
}
