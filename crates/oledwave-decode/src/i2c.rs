//! I2C frame events and transaction reassembly.
//!
//! An upstream bus analyzer delivers one [`I2cFrame`] per bus primitive, in
//! chronological order. [`TransactionAssembler`] collects the frames between a
//! start and a stop into a [`Transaction`].

use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBytes {
    pub address: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataBytes {
    pub data: Vec<u8>,
}

/// One primitive bus event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum I2cFrame {
    Start { start_time: f64 },
    Address { data: AddressBytes },
    Data { data: DataBytes },
    Stop { end_time: f64 },
}

impl I2cFrame {
    pub fn start(start_time: f64) -> Self {
        I2cFrame::Start { start_time }
    }

    pub fn address(raw: u8) -> Self {
        I2cFrame::Address {
            data: AddressBytes { address: vec![raw] },
        }
    }

    pub fn data(byte: u8) -> Self {
        I2cFrame::Data {
            data: DataBytes { data: vec![byte] },
        }
    }

    pub fn stop(end_time: f64) -> Self {
        I2cFrame::Stop { end_time }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Read,
    Write,
}

/// One bus operation from start to stop.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub start_time: f64,
    pub end_time: f64,
    /// 7-bit device address, once an address frame has been seen.
    pub address: Option<u8>,
    pub is_read: bool,
    pub data: Vec<u8>,
}

impl Transaction {
    pub fn new(start_time: f64) -> Self {
        Self {
            start_time,
            end_time: start_time,
            address: None,
            is_read: false,
            data: Vec::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        if self.is_read {
            Direction::Read
        } else {
            Direction::Write
        }
    }

    fn set_address(&mut self, raw: u8) {
        self.address = Some(raw >> 1);
        self.is_read = raw & 0x01 == 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Idle,
    Open,
}

/// Holds at most one live transaction.
#[derive(Debug, Default)]
pub struct TransactionAssembler {
    current: Option<Transaction>,
}

impl TransactionAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AssemblerState {
        match self.current {
            Some(_) => AssemblerState::Open,
            None => AssemblerState::Idle,
        }
    }

    pub fn current(&self) -> Option<&Transaction> {
        self.current.as_ref()
    }

    /// Feed one frame. Returns the finished transaction when `frame` is the
    /// stop that closes it.
    pub fn push(&mut self, frame: &I2cFrame) -> Option<Transaction> {
        if let I2cFrame::Start { start_time } = frame {
            if self.current.is_some() {
                debug!("start at {start_time} replaces an unfinished transaction");
            }
            self.current = Some(Transaction::new(*start_time));
            return None;
        }

        let open = self.current.as_mut()?;
        match frame {
            I2cFrame::Address { data } => match data.address.first() {
                Some(&raw) => open.set_address(raw),
                None => debug!("ignoring address frame without bytes"),
            },
            // one byte per data frame; anything past the first is ignored
            I2cFrame::Data { data } => match data.data.first() {
                Some(&byte) => open.data.push(byte),
                None => debug!("ignoring data frame without bytes"),
            },
            I2cFrame::Stop { end_time } => {
                open.end_time = *end_time;
                return self.current.take();
            }
            I2cFrame::Start { .. } => {}
        }
        None
    }

    /// Drop any live transaction, e.g. at end of capture.
    pub fn reset(&mut self) -> Option<Transaction> {
        self.current.take()
    }
}
