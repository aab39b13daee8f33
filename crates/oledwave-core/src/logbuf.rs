use std::collections::VecDeque;

use oledwave_decode::{DataCommand, OutputEvent, ResultFormat};

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub index: u64,
    pub event: OutputEvent,
}

/// Bounded history of decoded transactions.
pub struct LogStore {
    entries: VecDeque<LogEntry>,
    max_entries: usize,
    next_index: u64,
    show_data: bool,
    show_command: bool,
}

impl LogStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
            next_index: 0,
            show_data: true,
            show_command: true,
        }
    }

    pub fn set_filter(&mut self, show_data: bool, show_command: bool) {
        self.show_data = show_data;
        self.show_command = show_command;
    }

    pub fn push(&mut self, event: OutputEvent) {
        self.entries.push_back(LogEntry {
            index: self.next_index,
            event,
        });
        self.next_index += 1;

        while self.entries.len() > self.max_entries.max(1) {
            self.entries.pop_front();
        }
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_visible(&self, entry: &LogEntry) -> bool {
        match entry.event.data.dc {
            DataCommand::Data => self.show_data,
            DataCommand::Command | DataCommand::Empty => self.show_command,
        }
    }

    pub fn render_entry(
        &self,
        entry: &LogEntry,
        show_timestamp: bool,
        show_hex: bool,
        format: &ResultFormat,
    ) -> String {
        let event = &entry.event;
        let mut line = String::new();
        if show_timestamp {
            line.push_str(&format!("[{:>12.6}] ", event.start_time));
        }
        line.push_str(&format!("W 0x{:02X} ", event.data.address));

        let label = format.render(event);
        if label.is_empty() {
            line.push_str(match event.data.dc {
                DataCommand::Data => "data",
                DataCommand::Command => "command",
                DataCommand::Empty => "(empty)",
            });
        } else {
            line.push_str(&label);
        }

        if show_hex {
            line.push_str(" |");
            for byte in &event.data.data {
                match byte.parse::<u8>() {
                    Ok(b) => line.push_str(&format!(" {b:02X}")),
                    Err(_) => line.push_str(&format!(" {byte}")),
                }
            }
        }
        line
    }

    pub fn to_text(&self, show_timestamp: bool, show_hex: bool, format: &ResultFormat) -> String {
        let mut result = String::new();
        for entry in self.entries.iter().filter(|e| self.is_visible(e)) {
            result.push_str(&self.render_entry(entry, show_timestamp, show_hex, format));
            result.push('\n');
        }
        result
    }
}
