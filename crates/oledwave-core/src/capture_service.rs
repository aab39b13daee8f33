use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{info, warn};
use oledwave_decode::I2cFrame;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use crate::CoreError;

/// Where captured bus frames come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureSource {
    Stdin,
    File(PathBuf),
}

impl CaptureSource {
    pub fn name(&self) -> String {
        match self {
            CaptureSource::Stdin => "<stdin>".to_string(),
            CaptureSource::File(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CaptureEvent {
    Opened(String),
    Frame { line: usize, frame: I2cFrame },
    Error { line: usize, message: String },
    Closed,
}

enum Command {
    Close,
}

/// Reads a JSON-lines capture on a background thread, one frame per line.
pub struct CaptureService {
    source: String,
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<CaptureEvent>,
}

impl CaptureService {
    pub fn open(source: CaptureSource) -> Result<Self, CoreError> {
        let name = source.name();
        let reader: Box<dyn BufRead + Send> = match source {
            CaptureSource::Stdin => Box::new(BufReader::new(io::stdin())),
            CaptureSource::File(path) => Box::new(BufReader::new(File::open(path)?)),
        };
        Ok(Self::from_reader(name, reader))
    }

    pub fn from_reader<R>(source: String, reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx_cmd, rx_cmd) = unbounded::<Command>();
        let (tx_evt, rx_evt) = unbounded::<CaptureEvent>();
        let name = source.clone();

        std::thread::spawn(move || {
            info!("reading capture from {name}");
            if tx_evt.send(CaptureEvent::Opened(name.clone())).is_err() {
                return;
            }
            for (index, line) in reader.lines().enumerate() {
                let line_no = index + 1;
                if let Ok(Command::Close) = rx_cmd.try_recv() {
                    break;
                }
                let event = match line {
                    Ok(text) => match parse_frame_line(&text) {
                        Ok(Some(frame)) => CaptureEvent::Frame {
                            line: line_no,
                            frame,
                        },
                        Ok(None) => continue,
                        Err(e) => {
                            warn!("{name}:{line_no}: {e}");
                            CaptureEvent::Error {
                                line: line_no,
                                message: e.to_string(),
                            }
                        }
                    },
                    Err(e) => {
                        let _ = tx_evt.send(CaptureEvent::Error {
                            line: line_no,
                            message: e.to_string(),
                        });
                        break;
                    }
                };
                if tx_evt.send(event).is_err() {
                    return;
                }
            }
            info!("capture {name} closed");
            let _ = tx_evt.send(CaptureEvent::Closed);
        });

        Self {
            source,
            tx_cmd,
            rx_evt,
        }
    }

    /// Ask the reader thread to stop before its next line.
    pub fn close(&self) {
        let _ = self.tx_cmd.send(Command::Close);
    }

    pub fn events(&self) -> &Receiver<CaptureEvent> {
        &self.rx_evt
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Parse one capture line. Blank lines and `#` comments yield `None`.
pub fn parse_frame_line(line: &str) -> Result<Option<I2cFrame>, CoreError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}
