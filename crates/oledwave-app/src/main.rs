use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use oledwave_core::{AppConfig, CaptureEvent, CaptureService, CaptureSource, LogStore};
use oledwave_decode::{
    AddressPolicy, Analyzer, AnalyzerStats, DeviceAddress, I2cFrame, OutputEvent, ResultFormat,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Decode SSD1306 command traffic from captured I2C bus frames.

Usage: oledwave-app [OPTIONS] [FILE]

Reads one JSON frame per line from FILE, or stdin when FILE is omitted.

Options:
  --address <0x3C|0x3D>  Display controller address
  --filter               Drop transactions to other devices
  --no-filter            Decode traffic to every device
  --json                 Print decoded transactions as JSON lines
  --hex                  Append payload bytes in hex
  --timestamps           Prefix each line with its start time
  --write <HEX>          Decode one write transaction given as hex
                         (address byte first), instead of reading a capture
  --save-config          Store the effective settings as the new defaults
  -h, --help             Show this help
";

#[derive(Debug, Default)]
struct Options {
    address: Option<DeviceAddress>,
    filter: Option<bool>,
    json: bool,
    hex: bool,
    timestamps: bool,
    save_config: bool,
    help: bool,
    writes: Vec<Vec<u8>>,
    input: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options> {
    let mut options = Options::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--address" => {
                let value = args.next().context("--address needs a value")?;
                options.address = Some(value.parse()?);
            }
            "--write" => {
                let value = args.next().context("--write needs a value")?;
                let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = hex::decode(&digits)
                    .with_context(|| format!("--write {value:?} is not hex"))?;
                if bytes.is_empty() {
                    bail!("--write needs at least the address byte");
                }
                options.writes.push(bytes);
            }
            "--filter" => options.filter = Some(true),
            "--no-filter" => options.filter = Some(false),
            "--json" => options.json = true,
            "--hex" => options.hex = true,
            "--timestamps" => options.timestamps = true,
            "--save-config" => options.save_config = true,
            "-h" | "--help" => options.help = true,
            flag if flag.starts_with('-') && flag != "-" => bail!("unknown option {flag}"),
            path => {
                if options.input.is_some() {
                    bail!("only one capture file may be given");
                }
                if path != "-" {
                    options.input = Some(PathBuf::from(path));
                }
            }
        }
    }
    Ok(options)
}

/// Frames for a write given as raw bytes: address byte, then payload.
fn write_frames(bytes: &[u8]) -> Vec<I2cFrame> {
    let mut frames = Vec::with_capacity(bytes.len() + 2);
    frames.push(I2cFrame::start(0.0));
    if let Some((&address, payload)) = bytes.split_first() {
        frames.push(I2cFrame::address(address));
        frames.extend(payload.iter().map(|&b| I2cFrame::data(b)));
    }
    frames.push(I2cFrame::stop(0.0));
    frames
}

struct Printer<W: Write> {
    out: W,
    store: LogStore,
    format: ResultFormat,
    json: bool,
    timestamps: bool,
    hex: bool,
}

impl<W: Write> Printer<W> {
    fn emit(&mut self, event: OutputEvent) -> Result<()> {
        if self.json {
            serde_json::to_writer(&mut self.out, &event)?;
            writeln!(self.out)?;
        }
        self.store.push(event);
        if !self.json {
            if let Some(entry) = self.store.last() {
                let line = self
                    .store
                    .render_entry(entry, self.timestamps, self.hex, &self.format);
                writeln!(self.out, "{line}")?;
            }
        }
        Ok(())
    }
}

fn log_stats(stats: &AnalyzerStats, errors: usize) {
    info!(
        "{} frames, {} transactions, {} decoded, {} reads dropped, {} filtered, {} without address",
        stats.frames,
        stats.transactions,
        stats.emitted,
        stats.reads_dropped,
        stats.filtered,
        stats.unaddressed
    );
    if stats.unknown_opcodes > 0 {
        warn!("{} commands with unknown opcodes", stats.unknown_opcodes);
    }
    if errors > 0 {
        warn!("{errors} capture lines could not be read");
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let options = parse_args(std::env::args().skip(1))?;
    if options.help {
        print!("{USAGE}");
        return Ok(());
    }

    let mut config = AppConfig::load().context("loading configuration")?;
    if let Some(address) = options.address {
        config.i2c_address = address;
    }
    if let Some(on) = options.filter {
        config.address_policy = if on {
            AddressPolicy::Filter
        } else {
            AddressPolicy::Record
        };
    }
    config.show_hex |= options.hex;
    config.show_timestamp |= options.timestamps;
    if options.save_config {
        let path = config.save().context("saving configuration")?;
        info!("configuration saved to {}", path.display());
    }

    let mut analyzer = Analyzer::new();
    let result_types = analyzer
        .set_settings(&config.analyzer_settings())
        .context("applying analyzer settings")?;
    let format = if config.result_format.is_empty() {
        result_types.transaction
    } else {
        config.result_format()
    };
    debug!("result format {:?}", format.format);

    let mut printer = Printer {
        out: io::stdout().lock(),
        store: LogStore::new(config.history_size),
        format,
        json: options.json,
        timestamps: config.show_timestamp,
        hex: config.show_hex,
    };

    if !options.writes.is_empty() {
        for bytes in &options.writes {
            let events: Vec<OutputEvent> = write_frames(bytes)
                .iter()
                .filter_map(|frame| analyzer.decode(frame))
                .collect();
            if events.is_empty() {
                warn!("{} decoded to nothing", hex::encode_upper(bytes));
            }
            for event in events {
                printer.emit(event)?;
            }
        }
        log_stats(&analyzer.finish(), 0);
        return Ok(());
    }

    let source = match options.input {
        Some(path) => CaptureSource::File(path),
        None => CaptureSource::Stdin,
    };
    let service = CaptureService::open(source.clone())
        .with_context(|| format!("opening capture {}", source.name()))?;

    let mut errors = 0;
    for event in service.events().iter() {
        match event {
            CaptureEvent::Opened(name) => debug!("decoding {name}"),
            CaptureEvent::Frame { frame, .. } => {
                if let Some(decoded) = analyzer.decode(&frame) {
                    printer.emit(decoded)?;
                }
            }
            CaptureEvent::Error { line, message } => {
                errors += 1;
                debug!("{}:{line} skipped: {message}", service.source());
            }
            CaptureEvent::Closed => break,
        }
    }
    printer.out.flush()?;

    log_stats(&analyzer.finish(), errors);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        let options =
            parse_args(args(&["--address", "0x3D", "--json", "capture.jsonl"])).unwrap();
        assert_eq!(options.address, Some(DeviceAddress::X3D));
        assert!(options.json);
        assert_eq!(options.input, Some(PathBuf::from("capture.jsonl")));
    }

    #[test]
    fn test_bad_address_fails_fast() {
        let err = parse_args(args(&["--address", "0x3E"])).unwrap_err();
        assert!(err.to_string().contains("0x3E"));
    }

    #[test]
    fn test_filter_flags() {
        assert_eq!(parse_args(args(&[])).unwrap().filter, None);
        assert_eq!(parse_args(args(&["--filter"])).unwrap().filter, Some(true));
        assert_eq!(parse_args(args(&["--no-filter"])).unwrap().filter, Some(false));
        let options = parse_args(args(&["--filter", "--no-filter"])).unwrap();
        assert_eq!(options.filter, Some(false));
    }

    #[test]
    fn test_write_option() {
        let options = parse_args(args(&["--write", "78 00 AF"])).unwrap();
        assert_eq!(options.writes, vec![vec![0x78, 0x00, 0xAF]]);
        assert!(parse_args(args(&["--write", "7"])).is_err());
        assert!(parse_args(args(&["--write", ""])).is_err());
    }

    #[test]
    fn test_write_frames_decode() {
        let mut analyzer = Analyzer::new();
        let events: Vec<OutputEvent> = write_frames(&[0x78, 0x00, 0xB3])
            .iter()
            .filter_map(|f| analyzer.decode(f))
            .collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data.command, "Set Page Start Address[3] (0xb3)");
    }

    #[test]
    fn test_printer_text_and_json() {
        let mut analyzer = Analyzer::new();
        let event = write_frames(&[0x78, 0x00, 0xAF])
            .iter()
            .find_map(|f| analyzer.decode(f))
            .unwrap();

        let mut printer = Printer {
            out: Vec::new(),
            store: LogStore::new(4),
            format: ResultFormat::default(),
            json: false,
            timestamps: false,
            hex: true,
        };
        printer.emit(event.clone()).unwrap();
        assert_eq!(
            String::from_utf8(printer.out).unwrap(),
            "W 0x3C Display On (0xaf) | 00 AF\n"
        );

        let mut printer = Printer {
            out: Vec::new(),
            store: LogStore::new(4),
            format: ResultFormat::default(),
            json: true,
            timestamps: false,
            hex: false,
        };
        printer.emit(event.clone()).unwrap();
        let text = String::from_utf8(printer.out).unwrap();
        let parsed: OutputEvent = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(parsed, event);
    }
}
