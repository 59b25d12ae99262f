use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use clap_num::maybe_hex;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use okfp_core::codec::{elements_to_hex, hex_to_elements, reorder_hex};
use okfp_core::endpoint::DEFAULT_REORDER_WORD_SIZE;
use okfp_core::{
    BistOptions, BoardModel, DeviceConfig, DeviceInfo, FpgaDevice, PipeElement, SimulatedPanel,
    bist,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "FrontPanel FPGA endpoint tool", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Device configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Expected board model, e.g. XEM7310-A75
    #[arg(long, global = true)]
    board: Option<BoardModel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the board and print its identity
    Info,
    /// Run the loop-back self test
    Bist {
        /// Pattern seed
        #[arg(long, value_parser = maybe_hex::<u32>, default_value = "0x12345678")]
        seed: u32,

        /// Bytes per pipe round trip
        #[arg(long, value_parser = maybe_hex::<usize>, default_value = "16")]
        payload_len: usize,

        /// Wire-in used for the reset pulse
        #[arg(long, value_parser = maybe_hex::<u8>, default_value = "0x00")]
        reset_address: u8,

        /// Per-trigger wait in milliseconds
        #[arg(long, default_value = "1000")]
        trigger_timeout_ms: u64,

        /// Directory of boardtest bitstreams to program first
        #[arg(long)]
        bitstream_dir: Option<PathBuf>,
    },
    /// Convert pipe payloads offline
    Convert {
        #[command(subcommand)]
        action: ConvertAction,
    },
    /// Manage configuration files
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConvertAction {
    /// Render numbers as concatenated big-endian element hex
    ToHex {
        #[arg(long = "type", value_enum, default_value = "u32")]
        element: ElementType,
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<String>,
    },
    /// Parse concatenated element hex into numbers
    FromHex {
        #[arg(long = "type", value_enum, default_value = "u32")]
        element: ElementType,
        hex: String,
    },
    /// Reverse bytes within each word of a hex string
    Reorder {
        #[arg(long, value_parser = maybe_hex::<usize>, default_value_t = DEFAULT_REORDER_WORD_SIZE)]
        word_size: usize,
        hex: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration
    Init {
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns false when the command ran but reported a failure.
fn run(args: Args) -> Result<bool> {
    match args.command {
        Command::Info => {
            let config = load_config(args.config.as_ref(), args.board)?;
            let device = FpgaDevice::open(panel_for(&config), config)?;
            print_info(device.device_info());
            if let Some(board) = device.board() {
                println!("LEDs: {} on wire-in 0x{:02X}", board.led_count, board.led_address);
            }
            for warning in device.validate() {
                println!("Warning: {}", warning);
            }
            device.close()?;
            Ok(true)
        }
        Command::Bist {
            seed,
            payload_len,
            reset_address,
            trigger_timeout_ms,
            bitstream_dir,
        } => {
            let config = load_config(args.config.as_ref(), args.board)?;
            let mut device = FpgaDevice::open(panel_for(&config), config)?;
            let options = BistOptions {
                seed,
                payload_len,
                reset_address,
                trigger_timeout: Duration::from_millis(trigger_timeout_ms),
                bitstream_dir,
                ..Default::default()
            };
            let report = bist::run(&mut device, &options)?;
            device.close()?;

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["Stage", "Passed", "Total", "Result"]);
            for result in report.results() {
                let verdict = if result.is_pass() {
                    Cell::new("PASS").fg(Color::Green)
                } else {
                    Cell::new("FAIL").fg(Color::Red)
                };
                table.add_row(vec![
                    Cell::new(result.name),
                    Cell::new(result.passed),
                    Cell::new(result.total),
                    verdict,
                ]);
            }
            println!("{table}");
            Ok(report.passed())
        }
        Command::Convert { action } => {
            convert(action)?;
            Ok(true)
        }
        Command::Config {
            action: ConfigAction::Init { path, force },
        } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let config = DeviceConfig {
                board: args.board,
                ..Default::default()
            };
            config
                .save_to_file(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Wrote default configuration to {}", path.display());
            Ok(true)
        }
    }
}

fn load_config(path: Option<&PathBuf>, board: Option<BoardModel>) -> Result<DeviceConfig> {
    let mut config = match path {
        Some(path) => DeviceConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DeviceConfig::default(),
    };
    if board.is_some() {
        config.board = board;
    }
    Ok(config)
}

/// In-process loop-back board standing in for the requested model.
fn panel_for(config: &DeviceConfig) -> SimulatedPanel {
    match config.board {
        Some(board) => SimulatedPanel::with_product(board.product_name()),
        None => SimulatedPanel::new(),
    }
}

fn print_info(info: &DeviceInfo) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Field", "Value"]);
    let rows = [
        ("Product", info.product_name.clone()),
        ("Serial", info.serial_number.clone()),
        ("Product ID", format!("0x{:04X}", info.product_id)),
        ("Interface", info.interface.to_string()),
        ("USB speed", info.usb_speed.to_string()),
        ("Wire width", info.wire_width.to_string()),
        ("Trigger width", info.trigger_width.to_string()),
        ("Pipe width", info.pipe_width.to_string()),
        (
            "Max block size",
            info.max_block_size()
                .map_or_else(|| "-".to_string(), |size| size.to_string()),
        ),
    ];
    for (field, value) in rows {
        table.add_row(vec![field.to_string(), value]);
    }
    println!("{table}");
}

fn convert(action: ConvertAction) -> Result<()> {
    match action {
        ConvertAction::ToHex { element, values } => {
            let hex = match element {
                ElementType::U8 => to_hex::<u8>(&values)?,
                ElementType::I8 => to_hex::<i8>(&values)?,
                ElementType::U16 => to_hex::<u16>(&values)?,
                ElementType::I16 => to_hex::<i16>(&values)?,
                ElementType::U32 => to_hex::<u32>(&values)?,
                ElementType::I32 => to_hex::<i32>(&values)?,
                ElementType::U64 => to_hex::<u64>(&values)?,
                ElementType::I64 => to_hex::<i64>(&values)?,
                ElementType::F32 => to_hex::<f32>(&values)?,
                ElementType::F64 => to_hex::<f64>(&values)?,
            };
            println!("{}", hex);
        }
        ConvertAction::FromHex { element, hex } => {
            let lines = match element {
                ElementType::U8 => from_hex::<u8>(&hex)?,
                ElementType::I8 => from_hex::<i8>(&hex)?,
                ElementType::U16 => from_hex::<u16>(&hex)?,
                ElementType::I16 => from_hex::<i16>(&hex)?,
                ElementType::U32 => from_hex::<u32>(&hex)?,
                ElementType::I32 => from_hex::<i32>(&hex)?,
                ElementType::U64 => from_hex::<u64>(&hex)?,
                ElementType::I64 => from_hex::<i64>(&hex)?,
                ElementType::F32 => from_hex::<f32>(&hex)?,
                ElementType::F64 => from_hex::<f64>(&hex)?,
            };
            for line in lines {
                println!("{}", line);
            }
        }
        ConvertAction::Reorder { word_size, hex } => {
            println!("{}", reorder_hex(&hex, word_size)?);
        }
    }
    Ok(())
}

fn to_hex<T>(values: &[String]) -> Result<String>
where
    T: PipeElement + FromStr,
    T::Err: Display,
{
    let parsed = values
        .iter()
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid value '{}': {}", v, e))
        })
        .collect::<Result<Vec<T>>>()?;
    Ok(elements_to_hex(&parsed))
}

fn from_hex<T: PipeElement + Display>(hex: &str) -> Result<Vec<String>> {
    Ok(hex_to_elements::<T>(hex)?
        .into_iter()
        .map(|v| v.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["okfp", "-v", "--board", "XEM7360-K160T", "info"]).unwrap();
        assert!(args.verbose);
        assert_eq!(args.board, Some(BoardModel::Xem7360K160T));
        assert!(matches!(args.command, Command::Info));

        assert!(Args::try_parse_from(["okfp", "--board", "XEM6010", "info"]).is_err());
    }

    #[test]
    fn test_numeric_args_accept_hex() {
        let args = Args::try_parse_from([
            "okfp",
            "bist",
            "--seed",
            "0xCAFE",
            "--payload-len",
            "0x20",
            "--bitstream-dir",
            "bits",
        ])
        .unwrap();
        match args.command {
            Command::Bist {
                seed,
                payload_len,
                bitstream_dir,
                ..
            } => {
                assert_eq!(seed, 0xCAFE);
                assert_eq!(payload_len, 32);
                assert_eq!(bitstream_dir, Some(PathBuf::from("bits")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_element_hex_helpers() {
        assert_eq!(to_hex::<f32>(&["0.1".into()]).unwrap(), "3DCCCCCD");
        assert_eq!(to_hex::<i16>(&["-1".into(), "2".into()]).unwrap(), "FFFF0002");
        assert!(to_hex::<u8>(&["300".into()]).is_err());
        assert_eq!(from_hex::<u16>("00010002").unwrap(), vec!["1", "2"]);
        assert!(from_hex::<u32>("0001").is_err());
    }

    #[test]
    fn test_board_override_picks_simulated_product() {
        let config = load_config(None, Some(BoardModel::Xem7310A200)).unwrap();
        let device = FpgaDevice::open(panel_for(&config), config).unwrap();
        assert_eq!(device.device_info().product_name, "XEM7310-A200");
        assert_eq!(device.board().map(|b| b.model), Some(BoardModel::Xem7310A200));
        device.close().unwrap();
    }

    #[test]
    fn test_config_init_writes_defaults() {
        let path = std::env::temp_dir().join(format!("okfp-cli-{}.toml", std::process::id()));
        std::fs::remove_file(&path).ok();
        let args = Args::try_parse_from([
            "okfp",
            "--board",
            "XEM7310-A75",
            "config",
            "init",
            path.to_str().unwrap(),
        ])
        .unwrap();
        assert!(run(args).unwrap());

        let loaded = DeviceConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.board, Some(BoardModel::Xem7310A75));

        // Refuses to clobber without --force.
        let again = Args::try_parse_from(["okfp", "config", "init", path.to_str().unwrap()]).unwrap();
        assert!(run(again).is_err());
        std::fs::remove_file(&path).ok();
    }
}
