//! Device configuration and board variants.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::endpoint::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_REORDER_WORD_SIZE};
use crate::error::FpgaError;
use crate::info::DeviceSettings;

/// XEM7360 setting holding the VADJ rail `n` voltage in mV.
pub fn vadj_voltage_key(n: u32) -> String {
    format!("XEM7360_VADJ{}_VOLTAGE", n)
}

/// XEM7360 setting packing a 2-bit mode per VADJ rail, rail 1 lowest.
pub const VADJ_MODE_KEY: &str = "XEM7360_VADJ_MODE";

const VADJ_SETTINGS_URL: &str = "https://docs.opalkelly.com/xem7360/device-settings/";

/// Supported boards. Variants differ only in data, see [`BoardConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoardModel {
    #[serde(rename = "XEM7310-A75")]
    Xem7310A75,
    #[serde(rename = "XEM7310-A200")]
    Xem7310A200,
    #[serde(rename = "XEM7360-K160T")]
    Xem7360K160T,
}

impl BoardModel {
    pub const ALL: [BoardModel; 3] = [
        BoardModel::Xem7310A75,
        BoardModel::Xem7310A200,
        BoardModel::Xem7360K160T,
    ];

    /// Product name as reported by the device.
    pub fn product_name(self) -> &'static str {
        match self {
            BoardModel::Xem7310A75 => "XEM7310-A75",
            BoardModel::Xem7310A200 => "XEM7310-A200",
            BoardModel::Xem7360K160T => "XEM7360-K160T",
        }
    }

    pub fn from_product_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.product_name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn led_count(self) -> u32 {
        match self {
            BoardModel::Xem7310A75 | BoardModel::Xem7310A200 => 8,
            BoardModel::Xem7360K160T => 4,
        }
    }

    /// File name of the board self-test bitstream.
    pub fn boardtest_bitstream(self) -> &'static str {
        match self {
            BoardModel::Xem7310A75 => "A75_boardtest.bit",
            BoardModel::Xem7310A200 => "A200_boardtest.bit",
            BoardModel::Xem7360K160T => "K160T_boardtest.bit",
        }
    }
}

impl fmt::Display for BoardModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.product_name())
    }
}

impl FromStr for BoardModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_product_name(s).ok_or_else(|| {
            let known: Vec<_> = Self::ALL.iter().map(|m| m.product_name()).collect();
            format!("unknown board '{}' (expected one of {})", s, known.join(", "))
        })
    }
}

/// Per-board parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardConfig {
    pub model: BoardModel,
    pub led_count: u32,
    /// Wire-in that drives the user LEDs.
    pub led_address: u8,
}

impl BoardConfig {
    pub const DEFAULT_LED_ADDRESS: u8 = 0x00;

    pub fn for_model(model: BoardModel) -> Self {
        Self {
            model,
            led_count: model.led_count(),
            led_address: Self::DEFAULT_LED_ADDRESS,
        }
    }

    /// Mask covering every LED bit.
    pub fn led_mask(&self) -> u32 {
        if self.led_count >= 32 {
            u32::MAX
        } else {
            (1u32 << self.led_count) - 1
        }
    }

    /// Check board-stored settings, logging what is found. Returns one
    /// message per problem.
    pub fn check_settings(&self, settings: &DeviceSettings) -> Vec<String> {
        match self.model {
            BoardModel::Xem7360K160T => check_vadj(settings),
            BoardModel::Xem7310A75 | BoardModel::Xem7310A200 => Vec::new(),
        }
    }
}

fn check_vadj(settings: &DeviceSettings) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut volts = [None; 3];
    for (n, slot) in (1..=3).zip(volts.iter_mut()) {
        let key = vadj_voltage_key(n);
        *slot = settings.get_int(&key);
        if slot.is_none() {
            warnings.push(format!("device setting {} is missing", key));
        }
    }
    let show = |v: Option<u32>| v.map_or_else(|| "?".to_string(), |mv| mv.to_string());
    info!(
        bank12_mv = %show(volts[1]),
        bank15_mv = %show(volts[0]),
        bank16_mv = %show(volts[0]),
        bank32_mv = %show(volts[2]),
        "Check the I/O voltage settings"
    );

    match settings.get_int(VADJ_MODE_KEY) {
        Some(modes) => {
            for n in 1..=3u32 {
                let mode = (modes >> (2 * (n - 1))) & 0b11;
                if mode < 2 {
                    warnings.push(format!(
                        "VADJ{} will be set to 120 mV (mode {}), see {}",
                        n, mode, VADJ_SETTINGS_URL
                    ));
                }
            }
        }
        None => warnings.push(format!("device setting {} is missing", VADJ_MODE_KEY)),
    }

    for warning in &warnings {
        warn!("{}", warning);
    }
    warnings
}

/// Settings used when opening a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial number to open. Empty opens the first device found.
    pub serial: String,
    /// Bitstream to program after opening.
    pub bitstream: Option<PathBuf>,
    /// Expected board. Opening a different board fails.
    pub board: Option<BoardModel>,
    /// LED wire-in, overriding the board default.
    pub led_address: Option<u8>,
    /// Sleep between trigger polls.
    pub poll_interval_ms: u64,
    /// Reorder granularity for hex payloads, in bytes.
    pub reorder_word_size: usize,
    /// Default block size for block pipes. Unset uses the interface maximum.
    pub block_size: Option<usize>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: String::new(),
            bitstream: None,
            board: None,
            led_address: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            reorder_word_size: DEFAULT_REORDER_WORD_SIZE,
            block_size: None,
        }
    }
}

impl DeviceConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DeviceConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Check a bitstream path before handing it to the collaborator.
pub fn validate_bitstream(path: &Path) -> crate::error::Result<()> {
    let is_bit = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bit"));
    if !is_bit {
        return Err(FpgaError::Configuration {
            reason: format!("not a .bit file: {}", path.display()),
        });
    }
    if !path.is_file() {
        return Err(FpgaError::Configuration {
            reason: format!("bitstream not found: {}", path.display()),
        });
    }
    Ok(())
}
