//! Machine configuration: video standard, chip options and ROM images.
//!
//! Everything except the ROM images round-trips through TOML:
//!
//! ```toml
//! standard = "pal"
//! via = true
//!
//! [cpu]
//! ane_magic = 0xEF
//!
//! [rtc]
//! model = "ds1302"
//! halted = false
//! ```

use std::fmt;

use dallas_ds1302::{RtcConfig, RtcError};
use mos_6502::CpuConfig;
use mos_cia_6526::CiaConfig;
use mos_vic_ii::VideoStandard;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const KERNAL_SIZE: usize = 8192;
pub const BASIC_SIZE: usize = 8192;
pub const CHARGEN_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid machine configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot write machine configuration: {0}")]
    Write(#[from] toml::ser::Error),
    #[error("RTC left out: {0}")]
    Rtc(#[from] RtcError),
    #[error("{name} ROM is {actual} bytes, expected {expected}; running without it")]
    RomSize {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("TOD frequency of 0 Hz ignored; using {fallback} Hz")]
    TodRate { fallback: u32 },
}

/// ROM images. Any of them may be missing, in which case the RAM
/// underneath shows through.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Roms {
    pub kernal: Option<Vec<u8>>,
    pub basic: Option<Vec<u8>>,
    pub chargen: Option<Vec<u8>>,
}

impl Roms {
    /// Drop images of the wrong size, reporting each one.
    #[must_use]
    pub fn validated(self, errors: &mut Vec<ConfigError>) -> Self {
        let mut check = |name: &'static str, expected: usize, rom: Option<Vec<u8>>| {
            let rom = rom?;
            if rom.len() == expected {
                Some(rom)
            } else {
                errors.push(ConfigError::RomSize {
                    name,
                    expected,
                    actual: rom.len(),
                });
                None
            }
        };
        Self {
            kernal: check("Kernal", KERNAL_SIZE, self.kernal),
            basic: check("BASIC", BASIC_SIZE, self.basic),
            chargen: check("character", CHARGEN_SIZE, self.chargen),
        }
    }
}

impl fmt::Debug for Roms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = |rom: &Option<Vec<u8>>| rom.as_ref().map(Vec::len);
        f.debug_struct("Roms")
            .field("kernal", &size(&self.kernal))
            .field("basic", &size(&self.basic))
            .field("chargen", &size(&self.chargen))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub standard: VideoStandard,
    pub cpu: CpuConfig,
    /// TOD input frequency. Follows the mains of the video standard when
    /// unset.
    pub tod_hz: Option<u32>,
    /// Clock chip at $DE00. Absent when unset.
    pub rtc: Option<RtcConfig>,
    /// Expansion VIA at $DF00.
    pub via: bool,
    #[serde(skip)]
    pub roms: Roms,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            standard: VideoStandard::Pal,
            cpu: CpuConfig::default(),
            tod_hz: None,
            rtc: None,
            via: false,
            roms: Roms::default(),
        }
    }
}

impl MachineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// CIA settings derived from the standard, with a zero TOD rate
    /// replaced by the mains frequency.
    pub(crate) fn cia(&self, errors: &mut Vec<ConfigError>) -> CiaConfig {
        let mains = self.standard.tod_hz();
        let tod_hz = match self.tod_hz {
            Some(0) => {
                errors.push(ConfigError::TodRate { fallback: mains });
                mains
            }
            Some(hz) => hz,
            None => mains,
        };
        CiaConfig {
            cpu_hz: self.standard.cpu_hz(),
            tod_hz,
        }
    }
}
