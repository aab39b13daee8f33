//! User-facing settings and result formatting.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analyzer::OutputEvent;
use crate::error::SettingsError;

pub const I2C_ADDRESS_SETTING: &str = "I2C Address";
pub const ADDRESS_FILTER_SETTING: &str = "Address Filter";

/// Bus address of the display controller, selected by the SA0 pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceAddress {
    #[default]
    X3C,
    X3D,
}

impl DeviceAddress {
    pub const CHOICES: [&'static str; 2] = ["0x3C", "0x3D"];

    pub fn value(self) -> u8 {
        match self {
            DeviceAddress::X3C => 0x3c,
            DeviceAddress::X3D => 0x3d,
        }
    }

    pub fn choice(self) -> &'static str {
        match self {
            DeviceAddress::X3C => Self::CHOICES[0],
            DeviceAddress::X3D => Self::CHOICES[1],
        }
    }
}

impl FromStr for DeviceAddress {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0x3C" => Ok(DeviceAddress::X3C),
            "0x3D" => Ok(DeviceAddress::X3D),
            _ => Err(SettingsError::UnknownChoice {
                setting: I2C_ADDRESS_SETTING.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = SettingsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceAddress> for String {
    fn from(address: DeviceAddress) -> Self {
        address.choice().to_string()
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.choice())
    }
}

/// What the analyzer does with the configured device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressPolicy {
    /// Remember the address; decode traffic to every device.
    #[default]
    Record,
    /// Drop transactions addressed to any other device.
    Filter,
}

impl AddressPolicy {
    pub const CHOICES: [&'static str; 2] = ["off", "on"];
}

impl FromStr for AddressPolicy {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(AddressPolicy::Record),
            "on" => Ok(AddressPolicy::Filter),
            _ => Err(SettingsError::UnknownChoice {
                setting: ADDRESS_FILTER_SETTING.to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SettingSpec {
    Choices { choices: Vec<String> },
}

/// Settings a host may present to the user before decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub settings: BTreeMap<String, SettingSpec>,
}

impl Capabilities {
    pub fn ssd1306() -> Self {
        let choices = |c: &[&str]| SettingSpec::Choices {
            choices: c.iter().map(|s| s.to_string()).collect(),
        };
        let mut settings = BTreeMap::new();
        settings.insert(
            I2C_ADDRESS_SETTING.to_string(),
            choices(&DeviceAddress::CHOICES),
        );
        settings.insert(
            ADDRESS_FILTER_SETTING.to_string(),
            choices(&AddressPolicy::CHOICES),
        );
        Self { settings }
    }
}

/// Label template for an output event, e.g. `{{data.command}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFormat {
    pub format: String,
}

impl Default for ResultFormat {
    fn default() -> Self {
        Self {
            format: "{{data.command}}".to_string(),
        }
    }
}

impl ResultFormat {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    /// Expand `{{...}}` placeholders. Unknown placeholders are left as written.
    pub fn render(&self, event: &OutputEvent) -> String {
        let mut out = String::with_capacity(self.format.len());
        let mut rest = self.format.as_str();
        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            match after.find("}}") {
                Some(close) => {
                    let key = after[..close].trim();
                    match event.field(key) {
                        Some(value) => out.push_str(&value),
                        None => out.push_str(&rest[open..open + 2 + close + 2]),
                    }
                    rest = &after[close + 2..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultTypes {
    pub transaction: ResultFormat,
}
