use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Result, TrainError};

/// Device selection as given on the command line: either a device count or a textual
/// spec that still needs parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceArg {
    Index(usize),
    Text(String),
}

impl FromStr for DeviceArg {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().parse() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Text(s.to_owned()),
        })
    }
}

/// Parsed device selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpec {
    /// Let the backend pick.
    Default,
    /// Use this many devices.
    Count(usize),
    /// A backend specific name, eg. `cpu` or `auto`.
    Named(String),
    /// Exactly these device indices.
    Indices(Vec<usize>),
}

impl DeviceSpec {
    /// Accepts an integer as is. Text has to be a JSON string or a JSON list of
    /// non-negative integers.
    pub fn resolve(arg: Option<DeviceArg>) -> Result<Self> {
        let text = match arg {
            None => return Ok(Self::Default),
            Some(DeviceArg::Index(count)) => return Ok(Self::Count(count)),
            Some(DeviceArg::Text(text)) => text,
        };

        let invalid = || TrainError::InvalidDevice(text.clone());
        match serde_json::from_str::<Value>(&text).map_err(|_| invalid())? {
            Value::String(name) => Ok(Self::Named(name)),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_u64().map(|i| i as usize).ok_or_else(invalid))
                .collect::<Result<Vec<_>>>()
                .map(Self::Indices),
            _ => Err(invalid()),
        }
    }

    /// First device index this spec refers to, if any.
    pub fn primary_index(&self) -> Option<usize> {
        match self {
            Self::Indices(indices) => indices.first().copied(),
            _ => None,
        }
    }

    /// Nr. of devices requested.
    pub fn device_count(&self) -> usize {
        match self {
            Self::Default | Self::Named(_) => 1,
            Self::Count(count) => *count,
            Self::Indices(indices) => indices.len(),
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Count(count) => write!(f, "{count} device(s)"),
            Self::Named(name) => f.write_str(name),
            Self::Indices(indices) => write!(f, "{indices:?}"),
        }
    }
}
