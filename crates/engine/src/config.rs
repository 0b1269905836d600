// SCR - Live Code Execution Visualizer
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine configuration
//!
//! The configuration is an explicit value constructed once by the embedding
//! application and passed into every instrumentation call. It can be loaded
//! from a TOML file; missing fields take their defaults.

use std::{fs, path::Path};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::EngineError;

/// Default name of the value-capture probe.
pub const DEFAULT_VALUE_PROBE: &str = "_$l";
/// Default name of the pre-call marker probe.
pub const DEFAULT_PRE_CALL_PROBE: &str = "_$i";
/// Default name of the post-call marker probe.
pub const DEFAULT_POST_CALL_PROBE: &str = "_$o";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Names of the functions the instrumented code calls
    pub probes: ProbeNames,
    /// What gets instrumented
    pub instrumentation: InstrumentationConfig,
}

/// Names of the three probe functions.
///
/// The execution host defines functions with these names before running the
/// instrumented code. Every probe returns its last argument unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeNames {
    /// `value(id, v)`: records `v` for location `id`, returns `v`
    pub value: String,
    /// `pre_call(id)`: marks entry into the call at `id`
    pub pre_call: String,
    /// `post_call(id, v)`: marks exit from the call at `id` with result `v`, returns `v`
    pub post_call: String,
}

impl Default for ProbeNames {
    fn default() -> Self {
        Self {
            value: DEFAULT_VALUE_PROBE.to_string(),
            pre_call: DEFAULT_PRE_CALL_PROBE.to_string(),
            post_call: DEFAULT_POST_CALL_PROBE.to_string(),
        }
    }
}

/// Instrumentation switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Capture plain variable reads
    pub track_identifiers: bool,
    /// Emit branch markers for `if`/loop tests and `switch` discriminants
    pub track_branches: bool,
    /// Emit function entry and parameter records
    pub track_function_entries: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self { track_identifiers: true, track_branches: true, track_function_entries: true }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;

        let config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;
        config.validate()?;

        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Serialize the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).wrap_err("Failed to serialize config")
    }

    /// Checks that the probe names can be called from JavaScript and do not
    /// collide with each other.
    pub fn validate(&self) -> Result<(), EngineError> {
        let ProbeNames { value, pre_call, post_call } = &self.probes;
        for name in [value, pre_call, post_call] {
            if !is_js_identifier(name) {
                return Err(EngineError::InvalidConfig(format!(
                    "probe name {name:?} is not a valid identifier"
                )));
            }
        }
        if value == pre_call || value == post_call || pre_call == post_call {
            return Err(EngineError::InvalidConfig("probe names must be distinct".to_string()));
        }
        Ok(())
    }
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
