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

use std::io::Write;

use scr_engine::{instrument, EngineConfig};
use tempfile::NamedTempFile;
use tracing::info;

#[test]
fn test_default_config() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");
    let config = EngineConfig::default();

    assert_eq!(config.probes.value, "_$l");
    assert_eq!(config.probes.pre_call, "_$i");
    assert_eq!(config.probes.post_call, "_$o");
    assert!(config.instrumentation.track_branches);
    assert!(config.instrumentation.track_function_entries);
}

#[test]
fn test_load_config_file() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[probes]\nvalue = \"__log\"\n\n[instrumentation]\ntrack_branches = false")
        .unwrap();

    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(config.probes.value, "__log");
    assert_eq!(config.probes.post_call, "_$o");
    assert!(!config.instrumentation.track_branches);

    let result = instrument("if (ok) { x = 1 }", &config).unwrap();
    assert_eq!(result.code, r#"if (__log("ok:1", ok)) { __log("x:2", x = 1) }"#);
}

#[test]
fn test_load_rejects_invalid_config() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[probes]\nvalue = \"not an identifier\"").unwrap();
    assert!(EngineConfig::load(file.path()).is_err());

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "probes = 3").unwrap();
    assert!(EngineConfig::load(file.path()).is_err());

    assert!(EngineConfig::load("/definitely/not/here.toml").is_err());
}
