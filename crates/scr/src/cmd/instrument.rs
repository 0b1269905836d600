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

//! Instrument command - prints the code a host should run

use std::{fs, path::Path};

use eyre::{Result, WrapErr};
use scr_engine::{EngineConfig, PreparedRun, TraceService};

/// Instruments `file` and prints the code a host should run.
///
/// Sources outside the supported subset are printed unchanged and no
/// location map is written.
pub fn instrument_file(file: &Path, locations: Option<&Path>, config: &EngineConfig) -> Result<()> {
    let source = fs::read_to_string(file)
        .wrap_err_with(|| format!("failed to read script {}", file.display()))?;

    let service = TraceService::new(config.clone());
    match service.prepare_run(&source) {
        PreparedRun::Instrumented(instrumented) => {
            tracing::info!(
                "Instrumented {} ({} locations)",
                file.display(),
                instrumented.locations.len()
            );
            if let Some(out) = locations {
                let json = serde_json::to_string_pretty(&instrumented.locations)?;
                fs::write(out, json)
                    .wrap_err_with(|| format!("failed to write {}", out.display()))?;
            }
            print!("{}", instrumented.code);
        }
        PreparedRun::Untraced { code, .. } => {
            if locations.is_some() {
                tracing::warn!("No locations written for an untraced script");
            }
            print!("{code}");
        }
    }
    Ok(())
}
