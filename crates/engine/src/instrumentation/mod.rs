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

//! Source code instrumentation
//!
//! This module rewrites JavaScript source so that running it reports the
//! value of every tracked expression to three probe functions. The rewrite
//! only inserts text: the source is parsed, the insertions are collected as
//! offset-keyed modifications, and the modifications are applied back to
//! front, so everything between two insertions is preserved byte for byte.

pub mod ast;
pub mod codegen;
pub mod common;
pub mod lexer;
pub mod location;
pub mod modification;
pub mod parser;
pub mod strategy;

pub use common::LineIndex;
pub use location::{Location, LocationMap, ProbeKind};

use tracing::debug;

use crate::{EngineConfig, ParseError};

/// Instrumented source and the locations it reports on.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentedSource {
    /// Source text with probe calls inserted.
    pub code: String,
    /// Every tracked location by id.
    pub locations: LocationMap,
}

/// Instruments a script.
///
/// Fails with a [`ParseError`] when the source is not valid JavaScript or
/// uses syntax outside the supported subset; callers are expected to run the
/// unmodified source with tracing disabled in that case.
pub fn instrument(source: &str, config: &EngineConfig) -> Result<InstrumentedSource, ParseError> {
    let lines = LineIndex::new(source);
    let program = parser::parse_program(&lines)?;
    let (modifications, locations) = strategy::collect_modifications(&program, &lines, config)?;
    let code = modifications.modify_source(source);
    debug!(
        statements = program.body.len(),
        locations = locations.len(),
        insertions = modifications.len(),
        "Instrumented source"
    );
    Ok(InstrumentedSource { code, locations })
}
