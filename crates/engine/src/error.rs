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

//! Error types of the trace engine.
//!
//! Lookups that find nothing are not errors: they return `None` or an empty
//! sequence. Only conditions a caller has to react to live here.

use scr_common::Position;
use thiserror::Error;

/// The source could not be parsed, so it cannot be instrumented.
///
/// Callers are expected to run the unmodified source with tracing disabled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at {position}")]
pub struct ParseError {
    /// What went wrong.
    pub message: String,
    /// Where it went wrong.
    pub position: Position,
    /// Byte offset of `position` in the source.
    pub offset: usize,
}

impl ParseError {
    /// Creates a new parse error.
    pub fn new(message: impl Into<String>, position: Position, offset: usize) -> Self {
        Self { message: message.into(), position, offset }
    }
}

/// Errors that can occur while driving the trace engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Instrumentation failed; the run should fall back to untraced execution.
    #[error("failed to instrument source: {0}")]
    Parse(#[from] ParseError),

    /// The execution host reported a runtime failure instead of a trace.
    #[error("run failed: {error}")]
    Run {
        /// Error message from the host.
        error: String,
        /// Longer description from the host.
        description: String,
    },

    /// The trace-changed handler was invoked without a trace helper. This is a
    /// wiring bug in the caller, not a data condition.
    #[error("trace changed handler called without a trace helper")]
    MissingTraceHelper,

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
