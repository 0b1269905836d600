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

//! SCR Common - Shared functionality for SCR components
//!
//! This crate provides the types shared by the trace engine and the `scr`
//! binary: source geometry, the raw record stream produced by an execution
//! host, the canonical trace document, and the logging setup.

/// Common types used throughout SCR including source ranges, raw records and traces
pub mod types;

/// Logging setup and utilities for consistent logging across SCR components
pub mod logging;

pub use types::*;
