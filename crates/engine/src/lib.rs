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

//! SCR Engine - instrumentation and trace queries
//!
//! The engine turns a script into an instrumented script, folds the records an
//! execution host sends back into a [`scr_common::Trace`], and answers the
//! position, line and branch queries of the editor front end. It also keeps
//! the pinned call hierarchy that survives across runs.
//!
//! ```text
//! source ─► instrument ─► host runs it ─► RunResult ─► make_trace ─► TraceHelper
//!                                                                   ├─► TraceView
//!                                                                   └─► CallGraph
//! ```

pub mod callgraph;
pub use callgraph::*;

pub mod config;
pub use config::*;

pub mod error;
pub use error::*;

pub mod instrumentation;
pub use instrumentation::{instrument, InstrumentedSource, Location, LocationMap, ProbeKind};

pub mod query;
pub use query::*;

pub mod service;
pub use service::*;

pub mod trace;
pub use trace::*;

pub mod view;
pub use view::*;
