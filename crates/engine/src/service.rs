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

//! Run lifecycle.
//!
//! The service instruments source for a run, turns the host's result into a
//! trace and publishes it. Subscribers receive whole snapshots through a
//! `watch` channel, so a reader never observes a half-built trace.

use std::sync::Arc;

use scr_common::{RunOutcome, RunResult, Trace};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{instrument, make_trace, EngineConfig, InstrumentedSource, ParseError, TraceHelper};

/// A published trace.
#[derive(Debug, Clone)]
pub struct TraceSnapshot {
    /// The trace of the run.
    pub trace: Arc<Trace>,
    /// What the host reported about the run.
    pub outcome: RunOutcome,
    /// Increases by one per completed run.
    pub generation: u64,
}

impl TraceSnapshot {
    /// A fresh query helper over this snapshot.
    pub fn helper(&self) -> TraceHelper {
        TraceHelper::new(Arc::clone(&self.trace), self.outcome.clone())
    }
}

/// What to hand to the execution host.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedRun {
    /// Instrumented source; the host reports records for its locations.
    Instrumented(InstrumentedSource),
    /// The source did not parse; run it as is, without tracing.
    Untraced {
        /// The unmodified source.
        code: String,
        /// Why instrumentation failed.
        error: ParseError,
    },
}

impl PreparedRun {
    /// The code to execute.
    pub fn code(&self) -> &str {
        match self {
            Self::Instrumented(source) => &source.code,
            Self::Untraced { code, .. } => code,
        }
    }

    /// Whether the run will produce a trace.
    pub fn is_traced(&self) -> bool {
        matches!(self, Self::Instrumented(_))
    }
}

/// Owns the current trace and notifies subscribers when it is replaced.
#[derive(Debug)]
pub struct TraceService {
    /// Configuration used for instrumentation
    config: EngineConfig,
    /// The latest snapshot, `None` before the first run completes
    sender: watch::Sender<Option<TraceSnapshot>>,
    /// Generation of the latest snapshot
    generation: u64,
}

impl TraceService {
    /// Creates a service with no trace yet.
    pub fn new(config: EngineConfig) -> Self {
        let (sender, _) = watch::channel(None);
        Self { config, sender, generation: 0 }
    }

    /// The instrumentation configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Instruments `source`, falling back to the unmodified source when it
    /// does not parse.
    pub fn prepare_run(&self, source: &str) -> PreparedRun {
        match instrument(source, &self.config) {
            Ok(instrumented) => {
                info!(locations = instrumented.locations.len(), "Prepared traced run");
                PreparedRun::Instrumented(instrumented)
            }
            Err(error) => {
                warn!("Running without tracing: {error}");
                PreparedRun::Untraced { code: source.to_string(), error }
            }
        }
    }

    /// Builds the trace of a finished run and publishes it.
    pub fn complete_run(&mut self, result: RunResult) -> TraceSnapshot {
        let outcome = result.outcome();
        let trace = Arc::new(make_trace(result.records));
        self.generation += 1;

        if outcome.is_error() {
            warn!(generation = self.generation, error = %outcome.error, "Run failed");
        } else {
            info!(
                generation = self.generation,
                entries = trace.data.len(),
                executed = trace.execution.len(),
                "Run completed"
            );
        }

        let snapshot = TraceSnapshot { trace, outcome, generation: self.generation };
        self.sender.send_replace(Some(snapshot.clone()));
        snapshot
    }

    /// Subscribes to trace replacements.
    pub fn subscribe(&self) -> watch::Receiver<Option<TraceSnapshot>> {
        self.sender.subscribe()
    }

    /// The latest snapshot.
    pub fn current(&self) -> Option<TraceSnapshot> {
        self.sender.borrow().clone()
    }
}
