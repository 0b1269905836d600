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

//! Gutter and hover model for the editor.

use std::collections::{BTreeMap, BTreeSet};

use scr_common::{label_of, Position, TraceEntry};
use serde::Serialize;
use tracing::{debug, error};

use crate::{EngineError, TraceHelper};

/// Decoration of one editor row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GutterRow {
    /// Zero-based editor row.
    pub row: usize,
    /// Highest hit count of a call site or function entry starting on the row.
    pub count: usize,
    /// Labels of those locations, in stack order.
    pub labels: Vec<String>,
}

/// Rows whose decoration changed after a trace replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GutterUpdate {
    /// Rows that lost their decoration.
    pub removed: Vec<usize>,
    /// Rows that gained one.
    pub added: Vec<usize>,
}

/// What the editor shows for the current trace.
#[derive(Debug, Default)]
pub struct TraceView {
    /// Helper of the current trace
    helper: Option<TraceHelper>,
    /// Decorated rows
    rows: BTreeMap<usize, GutterRow>,
    /// `label = value` summaries by one-based line
    line_contents: BTreeMap<usize, Vec<String>>,
    /// Expression entries for hover lookups
    value_ranges: Vec<TraceEntry>,
    /// A run is in flight
    processing: bool,
}

impl TraceView {
    /// Create a new empty view
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the view as waiting for a new trace.
    pub fn begin_processing(&mut self) {
        self.processing = true;
    }

    /// Whether a run is in flight.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// The gutter should be greyed out: no run is in flight and the last one
    /// produced no usable trace.
    pub fn is_invalid(&self) -> bool {
        !self.processing && !self.helper.as_ref().is_some_and(TraceHelper::is_valid)
    }

    /// Replaces the trace shown by the view.
    ///
    /// Calling this without a helper is a wiring bug and fails with
    /// [`EngineError::MissingTraceHelper`].
    pub fn on_trace_changed(
        &mut self,
        helper: Option<TraceHelper>,
    ) -> Result<GutterUpdate, EngineError> {
        let Some(helper) = helper else {
            error!("on_trace_changed called without a trace helper");
            return Err(EngineError::MissingTraceHelper);
        };

        let mut rows: BTreeMap<usize, GutterRow> = BTreeMap::new();
        for block in helper.get_stack_block_counts() {
            let row = rows.entry(block.range.start.row).or_insert_with(|| GutterRow {
                row: block.range.start.row,
                count: 0,
                labels: Vec::new(),
            });
            row.count = row.count.max(block.count);
            row.labels.push(block.text);
        }

        let previous: BTreeSet<usize> = self.rows.keys().copied().collect();
        let current: BTreeSet<usize> = rows.keys().copied().collect();
        let update = GutterUpdate {
            removed: previous.difference(&current).copied().collect(),
            added: current.difference(&previous).copied().collect(),
        };

        let mut line_contents: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        if helper.is_valid() {
            for value in helper.get_values() {
                line_contents
                    .entry(value.range.start.row + 1)
                    .or_default()
                    .push(format!("{} = {}", label_of(&value.id), value.value));
            }
        }

        self.value_ranges = helper.get_execution_trace().into_iter().cloned().collect();
        self.rows = rows;
        self.line_contents = line_contents;
        self.helper = Some(helper);
        self.processing = false;

        debug!(
            rows = self.rows.len(),
            lines = self.line_contents.len(),
            added = update.added.len(),
            removed = update.removed.len(),
            "Trace view updated"
        );
        Ok(update)
    }

    /// The helper of the current trace.
    pub fn helper(&self) -> Option<&TraceHelper> {
        self.helper.as_ref()
    }

    /// Decorated rows, in row order.
    pub fn rows(&self) -> impl Iterator<Item = &GutterRow> {
        self.rows.values()
    }

    /// Decoration of a zero-based row.
    pub fn row(&self, row: usize) -> Option<&GutterRow> {
        self.rows.get(&row)
    }

    /// Value summaries of a one-based line.
    pub fn line_contents(&self, line_number: usize) -> &[String] {
        self.line_contents.get(&line_number).map(Vec::as_slice).unwrap_or_default()
    }

    /// Value summaries of a one-based line as gutter text.
    pub fn gutter_text(&self, line_number: usize) -> String {
        self.line_contents(line_number)
            .iter()
            .map(|content| format!(" [ {content} ] "))
            .collect()
    }

    /// Expression entries of the current trace, in runtime order.
    pub fn value_ranges(&self) -> &[TraceEntry] {
        &self.value_ranges
    }

    /// The entry to show when hovering a position.
    pub fn hover(&self, position: &Position) -> Option<&TraceEntry> {
        TraceHelper::get_match_at_position(&self.value_ranges, position)
    }
}

#[cfg(test)]
mod tests {
    use scr_common::{CallMarker, Range, RawRecord, RunResult, TraceKind};
    use serde_json::json;

    use super::*;

    fn record(id: &str, kind: TraceKind, range: Range, value: serde_json::Value) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            kind: kind.as_str().to_string(),
            range: Some(range),
            value,
            is_callback: false,
            marker: None,
        }
    }

    fn call(id: &str, row: usize) -> Vec<RawRecord> {
        let range = Range::from_coords(row, 0, row, 6);
        let mut enter = record(id, TraceKind::CallExpression, range, json!(null));
        enter.marker = Some(CallMarker::Enter);
        let mut exit = record(id, TraceKind::CallExpression, range, json!(1));
        exit.marker = Some(CallMarker::Exit);
        vec![enter, exit]
    }

    #[test]
    fn test_missing_helper_is_an_error() {
        let mut view = TraceView::new();
        assert!(matches!(view.on_trace_changed(None), Err(EngineError::MissingTraceHelper)));
    }

    #[test]
    fn test_rows_and_line_contents() {
        let mut records = call("f:1", 0);
        records.extend(call("g:2", 2));
        records.extend(call("g:2", 2));
        records.push(record(
            "x:3",
            TraceKind::VariableDeclarator,
            Range::from_coords(1, 6, 1, 11),
            json!(5),
        ));

        let mut view = TraceView::new();
        view.begin_processing();
        assert!(!view.is_invalid());

        let update = view.on_trace_changed(Some(TraceHelper::from_run(RunResult {
            records,
            ..Default::default()
        })));
        let update = update.unwrap();
        assert_eq!(update.added, vec![0, 2]);
        assert!(update.removed.is_empty());
        assert_eq!(view.row(2).unwrap().count, 4);
        assert_eq!(view.row(0).unwrap().labels, vec!["f"]);
        assert_eq!(view.line_contents(2), ["x = 5".to_string()]);
        assert_eq!(view.gutter_text(2), " [ x = 5 ] ");
        assert!(view.line_contents(1).is_empty());
        assert!(!view.is_processing());
        assert!(!view.is_invalid());

        let hovered = view.hover(&Position::new(1, 8)).unwrap();
        assert_eq!(hovered.id, "x:3");

        // the next run only calls g
        let update = view
            .on_trace_changed(Some(TraceHelper::from_run(RunResult {
                records: call("g:2", 2),
                ..Default::default()
            })))
            .unwrap();
        assert_eq!(update, GutterUpdate { removed: vec![0], added: vec![] });
        assert_eq!(view.rows().count(), 1);
    }

    #[test]
    fn test_failed_run_marks_view_invalid() {
        let mut view = TraceView::new();
        let helper = TraceHelper::from_run(RunResult {
            records: call("f:1", 0),
            error: Some("ReferenceError".to_string()),
            description: None,
        });
        let update = view.on_trace_changed(Some(helper)).unwrap();
        assert!(update.added.is_empty());
        assert!(view.is_invalid());
        assert!(view.value_ranges().is_empty());
    }
}
