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

//! Folding of a raw record stream into a [`Trace`].
//!
//! The host sends one record per probe invocation, so a location that runs in
//! a loop shows up many times. The builder keeps one canonical entry per id
//! and derives the ordered indices the queries work on.

use indexmap::IndexMap;
use scr_common::{RawRecord, Trace, TraceCategory, TraceEntry, TraceKind};
use tracing::{debug, warn};

/// Builds a trace one record at a time.
#[derive(Debug, Default)]
pub struct TraceBuilder {
    /// The trace under construction
    trace: Trace,
    /// Index into `trace.values` of the latest snapshot for each write location
    value_slots: IndexMap<String, usize>,
    /// Records without a range
    missing_range: usize,
    /// Records whose type is not a known kind
    unknown_kind: usize,
}

impl TraceBuilder {
    /// Create a new trace builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one record into the trace. Malformed records are counted and
    /// skipped.
    pub fn push(&mut self, record: RawRecord) {
        let RawRecord { id, kind, range, value, is_callback, marker } = record;

        let Some(range) = range else {
            self.missing_range += 1;
            return;
        };
        let kind = match kind.parse::<TraceKind>() {
            Ok(kind) => kind,
            Err(err) => {
                debug!(id = %id, "Skipping record: {err}");
                self.unknown_kind += 1;
                return;
            }
        };

        let trace = &mut self.trace;
        let first_sight = !trace.data.contains_key(&id);

        // The first occurrence fixes kind, range and callback flag; later
        // occurrences only refresh the value.
        let entry = trace
            .data
            .entry(id.clone())
            .and_modify(|entry| entry.value = value.clone())
            .or_insert_with(|| TraceEntry {
                id: id.clone(),
                kind,
                range,
                value: value.clone(),
                is_callback,
                marker: None,
            });
        let occurrence = TraceEntry { value, marker, ..entry.clone() };
        let kind = occurrence.kind;

        *trace.hits.entry(id.clone()).or_default() += 1;

        if first_sight {
            if kind.is_in(TraceCategory::Stack) {
                trace.stack.push(id.clone());
            }
            if kind.is_in(TraceCategory::Declaration) {
                trace.identifiers.push(occurrence.clone());
            }
        }

        if kind.is_in(TraceCategory::Write) {
            trace.variables.push(occurrence.clone());
            match self.value_slots.get(&id) {
                Some(&slot) => trace.values[slot] = occurrence.clone(),
                None => {
                    self.value_slots.insert(id.clone(), trace.values.len());
                    trace.values.push(occurrence.clone());
                }
            }
        }

        trace.execution.push(id);
        trace.timeline.push(occurrence);
    }

    /// Finish the trace
    pub fn finish(self) -> Trace {
        if self.missing_range > 0 || self.unknown_kind > 0 {
            warn!(
                missing_range = self.missing_range,
                unknown_kind = self.unknown_kind,
                "Dropped malformed trace records"
            );
        }
        debug!(
            entries = self.trace.data.len(),
            executed = self.trace.execution.len(),
            stack = self.trace.stack.len(),
            "Built trace"
        );
        self.trace
    }
}

/// Builds a trace from a raw record stream.
pub fn make_trace(records: impl IntoIterator<Item = RawRecord>) -> Trace {
    let mut builder = TraceBuilder::new();
    for record in records {
        builder.push(record);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use scr_common::{CallMarker, Range};
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

    #[test]
    fn test_empty_stream() {
        let trace = make_trace(Vec::new());
        assert!(trace.is_empty());
        assert!(trace.stack.is_empty());
        assert!(trace.execution.is_empty());
        assert!(trace.timeline.is_empty());
    }

    #[test]
    fn test_repeated_ids_fold_into_one_entry() {
        let range = Range::from_coords(1, 4, 1, 9);
        let trace = make_trace(vec![
            record("i:1", TraceKind::VariableDeclarator, range, json!(0)),
            record("i:2", TraceKind::UpdateExpression, range, json!(0)),
            record("i:2", TraceKind::UpdateExpression, range, json!(1)),
            record("i:2", TraceKind::UpdateExpression, range, json!(2)),
        ]);

        assert_eq!(trace.data.len(), 2);
        assert_eq!(trace.hit_count("i:2"), 3);
        assert_eq!(trace.entry("i:2").unwrap().value, json!(2));
        assert_eq!(trace.execution, vec!["i:1", "i:2", "i:2", "i:2"]);

        // every write is a variable snapshot, values keeps the latest per id
        assert_eq!(trace.variables.len(), 4);
        assert_eq!(trace.values.len(), 2);
        assert_eq!(trace.values[1].value, json!(2));
        assert_eq!(trace.identifiers.len(), 1);
    }

    #[test]
    fn test_timeline_keeps_each_occurrence() {
        let range = Range::from_coords(0, 0, 0, 3);
        let trace = make_trace(vec![
            record("x:1", TraceKind::Identifier, range, json!("a")),
            record("x:1", TraceKind::Identifier, range, json!("b")),
        ]);
        let values: Vec<_> = trace.timeline.iter().map(|entry| entry.value.clone()).collect();
        assert_eq!(values, vec![json!("a"), json!("b")]);
        for (id, entry) in trace.execution.iter().zip(&trace.timeline) {
            assert_eq!(id, &entry.id);
        }
    }

    #[test]
    fn test_first_occurrence_fixes_metadata() {
        let call_range = Range::from_coords(0, 0, 0, 3);
        let mut first = record("f:1", TraceKind::CallExpression, call_range, json!(null));
        first.marker = Some(CallMarker::Enter);
        let other_range = Range::from_coords(5, 0, 5, 1);
        let mut second = record("f:1", TraceKind::Identifier, other_range, json!(7));
        second.marker = Some(CallMarker::Exit);
        second.is_callback = true;

        let trace = make_trace(vec![first, second]);
        let entry = trace.entry("f:1").unwrap();
        assert_eq!(entry.kind, TraceKind::CallExpression);
        assert_eq!(entry.range, call_range);
        assert!(!entry.is_callback);
        assert_eq!(entry.value, json!(7));
        assert_eq!(trace.stack, vec!["f:1"]);
        assert_eq!(trace.timeline[0].marker, Some(CallMarker::Enter));
        assert_eq!(trace.timeline[1].marker, Some(CallMarker::Exit));
    }

    #[test]
    fn test_malformed_records_are_dropped() {
        let mut missing = record("a:1", TraceKind::Identifier, Range::default(), json!(1));
        missing.range = None;
        let mut unknown = record("b:2", TraceKind::Identifier, Range::default(), json!(1));
        unknown.kind = "ClassDeclaration".to_string();

        let trace = make_trace(vec![
            missing,
            unknown,
            record("c:3", TraceKind::Literal, Range::default(), json!(1)),
        ]);
        assert_eq!(trace.execution, vec!["c:3"]);
        assert_eq!(trace.data.len(), 1);
    }
}
