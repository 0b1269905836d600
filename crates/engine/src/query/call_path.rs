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

use scr_common::{CallMarker, Trace, TraceEntry};
use tracing::debug;

use crate::callgraph::BranchSeed;

/// Calls open at `index` in the timeline, outermost first.
///
/// Calls are opened by their enter marker and closed by their exit marker. An
/// exit with no matching open call is ignored; a call that never exits (the
/// run threw inside it) stays open.
pub fn call_path_at(trace: &Trace, timeline: &[TraceEntry], index: usize) -> Vec<BranchSeed> {
    let Some(last) = timeline.len().checked_sub(1) else {
        return Vec::new();
    };

    let mut open: Vec<&TraceEntry> = Vec::new();
    for entry in &timeline[..=index.min(last)] {
        match entry.marker {
            Some(CallMarker::Enter) => open.push(entry),
            Some(CallMarker::Exit) => {
                if let Some(at) = open.iter().rposition(|call| call.id == entry.id) {
                    open.truncate(at);
                } else {
                    debug!(id = %entry.id, "Exit marker without a matching enter");
                }
            }
            None => {}
        }
    }

    open.into_iter().map(|call| seed(trace, call)).collect()
}

fn seed(trace: &Trace, call: &TraceEntry) -> BranchSeed {
    let id = trace
        .stack
        .iter()
        .position(|id| id == &call.id)
        .and_then(|index| i64::try_from(index).ok())
        .unwrap_or(i64::MAX);
    BranchSeed {
        name: call.label().to_string(),
        id,
        range: call.range,
        is_callback: call.is_callback,
    }
}

#[cfg(test)]
mod tests {
    use scr_common::{Range, RawRecord, TraceKind};
    use serde_json::json;

    use super::*;
    use crate::make_trace;

    fn call(id: &str, row: usize, marker: CallMarker) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            kind: TraceKind::CallExpression.as_str().to_string(),
            range: Some(Range::from_coords(row, 0, row, 5)),
            value: json!(null),
            is_callback: false,
            marker: Some(marker),
        }
    }

    fn read(id: &str, row: usize) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            kind: TraceKind::Identifier.as_str().to_string(),
            range: Some(Range::from_coords(row, 8, row, 9)),
            value: json!(1),
            is_callback: false,
            marker: None,
        }
    }

    #[test]
    fn test_nested_calls() {
        let trace = make_trace(vec![
            call("outer:1", 0, CallMarker::Enter),
            call("inner:2", 1, CallMarker::Enter),
            read("x:3", 1),
            call("inner:2", 1, CallMarker::Exit),
            read("y:4", 2),
            call("outer:1", 0, CallMarker::Exit),
        ]);
        let timeline = &trace.timeline;

        let names = |index| {
            call_path_at(&trace, timeline, index)
                .into_iter()
                .map(|seed| (seed.name, seed.id))
                .collect::<Vec<_>>()
        };
        assert_eq!(names(2), vec![("outer".to_string(), 0), ("inner".to_string(), 1)]);
        assert_eq!(names(4), vec![("outer".to_string(), 0)]);
        assert!(names(5).is_empty());
        // out of range indices clamp to the end of the timeline
        assert!(names(99).is_empty());
    }

    #[test]
    fn test_unfinished_call_stays_open() {
        let trace = make_trace(vec![
            call("boom:1", 0, CallMarker::Enter),
            call("stray:2", 3, CallMarker::Exit),
            read("x:3", 1),
        ]);
        let path = call_path_at(&trace, &trace.timeline, 2);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].name, "boom");
        assert_eq!(path[0].range, Range::from_coords(0, 0, 0, 5));
    }

    #[test]
    fn test_empty_timeline() {
        let trace = Trace::new();
        assert!(call_path_at(&trace, &trace.timeline, 0).is_empty());
    }
}
