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

use proptest::prelude::*;
use scr_common::{
    contains_range_strict, position_in_range, range_touches_line, Position, Range, RawRecord,
    RunResult, TraceEntry, TraceKind,
};
use scr_engine::{make_trace, TraceHelper};
use serde_json::json;
use tracing::info;

fn entry(id: &str, range: Range) -> TraceEntry {
    TraceEntry {
        id: id.to_string(),
        kind: TraceKind::Identifier,
        range,
        value: json!(id),
        is_callback: false,
        marker: None,
    }
}

fn record(id: &str, kind: TraceKind, range: Range) -> RawRecord {
    RawRecord {
        id: id.to_string(),
        kind: kind.as_str().to_string(),
        range: Some(range),
        value: json!(null),
        is_callback: false,
        marker: None,
    }
}

fn arb_range() -> impl Strategy<Value = Range> {
    (0usize..6, 0usize..12, 0usize..6, 0usize..12)
        .prop_map(|(a, b, c, d)| Range::from_coords(a, b, c, d))
}

#[test]
fn test_nearest_match_scenario() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");
    let outer = entry("A:1", Range::from_coords(0, 0, 0, 10));
    let inner = entry("B:2", Range::from_coords(0, 2, 0, 5));
    let position = Position::new(0, 3);

    for entries in [vec![outer.clone(), inner.clone()], vec![inner.clone(), outer.clone()]] {
        let found = TraceHelper::get_match_at_position(&entries, &position).unwrap();
        assert_eq!(found.id, "B:2");
    }
}

#[test]
fn test_branch_navigation_scenario() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");
    let branch = Range::from_coords(1, 0, 3, 1);
    let body = Range::from_coords(2, 2, 2, 8);

    let mut records = Vec::new();
    for _ in 0..3 {
        records.push(record("WhileStatement:1", TraceKind::WhileStatement, branch));
        records.push(record("step:2", TraceKind::CallExpression, body));
        records.push(record("WhileStatement:1", TraceKind::WhileStatement, branch));
    }
    let mut helper = TraceHelper::from_run(RunResult { records, ..Default::default() });

    // six markers: the slice ends at the third one
    let visible = helper.navigate_to_branch(branch, 1, 3);
    assert_eq!(visible.len(), 4);
    assert_eq!(visible.last().unwrap().id, "WhileStatement:1");
    let markers = visible.iter().filter(|entry| entry.range == branch).count();
    assert_eq!(markers, 3);

    helper.reset_navigation();
    assert_eq!(helper.get_timeline().len(), 9);
}

#[test]
fn test_empty_stream_scenario() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");
    let trace = make_trace(Vec::new());
    assert!(trace.data.is_empty());
    assert!(trace.stack.is_empty());
    assert!(trace.execution.is_empty());

    let helper = TraceHelper::from_run(RunResult::default());
    assert!(helper.is_valid());
    assert!(helper.get_values_at_position(&Position::new(0, 0)).is_none());

    let helper = TraceHelper::from_run(RunResult {
        error: Some("SyntaxError".to_string()),
        ..Default::default()
    });
    assert!(!helper.is_valid());
}

proptest! {
    #[test]
    fn prop_strictly_enclosed_entry_wins(
        row in 0usize..6,
        start in 0usize..10,
        before in 1usize..5,
        width in 0usize..8,
        after in 1usize..5,
        offset in 0usize..8,
        inner_first in any::<bool>(),
    ) {
        let inner_start = start + before;
        let inner_end = inner_start + width;
        let outer = Range::from_coords(row, start, row, inner_end + after);
        let inner = Range::from_coords(row, inner_start, row, inner_end);
        let position = Position::new(row, inner_start + offset % (width + 1));
        prop_assert!(contains_range_strict(&outer, &inner));
        prop_assert!(position_in_range(&position, &outer));

        let (a, b) = (entry("outer:1", outer), entry("inner:2", inner));
        let entries = if inner_first { vec![b, a] } else { vec![a, b] };
        let found = TraceHelper::get_match_at_position(&entries, &position).unwrap();
        prop_assert_eq!(found.id.as_str(), "inner:2");
    }

    #[test]
    fn prop_no_containing_entry_means_no_match(ranges in prop::collection::vec(arb_range(), 0..8)) {
        let position = Position::new(7, 0);
        let entries: Vec<_> =
            ranges.into_iter().enumerate().map(|(i, r)| entry(&format!("e:{i}"), r)).collect();
        prop_assert!(TraceHelper::get_match_at_position(&entries, &position).is_none());
    }

    #[test]
    fn prop_line_queries(ranges in prop::collection::vec(arb_range(), 0..8), line in 0usize..8) {
        let entries: Vec<_> =
            ranges.into_iter().enumerate().map(|(i, r)| entry(&format!("e:{i}"), r)).collect();
        let found = TraceHelper::get_trace_data_in_line(&entries, line);
        if line < 1 {
            prop_assert!(found.is_empty());
        }
        for entry in &found {
            prop_assert!(range_touches_line(&entry.range, line));
        }
        let expected = entries.iter().filter(|e| range_touches_line(&e.range, line)).count();
        prop_assert_eq!(found.len(), expected);
    }
}
