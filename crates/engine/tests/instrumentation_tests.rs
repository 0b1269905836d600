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

//! End to end: instrument a script, replay what a host would report for it,
//! and query the resulting trace.

use scr_common::{label_of, Position, RawRecord, RunResult, TraceKind};
use scr_engine::{
    instrument, CallGraph, EngineConfig, LocationMap, PreparedRun, ProbeKind, TraceHelper,
    TraceService,
};
use serde_json::{json, Value};
use tracing::info;

const SCRIPT: &str = "function add(a, b) {
  return a + b;
}
let total = add(1, 2);
";

fn id_of(locations: &LocationMap, label: &str, kind: TraceKind) -> String {
    locations
        .iter()
        .find(|(id, location)| label_of(id) == label && location.kind == kind)
        .map(|(id, _)| id.clone())
        .unwrap_or_else(|| panic!("no {kind} location labelled {label}"))
}

/// Records in the order the host would emit them for `SCRIPT`.
fn replay(locations: &LocationMap) -> Vec<RawRecord> {
    let call = id_of(locations, "add", TraceKind::CallExpression);
    let entry = id_of(locations, "add", TraceKind::FunctionDeclaration);
    let param_a = id_of(locations, "a", TraceKind::Parameter);
    let param_b = id_of(locations, "b", TraceKind::Parameter);
    let read_a = id_of(locations, "a", TraceKind::Identifier);
    let read_b = id_of(locations, "b", TraceKind::Identifier);
    let sum = id_of(locations, "BinaryExpression", TraceKind::BinaryExpression);
    let total = id_of(locations, "total", TraceKind::VariableDeclarator);

    let steps: Vec<(ProbeKind, &str, Value)> = vec![
        (ProbeKind::PreCall, call.as_str(), Value::Null),
        (ProbeKind::Value, entry.as_str(), json!({"0": 1, "1": 2})),
        (ProbeKind::Value, param_a.as_str(), json!(1)),
        (ProbeKind::Value, param_b.as_str(), json!(2)),
        (ProbeKind::Value, read_a.as_str(), json!(1)),
        (ProbeKind::Value, read_b.as_str(), json!(2)),
        (ProbeKind::Value, sum.as_str(), json!(3)),
        (ProbeKind::PostCall, call.as_str(), json!(3)),
        (ProbeKind::Value, total.as_str(), json!(3)),
    ];
    steps
        .into_iter()
        .map(|(probe, id, value)| locations.resolve(probe, id, value).unwrap())
        .collect()
}

#[test]
fn test_instrument_and_query() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");

    let instrumented = instrument(SCRIPT, &EngineConfig::default()).unwrap();
    assert!(instrumented.code.contains("arguments"));
    assert!(instrumented.code.contains("_$i("));
    assert_eq!(instrumented.code.lines().count(), SCRIPT.lines().count());

    let records = replay(&instrumented.locations);
    let helper = TraceHelper::from_run(RunResult { records, ..Default::default() });
    assert!(helper.is_valid());

    // hovering `total` shows the declarator
    let hovered = helper.get_values_at_position(&Position::new(3, 6)).unwrap();
    assert_eq!(hovered.kind, TraceKind::VariableDeclarator);
    assert_eq!(hovered.value, json!(3));

    // parameters are the values of the first line, the declaration of the fourth
    let first_line: Vec<_> =
        helper.get_values_in_line(1).into_iter().map(|entry| entry.label()).collect();
    assert_eq!(first_line, vec!["a", "b"]);
    assert_eq!(helper.get_values_in_line(4)[0].label(), "total");

    let stack = helper.get_stack_block_counts();
    assert_eq!(stack.len(), 2);
    assert!(stack.iter().all(|block| block.text == "add"));

    // inside the call while the sum is evaluated
    let sum_index = helper
        .get_timeline()
        .iter()
        .position(|entry| entry.kind == TraceKind::BinaryExpression)
        .unwrap();
    let path = helper.get_call_path_at(sum_index);
    assert_eq!(path.len(), 1);
    assert_eq!(path[0].name, "add");
    assert_eq!(path[0].id, 0);

    let mut graph = CallGraph::new();
    graph.update(&path, "");
    assert_eq!(graph.branch(0).unwrap().name, "add");
}

#[test]
fn test_service_round_trip() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut service = TraceService::new(EngineConfig::default());
    let receiver = service.subscribe();

    let PreparedRun::Instrumented(instrumented) = service.prepare_run(SCRIPT) else {
        panic!("script should instrument");
    };
    let records = replay(&instrumented.locations);
    service.complete_run(RunResult { records, ..Default::default() });

    let snapshot = receiver.borrow().clone().unwrap();
    let helper = snapshot.helper();
    assert_eq!(helper.get_execution_trace_all().len(), 9);
    assert_eq!(helper.get_identifiers().len(), 3);
}

#[test]
fn test_unsupported_source_runs_untraced() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");

    let service = TraceService::new(EngineConfig::default());
    match service.prepare_run("class Point { constructor() {} }") {
        PreparedRun::Untraced { code, error } => {
            assert_eq!(code, "class Point { constructor() {} }");
            assert_eq!(error.position, Position::new(0, 0));
        }
        PreparedRun::Instrumented(_) => panic!("classes are outside the supported subset"),
    }
}

#[test]
fn test_deeply_nested_source_runs_untraced() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");

    let source = format!("let x = {}1{};", "(".repeat(1000), ")".repeat(1000));
    let err = instrument(&source, &EngineConfig::default()).unwrap_err();
    assert_eq!(err.message, "expression nesting too deep");

    let service = TraceService::new(EngineConfig::default());
    match service.prepare_run(&source) {
        PreparedRun::Untraced { code, .. } => assert_eq!(code, source),
        PreparedRun::Instrumented(_) => panic!("nesting past the limit should not instrument"),
    }
}
