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

//! Inspect command - queries a recorded run

use std::fs;

use eyre::{Result, WrapErr};
use scr_common::{CallMarker, RunResult};
use scr_engine::{create_branch_hierarchy, CallGraph, TraceHelper};
use serde_json::{json, Map, Value};

use crate::InspectArgs;

/// Loads a run result and prints the requested queries as one JSON object.
///
/// Without any query flag a summary of the run is printed.
pub fn inspect_run(args: &InspectArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.run)
        .wrap_err_with(|| format!("failed to read run result {}", args.run.display()))?;
    let run: RunResult = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("{} is not a run result", args.run.display()))?;
    let helper = TraceHelper::from_run(run);

    if !helper.is_valid() {
        tracing::warn!("Run failed: {}", helper.outcome().error);
    }

    let report = build_report(&helper, args)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_report(helper: &TraceHelper, args: &InspectArgs) -> Result<Value> {
    let mut report = Map::new();
    report.insert("valid".into(), json!(helper.is_valid()));
    if helper.outcome().is_error() {
        report.insert("error".into(), serde_json::to_value(helper.outcome())?);
    }

    let mut queried = false;
    if let Some(position) = &args.position {
        queried = true;
        let value = helper.get_values_at_position(position);
        report.insert("position".into(), serde_json::to_value(value)?);
    }
    if let Some(line) = args.line {
        queried = true;
        report.insert("line".into(), serde_json::to_value(helper.get_values_in_line(line))?);
    }
    if let Some(range) = &args.range {
        queried = true;
        let trace = helper.get_trace_for_expression(range);
        report.insert("range".into(), serde_json::to_value(trace)?);
    }
    if args.stack {
        queried = true;
        report.insert("stack".into(), serde_json::to_value(helper.get_stack_block_counts())?);
    }
    if args.execution {
        queried = true;
        report.insert("execution".into(), serde_json::to_value(helper.get_execution_trace())?);
    }
    if args.graph {
        queried = true;
        let graph = call_graph(helper, args);
        report.insert("graph".into(), serde_json::to_value(graph.tree())?);
    }

    if !queried {
        let expressions = helper.get_expressions();
        report.insert(
            "summary".into(),
            json!({
                "locations": helper.raw_trace().map(|trace| trace.data.len()).unwrap_or_default(),
                "timeline": expressions.timeline.len(),
                "identifiers": expressions.identifiers.len(),
                "values": helper.get_values().len(),
                "calls": helper.get_stack_block_counts().len(),
            }),
        );
    }
    Ok(Value::Object(report))
}

/// The call graph of the expression at `--range`, or of every call in the run.
fn call_graph(helper: &TraceHelper, args: &InspectArgs) -> CallGraph {
    let query = args.query.as_deref().unwrap_or_default();
    let mut graph = CallGraph::new();

    if let Some(range) = &args.range {
        graph.update(&helper.get_call_path_for_expression(range), query);
        return graph;
    }

    let enters = helper
        .get_timeline()
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.marker == Some(CallMarker::Enter))
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    for index in enters {
        graph.add_to_graph(create_branch_hierarchy(&helper.get_call_path_at(index)));
    }
    graph.make_query(query);
    graph
}
