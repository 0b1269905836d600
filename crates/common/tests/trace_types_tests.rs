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

use scr_common::{Position, Range, Trace, TraceEntry, TraceKind};
use serde_json::json;
use tracing::info;

#[test]
fn test_logging_can_be_initialized_twice() {
    scr_common::logging::ensure_test_logging(None);
    scr_common::logging::ensure_test_logging(Some(tracing::Level::DEBUG));
    info!("Running test");
}

#[test]
fn test_trace_document_shape() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");
    let entry = TraceEntry {
        id: "x:1".to_string(),
        kind: TraceKind::VariableDeclarator,
        range: Range::from_coords(0, 4, 0, 9),
        value: json!(5),
        is_callback: false,
        marker: None,
    };
    let mut trace = Trace::new();
    trace.data.insert(entry.id.clone(), entry.clone());
    trace.hits.insert(entry.id.clone(), 1);
    trace.execution.push(entry.id.clone());
    trace.timeline.push(entry);

    let value = trace.to_json_value().unwrap();
    assert_eq!(value["data"]["x:1"]["type"], "VariableDeclarator");
    assert_eq!(value["data"]["x:1"]["isCallback"], false);
    assert!(value["data"]["x:1"].get("marker").is_none());
    assert_eq!(value["hits"]["x:1"], 1);
    assert_eq!(value["execution"], json!(["x:1"]));
    assert_eq!(trace.hit_count("y:2"), 0);
    assert!(!trace.is_empty());
}

#[test]
fn test_geometry_parses_from_cli_syntax() {
    scr_common::logging::ensure_test_logging(None);
    info!("Running test");
    assert_eq!("3:7".parse::<Position>().unwrap(), Position::new(3, 7));
    assert_eq!(
        "2:10-0:1".parse::<Range>().unwrap(),
        Range::from_coords(0, 1, 2, 10)
    );
    assert!("3".parse::<Position>().is_err());
    assert!("a:b-1:1".parse::<Range>().is_err());
    assert_eq!(Range::from_coords(1, 2, 3, 4).to_string(), "1:2-3:4");
}
