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

//! Text of the probe calls inserted into the source.
//!
//! Every probe returns its last argument, so wrapping an expression `e` as
//! `value("id", e)` leaves the value of the enclosing expression unchanged.

/// Argument captured by the entry probe of a non-arrow function.
pub const ARGUMENTS: &str = "arguments";
/// Argument captured by the entry probe of an arrow function, which has no
/// `arguments` object of its own.
pub const NO_ARGUMENTS: &str = "void 0";

/// Quotes a location id as a JavaScript string literal.
pub fn js_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\u{2028}' => quoted.push_str("\\u2028"),
            '\u{2029}' => quoted.push_str("\\u2029"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// `value("id", `
pub fn value_open(probe: &str, id: &str) -> String {
    format!("{probe}({}, ", js_string(id))
}

/// Closes a [`value_open`].
pub const VALUE_CLOSE: &str = ")";

/// `post("id", (pre("id"), `
pub fn call_open(pre: &str, post: &str, id: &str) -> String {
    let id = js_string(id);
    format!("{post}({id}, ({pre}({id}), ")
}

/// Closes a [`call_open`].
pub const CALL_CLOSE: &str = "))";

/// `value("id", arg)` as an expression.
pub fn entry_expression(probe: &str, id: &str, arg: &str) -> String {
    format!("{probe}({}, {arg})", js_string(id))
}

/// `value("id", arg);` as a statement.
pub fn entry_statement(probe: &str, id: &str, arg: &str) -> String {
    format!("{};", entry_expression(probe, id, arg))
}
