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

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::Range;

/// Kind of a traced location.
///
/// The names follow the ESTree node types of the construct that was
/// instrumented, which is also how they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceKind {
    /// A variable read.
    Identifier,
    /// A literal value.
    Literal,
    /// A template literal with substitutions.
    TemplateLiteral,
    /// An array literal.
    ArrayExpression,
    /// An object literal.
    ObjectExpression,
    /// A property read.
    MemberExpression,
    /// A unary operator application.
    UnaryExpression,
    /// An `await` expression.
    AwaitExpression,
    /// `++`/`--`, prefix or postfix.
    UpdateExpression,
    /// A binary operator application.
    BinaryExpression,
    /// `&&`, `||` or `??`.
    LogicalExpression,
    /// `test ? a : b`.
    ConditionalExpression,
    /// Any assignment operator.
    AssignmentExpression,
    /// A function call.
    CallExpression,
    /// A `new` expression.
    NewExpression,
    /// A variable declarator with an initializer.
    VariableDeclarator,
    /// A function parameter, captured on function entry.
    Parameter,
    /// Entry into a function declaration.
    FunctionDeclaration,
    /// Entry into a function expression.
    FunctionExpression,
    /// Entry into an arrow function.
    ArrowFunctionExpression,
    /// Evaluation of an `if` test.
    IfStatement,
    /// Evaluation of a `while` test.
    WhileStatement,
    /// Evaluation of a `do … while` test.
    DoWhileStatement,
    /// Evaluation of a `for` test.
    ForStatement,
    /// Evaluation of a `switch` discriminant.
    SwitchStatement,
}

impl TraceKind {
    /// Every recognised kind.
    pub const ALL: [Self; 25] = [
        Self::Identifier,
        Self::Literal,
        Self::TemplateLiteral,
        Self::ArrayExpression,
        Self::ObjectExpression,
        Self::MemberExpression,
        Self::UnaryExpression,
        Self::AwaitExpression,
        Self::UpdateExpression,
        Self::BinaryExpression,
        Self::LogicalExpression,
        Self::ConditionalExpression,
        Self::AssignmentExpression,
        Self::CallExpression,
        Self::NewExpression,
        Self::VariableDeclarator,
        Self::Parameter,
        Self::FunctionDeclaration,
        Self::FunctionExpression,
        Self::ArrowFunctionExpression,
        Self::IfStatement,
        Self::WhileStatement,
        Self::DoWhileStatement,
        Self::ForStatement,
        Self::SwitchStatement,
    ];

    /// The wire name of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Identifier => "Identifier",
            Self::Literal => "Literal",
            Self::TemplateLiteral => "TemplateLiteral",
            Self::ArrayExpression => "ArrayExpression",
            Self::ObjectExpression => "ObjectExpression",
            Self::MemberExpression => "MemberExpression",
            Self::UnaryExpression => "UnaryExpression",
            Self::AwaitExpression => "AwaitExpression",
            Self::UpdateExpression => "UpdateExpression",
            Self::BinaryExpression => "BinaryExpression",
            Self::LogicalExpression => "LogicalExpression",
            Self::ConditionalExpression => "ConditionalExpression",
            Self::AssignmentExpression => "AssignmentExpression",
            Self::CallExpression => "CallExpression",
            Self::NewExpression => "NewExpression",
            Self::VariableDeclarator => "VariableDeclarator",
            Self::Parameter => "Parameter",
            Self::FunctionDeclaration => "FunctionDeclaration",
            Self::FunctionExpression => "FunctionExpression",
            Self::ArrowFunctionExpression => "ArrowFunctionExpression",
            Self::IfStatement => "IfStatement",
            Self::WhileStatement => "WhileStatement",
            Self::DoWhileStatement => "DoWhileStatement",
            Self::ForStatement => "ForStatement",
            Self::SwitchStatement => "SwitchStatement",
        }
    }

    /// Whether the kind belongs to the given category.
    pub fn is_in(&self, category: TraceCategory) -> bool {
        category.kinds().contains(self)
    }

    /// Whether the kind is a call boundary that emits enter/exit markers.
    pub fn is_call(&self) -> bool {
        matches!(self, Self::CallExpression | Self::NewExpression)
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown trace type {s:?}"))
    }
}

/// Groups of kinds used to build the trace indices and to filter queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceCategory {
    /// Kinds whose values drive the hover overlays.
    Expression,
    /// Variable and parameter declarations.
    Declaration,
    /// Kinds that leave a variable in a new state.
    Write,
    /// Call sites and function entries.
    Stack,
    /// Control-flow decisions.
    Branch,
}

impl TraceCategory {
    /// The kinds in this category.
    pub const fn kinds(&self) -> &'static [TraceKind] {
        use TraceKind::*;
        match self {
            Self::Expression => &[
                Identifier,
                Literal,
                TemplateLiteral,
                ArrayExpression,
                ObjectExpression,
                MemberExpression,
                UnaryExpression,
                AwaitExpression,
                UpdateExpression,
                BinaryExpression,
                LogicalExpression,
                ConditionalExpression,
                AssignmentExpression,
                CallExpression,
                NewExpression,
                VariableDeclarator,
            ],
            Self::Declaration => &[VariableDeclarator, Parameter],
            Self::Write => &[VariableDeclarator, Parameter, AssignmentExpression, UpdateExpression],
            Self::Stack => &[
                CallExpression,
                NewExpression,
                FunctionDeclaration,
                FunctionExpression,
                ArrowFunctionExpression,
            ],
            Self::Branch => &[
                IfStatement,
                WhileStatement,
                DoWhileStatement,
                ForStatement,
                SwitchStatement,
                ConditionalExpression,
                LogicalExpression,
            ],
        }
    }
}

/// Which side of a call boundary a record was emitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallMarker {
    /// Emitted by the pre-call probe, before arguments are evaluated.
    Enter,
    /// Emitted by the post-call probe with the call's result.
    Exit,
}

/// A record as emitted by the execution host, before normalization.
///
/// Hosts are not trusted to be well formed: `range` may be missing and `type`
/// may name a kind this engine does not know. Such records are dropped when
/// the trace is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    /// Id of the instrumented location, `<label>:<n>`.
    pub id: String,
    /// Wire name of the [`TraceKind`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Source range of the location.
    #[serde(default)]
    pub range: Option<Range>,
    /// Captured value.
    #[serde(default)]
    pub value: serde_json::Value,
    /// Whether the location runs inside a callback.
    #[serde(default)]
    pub is_callback: bool,
    /// Call boundary side, for call records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<CallMarker>,
}

/// A normalized trace entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    /// Id of the instrumented location, `<label>:<n>`.
    pub id: String,
    /// Kind of the location.
    #[serde(rename = "type")]
    pub kind: TraceKind,
    /// Source range of the location.
    pub range: Range,
    /// Captured value.
    pub value: serde_json::Value,
    /// Whether the location runs inside a callback.
    pub is_callback: bool,
    /// Call boundary side, for call records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<CallMarker>,
}

impl TraceEntry {
    /// The human readable part of the id, before its first `:`.
    pub fn label(&self) -> &str {
        label_of(&self.id)
    }
}

/// The human readable part of an id, before its first `:`.
pub fn label_of(id: &str) -> &str {
    id.split(':').next().unwrap_or(id)
}

/// The canonical record of one instrumented run.
///
/// A trace is built once from the raw record stream and never mutated
/// afterwards; a new run produces a new trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Ids of call sites and function entries, in first-seen order.
    pub stack: Vec<String>,
    /// Entry contents by id.
    pub data: IndexMap<String, TraceEntry>,
    /// How many times each location fired.
    pub hits: IndexMap<String, usize>,
    /// Ids in runtime order.
    pub execution: Vec<String>,
    /// Variable and parameter declarations, in first-seen order.
    pub identifiers: Vec<TraceEntry>,
    /// Every occurrence in runtime order, index-aligned with `execution`.
    pub timeline: Vec<TraceEntry>,
    /// Every write, in runtime order.
    pub variables: Vec<TraceEntry>,
    /// The latest write per location, in first-seen order.
    pub values: Vec<TraceEntry>,
}

impl Trace {
    /// Create a new empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Looks up an entry by id.
    pub fn entry(&self, id: &str) -> Option<&TraceEntry> {
        self.data.get(id)
    }

    /// How many times the location fired; zero for unknown ids.
    pub fn hit_count(&self, id: &str) -> usize {
        self.hits.get(id).copied().unwrap_or_default()
    }

    /// Convert trace to serde_json::Value for serialization
    pub fn to_json_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// The outcome of a run as reported by the execution host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Error message; empty when the run succeeded.
    #[serde(default)]
    pub error: String,
    /// Longer description of the error, if any.
    #[serde(default)]
    pub description: String,
}

impl RunOutcome {
    /// A successful run.
    pub fn success() -> Self {
        Self::default()
    }

    /// A failed run.
    pub fn failure(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self { error: error.into(), description: description.into() }
    }

    /// Whether the host reported a failure.
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// What an execution host hands back after running instrumented code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// The raw record stream.
    #[serde(default)]
    pub records: Vec<RawRecord>,
    /// Runtime error, if the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Description of the runtime error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RunResult {
    /// The run outcome carried by this result.
    pub fn outcome(&self) -> RunOutcome {
        RunOutcome {
            error: self.error.clone().unwrap_or_default(),
            description: self.description.clone().unwrap_or_default(),
        }
    }
}
