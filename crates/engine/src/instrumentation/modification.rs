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

use std::{collections::BTreeMap, fmt::Display};

use crate::instrumentation::codegen;

const FUNCTION_ENTRY_PRIORITY: u16 = u16::MAX; // used for the probes at the top of a function body
const CLOSE_BASE_PRIORITY: u16 = 0x8000; // closing text, plus the nesting depth
const OPEN_BASE_PRIORITY: u16 = 0x7fff; // opening text, minus the nesting depth
const MAX_DEPTH: u16 = 0x7ffe;

/// The collections of modifications on a source file.
#[derive(Debug, Default)]
pub struct SourceModifications {
    /// The modifications on the source file. The key is the location of
    /// modification in the original source code; actions at one location are
    /// kept in emission order.
    modifications: BTreeMap<usize, Vec<InstrumentAction>>,
}

impl SourceModifications {
    /// Creates a new source modifications.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a modification.
    ///
    /// Actions at the same location are ordered by descending priority. Among
    /// equal priorities the later action is placed after the earlier one.
    pub fn add_modification(&mut self, modification: InstrumentAction) {
        let actions = self.modifications.entry(modification.loc).or_default();
        let at = actions
            .iter()
            .position(|existing| existing.priority < modification.priority)
            .unwrap_or(actions.len());
        actions.insert(at, modification);
    }

    /// Extends the modifications with the given modifications.
    pub fn extend_modifications(
        &mut self,
        modifications: impl IntoIterator<Item = InstrumentAction>,
    ) {
        for modification in modifications {
            self.add_modification(modification);
        }
    }

    /// Records a wrap of `[start, end)` at the given nesting depth.
    pub fn wrap(
        &mut self,
        start: usize,
        end: usize,
        depth: usize,
        open: InstrumentContent,
        close: InstrumentContent,
    ) {
        let depth = u16::try_from(depth).unwrap_or(MAX_DEPTH).min(MAX_DEPTH);
        self.add_modification(InstrumentAction {
            loc: start,
            content: open,
            priority: OPEN_BASE_PRIORITY - depth,
        });
        self.add_modification(InstrumentAction {
            loc: end,
            content: close,
            priority: CLOSE_BASE_PRIORITY + depth,
        });
    }

    /// Records statements inserted at the top of a function body.
    pub fn function_entry(&mut self, loc: usize, content: InstrumentContent) {
        self.add_modification(InstrumentAction { loc, content, priority: FUNCTION_ENTRY_PRIORITY });
    }

    /// Number of locations that will receive text.
    pub fn len(&self) -> usize {
        self.modifications.len()
    }

    /// Whether nothing will be inserted.
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    /// Modifies the source code with the modifications.
    pub fn modify_source(&self, source: &str) -> String {
        let mut modified_source = source.to_string();
        // Apply the modifications in reverse order to avoid index shifting
        for (loc, actions) in self.modifications.iter().rev() {
            let content: String = actions.iter().map(|action| action.content.to_string()).collect();
            modified_source.insert_str(*loc, &content);
        }
        modified_source
    }
}

/// An action to instrument a code in the source file.
#[derive(Debug, Clone)]
pub struct InstrumentAction {
    /// The byte offset in the original source at which the content is inserted.
    pub loc: usize,
    /// The code to instrument
    pub content: InstrumentContent,
    /// If two `InstrumentAction`s have the same `loc`, the one with higher
    /// priority is emitted first.
    pub priority: u16,
}

/// The content to instrument.
#[derive(Debug, Clone)]
pub enum InstrumentContent {
    /// Code inserted as is.
    Plain(String),
    /// `value("id", ` before a tracked expression.
    ValueOpen {
        /// Name of the value probe.
        probe: String,
        /// Location id.
        id: String,
    },
    /// `post("id", (pre("id"), ` before a call.
    CallOpen {
        /// Name of the pre-call probe.
        pre: String,
        /// Name of the post-call probe.
        post: String,
        /// Location id.
        id: String,
    },
    /// `value("id", arg);` at the top of a function body.
    EntryStatement {
        /// Name of the value probe.
        probe: String,
        /// Location id.
        id: String,
        /// Captured expression.
        arg: String,
    },
}

impl Display for InstrumentContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(content) => f.write_str(content),
            Self::ValueOpen { probe, id } => f.write_str(&codegen::value_open(probe, id)),
            Self::CallOpen { pre, post, id } => f.write_str(&codegen::call_open(pre, post, id)),
            Self::EntryStatement { probe, id, arg } => {
                f.write_str(&codegen::entry_statement(probe, id, arg))
            }
        }
    }
}
