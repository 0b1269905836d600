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

use scr_common::{Position, Range};

use crate::{instrumentation::ast::Span, ParseError};

/// Maps byte offsets of a source text to row/column positions.
///
/// Rows are split on `\n`; columns count chars from the start of the row.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    /// Indexes the given source.
    pub fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { source, line_starts }
    }

    /// Position of a byte offset. Offsets past the end clamp to the end.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.source.len());
        let row = match self.line_starts.binary_search(&offset) {
            Ok(row) => row,
            Err(next) => next.saturating_sub(1),
        };
        let line_start = self.line_starts[row];
        let column = self.source.get(line_start..offset).map_or(0, |s| s.chars().count());
        Position::new(row, column)
    }

    /// Range covering a span.
    pub fn range(&self, span: Span) -> Range {
        Range::new(self.position(span.start), self.position(span.end))
    }

    /// Builds a parse error located at `offset`.
    pub fn error(&self, message: impl Into<String>, offset: usize) -> ParseError {
        ParseError::new(message, self.position(offset), offset)
    }

    /// The indexed text.
    pub fn source(&self) -> &'a str {
        self.source
    }
}
