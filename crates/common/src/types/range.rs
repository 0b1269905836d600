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

//! Source geometry: positions, ranges and the containment predicates the
//! query engine is built on.
//!
//! Rows and columns are zero-based. Editor line numbers are one-based, which
//! is why [`range_touches_line`] subtracts one from its argument.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A location in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based row.
    pub row: usize,
    /// Zero-based column, counted in chars.
    pub column: usize,
}

impl Position {
    /// Creates a new position.
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row.cmp(&other.row).then(self.column.cmp(&other.column))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

impl FromStr for Position {
    type Err = String;

    /// Parses `ROW:COLUMN`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (row, column) =
            s.split_once(':').ok_or_else(|| format!("expected ROW:COLUMN, got {s:?}"))?;
        let row = row.trim().parse().map_err(|e| format!("invalid row in {s:?}: {e}"))?;
        let column = column.trim().parse().map_err(|e| format!("invalid column in {s:?}: {e}"))?;
        Ok(Self { row, column })
    }
}

/// A pair of positions delimiting a syntactic construct.
///
/// `start` is never after `end`; [`Range::new`] swaps its arguments if needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "RawRange")]
pub struct Range {
    /// First position covered by the construct.
    pub start: Position,
    /// Position right after the construct.
    pub end: Position,
}

impl Range {
    /// Creates a range, ordering the endpoints.
    pub fn new(start: Position, end: Position) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Shorthand for `Range::new(Position::new(..), Position::new(..))`.
    pub fn from_coords(start_row: usize, start_col: usize, end_row: usize, end_col: usize) -> Self {
        Self::new(Position::new(start_row, start_col), Position::new(end_row, end_col))
    }

    /// Whether the range spans a single row.
    pub fn is_single_line(&self) -> bool {
        self.start.row == self.end.row
    }
}

/// Wire form of [`Range`], ordered through [`Range::new`] once read.
#[derive(Deserialize)]
struct RawRange {
    start: Position,
    end: Position,
}

impl From<RawRange> for Range {
    fn from(raw: RawRange) -> Self {
        Self::new(raw.start, raw.end)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for Range {
    type Err = String;

    /// Parses `ROW:COLUMN-ROW:COLUMN`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("expected ROW:COLUMN-ROW:COLUMN, got {s:?}"))?;
        Ok(Self::new(start.parse()?, end.parse()?))
    }
}

/// Returns true iff `inner` lies entirely within `outer`, endpoints included.
pub fn contains_range(outer: &Range, inner: &Range) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

/// Returns true iff both endpoints of `inner` lie strictly inside `outer`.
///
/// Used to break ties between entries that all contain a queried position:
/// the strictly enclosed (more specific) one wins.
pub fn contains_range_strict(outer: &Range, inner: &Range) -> bool {
    outer.start < inner.start && inner.end < outer.end
}

/// Returns true iff the range starts or ends on the given one-based editor line.
pub fn range_touches_line(range: &Range, line_number: usize) -> bool {
    let Some(row) = line_number.checked_sub(1) else {
        return false;
    };
    range.start.row == row || range.end.row == row
}

/// Returns true iff `position` falls within `range`.
///
/// Three disjoint cases match: a single-line range whose columns bracket the
/// position, the start row of a multi-line range at or after the start
/// column, and the end row of a multi-line range at or before the end column.
/// Rows strictly between the start and end rows of a multi-line range never
/// match.
pub fn position_in_range(position: &Position, range: &Range) -> bool {
    let single_line = range.start.row == range.end.row;

    if single_line {
        return position.row == range.start.row
            && position.column >= range.start.column
            && position.column <= range.end.column;
    }

    if position.row == range.start.row && position.column >= range.start.column {
        return true;
    }

    position.row == range.end.row && position.column <= range.end.column
}

/// Exact structural equality of both endpoints.
pub fn range_equals(a: &Range, b: &Range) -> bool {
    a.start == b.start && a.end == b.end
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn r(a: usize, b: usize, c: usize, d: usize) -> Range {
        Range::from_coords(a, b, c, d)
    }

    #[test]
    fn test_deserialize_orders_endpoints() {
        let json = r#"{"start":{"row":3,"column":1},"end":{"row":1,"column":4}}"#;
        let range: Range = serde_json::from_str(json).unwrap();
        assert_eq!(range, r(1, 4, 3, 1));

        let ordered = r(1, 0, 2, 5);
        let back: Range = serde_json::from_str(&serde_json::to_string(&ordered).unwrap()).unwrap();
        assert_eq!(back, ordered);
    }

    #[test]
    fn test_new_orders_endpoints() {
        let range = Range::new(Position::new(3, 1), Position::new(1, 4));
        assert_eq!(range.start, Position::new(1, 4));
        assert_eq!(range.end, Position::new(3, 1));
    }

    #[test]
    fn test_contains_range_multiline() {
        // Column-wise the inner start is before the outer start, but the
        // inner range begins on a later row.
        let outer = r(0, 8, 4, 1);
        let inner = r(1, 0, 2, 20);
        assert!(contains_range(&outer, &inner));
        assert!(contains_range_strict(&outer, &inner));
        assert!(!contains_range(&inner, &outer));
    }

    #[test]
    fn test_contains_range_is_not_strict_on_equal_ends() {
        let outer = r(0, 0, 0, 10);
        let inner = r(0, 0, 0, 5);
        assert!(contains_range(&outer, &inner));
        assert!(!contains_range_strict(&outer, &inner));
        assert!(contains_range(&outer, &outer));
        assert!(!contains_range_strict(&outer, &outer));
    }

    #[test]
    fn test_range_touches_line() {
        let range = r(2, 0, 5, 3);
        assert!(range_touches_line(&range, 3));
        assert!(range_touches_line(&range, 6));
        assert!(!range_touches_line(&range, 4));
        assert!(!range_touches_line(&range, 0));
    }

    #[test]
    fn test_position_in_range_cases() {
        let single = r(1, 4, 1, 9);
        assert!(position_in_range(&Position::new(1, 4), &single));
        assert!(position_in_range(&Position::new(1, 9), &single));
        assert!(!position_in_range(&Position::new(1, 10), &single));
        assert!(!position_in_range(&Position::new(0, 5), &single));

        let multi = r(1, 4, 3, 2);
        assert!(position_in_range(&Position::new(1, 30), &multi));
        assert!(!position_in_range(&Position::new(1, 3), &multi));
        assert!(position_in_range(&Position::new(3, 0), &multi));
        assert!(!position_in_range(&Position::new(3, 3), &multi));
        // Interior rows are not covered.
        assert!(!position_in_range(&Position::new(2, 0), &multi));
    }

    #[test]
    fn test_parse_range() {
        let range: Range = "1:2-3:4".parse().unwrap();
        assert_eq!(range, r(1, 2, 3, 4));
        assert!("1:2".parse::<Range>().is_err());
        assert!("a:2-3:4".parse::<Range>().is_err());
    }

    fn arb_range() -> impl Strategy<Value = Range> {
        (0usize..6, 0usize..12, 0usize..6, 0usize..12)
            .prop_map(|(a, b, c, d)| Range::from_coords(a, b, c, d))
    }

    proptest! {
        #[test]
        fn prop_strict_implies_non_strict(outer in arb_range(), inner in arb_range()) {
            if contains_range_strict(&outer, &inner) {
                prop_assert!(contains_range(&outer, &inner));
            }
        }

        #[test]
        fn prop_no_line_below_one(range in arb_range()) {
            prop_assert!(!range_touches_line(&range, 0));
        }

        #[test]
        fn prop_endpoints_are_in_range(range in arb_range()) {
            prop_assert!(position_in_range(&range.start, &range));
            prop_assert!(position_in_range(&range.end, &range));
        }
    }
}
