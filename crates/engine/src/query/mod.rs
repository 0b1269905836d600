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

//! Queries over a trace.
//!
//! A [`TraceHelper`] answers the questions the editor asks on every hover and
//! click. All queries are total: a helper for a failed run, or one without a
//! trace, returns empty results instead of failing.

pub mod call_path;
pub mod navigation;

pub use navigation::{BranchSelection, Navigation};

use std::sync::Arc;

use scr_common::{
    contains_range, contains_range_strict, label_of, position_in_range, range_touches_line,
    Position, Range, RunOutcome, RunResult, Trace, TraceCategory, TraceEntry,
};
use serde::Serialize;
use tracing::debug;

use crate::{callgraph::BranchSeed, make_trace};

/// Hit count of one call site or function entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackBlockCount {
    /// Position of the id in the trace stack.
    pub index: usize,
    /// Label of the location.
    pub text: String,
    /// Source range of the location.
    pub range: Range,
    /// How many times it fired.
    pub count: usize,
}

/// Declarations and the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Expressions<'a> {
    /// Variable and parameter declarations.
    pub identifiers: &'a [TraceEntry],
    /// Every occurrence in runtime order.
    pub timeline: &'a [TraceEntry],
}

/// The part of a trace that lies within a source range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpressionTrace<'a> {
    /// Timeline entries within the range.
    pub timeline: Vec<&'a TraceEntry>,
    /// Declarations within the range.
    pub identifiers: Vec<&'a TraceEntry>,
    /// Latest written values within the range.
    pub values: Vec<&'a TraceEntry>,
}

/// Query front end over one run.
#[derive(Debug, Clone, Default)]
pub struct TraceHelper {
    /// The trace of the run, absent if the host produced none
    trace: Option<Arc<Trace>>,
    /// What the host reported about the run
    outcome: RunOutcome,
    /// Branch navigation state
    navigation: Navigation,
}

impl TraceHelper {
    /// Creates a helper over a trace.
    pub fn new(trace: Arc<Trace>, outcome: RunOutcome) -> Self {
        Self { trace: Some(trace), outcome, navigation: Navigation::default() }
    }

    /// Creates a helper for a run that produced no trace.
    pub fn without_trace(outcome: RunOutcome) -> Self {
        Self { trace: None, outcome, navigation: Navigation::default() }
    }

    /// Builds the trace of a host result and wraps it.
    pub fn from_run(result: RunResult) -> Self {
        let outcome = result.outcome();
        Self::new(Arc::new(make_trace(result.records)), outcome)
    }

    /// No run error was recorded and a trace is present.
    pub fn is_valid(&self) -> bool {
        self.trace.is_some() && !self.outcome.is_error()
    }

    /// The run outcome.
    pub fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }

    /// The trace, whether or not the run succeeded.
    pub fn raw_trace(&self) -> Option<&Arc<Trace>> {
        self.trace.as_ref()
    }

    /// Navigation state.
    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    fn trace(&self) -> Option<&Trace> {
        if self.outcome.is_error() {
            return None;
        }
        self.trace.as_deref()
    }

    /// Best match for a position among `entries`.
    ///
    /// The first containing entry is the initial candidate; a later entry
    /// replaces it when its range is strictly inside the candidate's.
    pub fn get_match_at_position<'a>(
        entries: impl IntoIterator<Item = &'a TraceEntry>,
        position: &Position,
    ) -> Option<&'a TraceEntry> {
        let mut best: Option<&'a TraceEntry> = None;
        for entry in entries {
            if !position_in_range(position, &entry.range) {
                continue;
            }
            match best {
                Some(current) if !contains_range_strict(&current.range, &entry.range) => {}
                _ => best = Some(entry),
            }
        }
        best
    }

    /// Entries whose range lies within `range`, in order.
    pub fn get_trace_data_in_range<'a>(
        entries: impl IntoIterator<Item = &'a TraceEntry>,
        range: &Range,
    ) -> Vec<&'a TraceEntry> {
        entries.into_iter().filter(|entry| contains_range(range, &entry.range)).collect()
    }

    /// Entries that start or end on the one-based `line_number`, in order.
    pub fn get_trace_data_in_line<'a>(
        entries: impl IntoIterator<Item = &'a TraceEntry>,
        line_number: usize,
    ) -> Vec<&'a TraceEntry> {
        if line_number < 1 {
            return Vec::new();
        }
        entries.into_iter().filter(|entry| range_touches_line(&entry.range, line_number)).collect()
    }

    /// The entry best describing the value at a position.
    pub fn get_values_at_position(&self, position: &Position) -> Option<&TraceEntry> {
        Self::get_match_at_position(self.trace()?.data.values(), position)
    }

    /// Latest written values within a range.
    pub fn get_values_in_range(&self, range: &Range) -> Vec<&TraceEntry> {
        Self::get_trace_data_in_range(self.get_values(), range)
    }

    /// Latest written values on a one-based line.
    pub fn get_values_in_line(&self, line_number: usize) -> Vec<&TraceEntry> {
        Self::get_trace_data_in_line(self.get_values(), line_number)
    }

    /// Declarations and the (possibly navigated) timeline.
    pub fn get_expressions(&self) -> Expressions<'_> {
        Expressions { identifiers: self.get_identifiers(), timeline: self.get_timeline() }
    }

    /// Declarations, in first-seen order.
    pub fn get_identifiers(&self) -> &[TraceEntry] {
        self.trace().map(|trace| trace.identifiers.as_slice()).unwrap_or_default()
    }

    /// Every write, in runtime order.
    pub fn get_variables(&self) -> &[TraceEntry] {
        self.trace().map(|trace| trace.variables.as_slice()).unwrap_or_default()
    }

    /// Latest write per location.
    pub fn get_values(&self) -> &[TraceEntry] {
        self.trace().map(|trace| trace.values.as_slice()).unwrap_or_default()
    }

    /// The timeline, cut at the navigated branch execution when navigating.
    pub fn get_timeline(&self) -> &[TraceEntry] {
        self.trace()
            .map(|trace| self.navigation.apply(&trace.timeline))
            .unwrap_or_default()
    }

    /// Entries of expression kinds, in runtime order.
    pub fn get_execution_trace(&self) -> Vec<&TraceEntry> {
        self.execution()
            .filter(|entry| entry.kind.is_in(TraceCategory::Expression))
            .collect()
    }

    /// All entries, in runtime order.
    pub fn get_execution_trace_all(&self) -> Vec<&TraceEntry> {
        self.execution().collect()
    }

    fn execution(&self) -> impl Iterator<Item = &TraceEntry> {
        let trace = self.trace();
        trace
            .into_iter()
            .flat_map(|trace| trace.execution.iter().filter_map(move |id| trace.data.get(id)))
    }

    /// Hit counts of the call sites and function entries.
    pub fn get_stack_block_counts(&self) -> Vec<StackBlockCount> {
        let Some(trace) = self.trace() else {
            return Vec::new();
        };
        trace
            .stack
            .iter()
            .enumerate()
            .filter_map(|(index, id)| {
                let entry = trace.data.get(id)?;
                Some(StackBlockCount {
                    index,
                    text: label_of(id).to_string(),
                    range: entry.range,
                    count: trace.hit_count(id),
                })
            })
            .collect()
    }

    /// Timeline, declarations and values within a range.
    pub fn get_trace_for_expression(&self, range: &Range) -> ExpressionTrace<'_> {
        ExpressionTrace {
            timeline: Self::get_trace_data_in_range(self.get_timeline(), range),
            identifiers: Self::get_trace_data_in_range(self.get_identifiers(), range),
            values: Self::get_trace_data_in_range(self.get_values(), range),
        }
    }

    /// Execution indices whose location lies within a range.
    pub fn get_branching_for_expression(&self, range: &Range) -> Vec<usize> {
        self.get_execution_trace_all()
            .into_iter()
            .enumerate()
            .filter(|(_, entry)| contains_range(range, &entry.range))
            .map(|(index, _)| index)
            .collect()
    }

    /// Calls open at a timeline index, outermost first.
    pub fn get_call_path_at(&self, timeline_index: usize) -> Vec<BranchSeed> {
        let Some(trace) = self.trace() else {
            return Vec::new();
        };
        call_path::call_path_at(trace, &trace.timeline, timeline_index)
    }

    /// Calls open at the last execution within a range.
    pub fn get_call_path_for_expression(&self, range: &Range) -> Vec<BranchSeed> {
        match self.get_branching_for_expression(range).last() {
            Some(&index) => self.get_call_path_at(index),
            None => Vec::new(),
        }
    }

    /// Turns branch navigation on.
    pub fn start_navigation(&mut self) {
        self.navigation.start();
    }

    /// Turns branch navigation off and forgets the selection.
    pub fn stop_navigation(&mut self) {
        self.navigation.stop();
    }

    /// Flips branch navigation.
    pub fn toggle_navigation(&mut self) {
        self.navigation.toggle();
    }

    /// Cuts the timeline right after the selected execution of a branch.
    pub fn navigate_to_branch(
        &mut self,
        branch_range: Range,
        branch_index: usize,
        branch_max: usize,
    ) -> &[TraceEntry] {
        let selection = BranchSelection { range: branch_range, branch_index, branch_max };
        if let Some(trace) = self.trace.as_deref().filter(|_| !self.outcome.is_error()) {
            self.navigation.navigate(&trace.timeline, selection);
            debug!(
                range = %branch_range,
                branch_index,
                branch_max,
                visible = self.navigation.apply(&trace.timeline).len(),
                "Navigated to branch"
            );
        }
        self.get_timeline()
    }

    /// Restores the full timeline.
    pub fn reset_navigation(&mut self) {
        self.navigation.reset();
    }
}

#[cfg(test)]
mod tests {
    use scr_common::{CallMarker, RawRecord, TraceKind};
    use serde_json::json;

    use super::*;

    fn record(id: &str, kind: TraceKind, range: Range, value: serde_json::Value) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            kind: kind.as_str().to_string(),
            range: Some(range),
            value,
            is_callback: false,
            marker: None,
        }
    }

    fn helper(records: Vec<RawRecord>) -> TraceHelper {
        TraceHelper::from_run(RunResult { records, ..Default::default() })
    }

    #[test]
    fn test_position_prefers_strictly_enclosed_entry() {
        let helper = helper(vec![
            record("a:1", TraceKind::BinaryExpression, Range::from_coords(0, 0, 0, 10), json!(3)),
            record("b:2", TraceKind::Identifier, Range::from_coords(0, 2, 0, 5), json!(1)),
        ]);
        let found = helper.get_values_at_position(&Position::new(0, 3)).unwrap();
        assert_eq!(found.id, "b:2");

        let found = helper.get_values_at_position(&Position::new(0, 8)).unwrap();
        assert_eq!(found.id, "a:1");

        assert!(helper.get_values_at_position(&Position::new(3, 0)).is_none());
    }

    #[test]
    fn test_line_queries() {
        let helper = helper(vec![
            record("x:1", TraceKind::VariableDeclarator, Range::from_coords(0, 4, 0, 9), json!(1)),
            record("y:2", TraceKind::VariableDeclarator, Range::from_coords(1, 4, 3, 1), json!(2)),
        ]);
        assert!(helper.get_values_in_line(0).is_empty());
        assert_eq!(helper.get_values_in_line(1).len(), 1);
        assert_eq!(helper.get_values_in_line(2).len(), 1);
        assert!(helper.get_values_in_line(3).is_empty());
        assert_eq!(helper.get_values_in_line(4)[0].id, "y:2");

        let in_range = helper.get_values_in_range(&Range::from_coords(0, 0, 0, 20));
        assert_eq!(in_range.len(), 1);
        assert_eq!(in_range[0].id, "x:1");
    }

    #[test]
    fn test_execution_trace_filters_kinds() {
        let range = Range::from_coords(0, 0, 0, 1);
        let helper = helper(vec![
            record("p:1", TraceKind::Parameter, range, json!(1)),
            record("x:2", TraceKind::Identifier, range, json!(1)),
            record("if:3", TraceKind::IfStatement, range, json!(true)),
            record("x:2", TraceKind::Identifier, range, json!(2)),
        ]);
        let ids: Vec<_> = helper.get_execution_trace().into_iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["x:2", "x:2"]);
        assert_eq!(helper.get_execution_trace_all().len(), 4);
    }

    #[test]
    fn test_stack_block_counts() {
        let range = Range::from_coords(2, 0, 2, 6);
        let mut enter = record("console.log:4", TraceKind::CallExpression, range, json!(null));
        enter.marker = Some(CallMarker::Enter);
        let mut exit = enter.clone();
        exit.marker = Some(CallMarker::Exit);

        let helper = helper(vec![enter.clone(), exit.clone(), enter, exit]);
        let counts = helper.get_stack_block_counts();
        assert_eq!(
            counts,
            vec![StackBlockCount { index: 0, text: "console.log".to_string(), range, count: 4 }]
        );
    }

    #[test]
    fn test_failed_run_degrades_to_empty() {
        let mut result = RunResult {
            records: vec![record("x:1", TraceKind::Identifier, Range::default(), json!(1))],
            ..Default::default()
        };
        result.error = Some("ReferenceError: y is not defined".to_string());
        let mut helper = TraceHelper::from_run(result);

        assert!(!helper.is_valid());
        assert!(helper.get_values_at_position(&Position::new(0, 0)).is_none());
        assert!(helper.get_execution_trace_all().is_empty());
        assert!(helper.get_stack_block_counts().is_empty());
        assert!(helper.navigate_to_branch(Range::default(), 0, 1).is_empty());
        assert!(helper.raw_trace().is_some());

        let helper = TraceHelper::without_trace(RunOutcome::success());
        assert!(!helper.is_valid());
        assert!(helper.get_timeline().is_empty());
    }

    #[test]
    fn test_navigation_cuts_expression_trace() {
        let branch = Range::from_coords(1, 0, 3, 1);
        let inner = Range::from_coords(2, 2, 2, 3);
        let mut records = Vec::new();
        for i in 0..3 {
            records.push(record("if:1", TraceKind::IfStatement, branch, json!(true)));
            records.push(record("x:2", TraceKind::Identifier, inner, json!(i)));
            records.push(record("if:1", TraceKind::IfStatement, branch, json!(true)));
        }
        let mut helper = helper(records);
        assert_eq!(helper.get_trace_for_expression(&branch).timeline.len(), 9);

        let visible = helper.navigate_to_branch(branch, 1, 3);
        // third occurrence of the branch is at index 3
        assert_eq!(visible.len(), 4);
        assert_eq!(helper.get_trace_for_expression(&branch).timeline.len(), 4);
        assert_eq!(helper.get_branching_for_expression(&inner), vec![1, 4, 7]);

        helper.reset_navigation();
        assert_eq!(helper.get_timeline().len(), 9);
        helper.stop_navigation();
        assert!(!helper.navigation().is_active());
    }
}
