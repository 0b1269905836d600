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

//! Branch navigation over the timeline.
//!
//! A branch location fires twice per execution (enter and exit), so the
//! `n`-th execution of a branch starts at occurrence `2n + 1`.

use scr_common::{range_equals, Range, TraceEntry};
use serde::{Deserialize, Serialize};

/// The branch execution the user navigated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSelection {
    /// Range of the branch location.
    pub range: Range,
    /// Zero-based execution of the branch.
    pub branch_index: usize,
    /// Number of executions of the branch.
    pub branch_max: usize,
}

/// Navigation state of a trace helper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    /// Whether queries see the navigated timeline.
    active: bool,
    /// Current selection, if any.
    selection: Option<BranchSelection>,
    /// Length of the navigated timeline prefix.
    end: Option<usize>,
}

impl Navigation {
    /// Whether navigation is on.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The current selection.
    pub fn selection(&self) -> Option<&BranchSelection> {
        self.selection.as_ref()
    }

    pub(crate) fn start(&mut self) {
        self.active = true;
    }

    pub(crate) fn stop(&mut self) {
        self.active = false;
        self.reset();
    }

    pub(crate) fn toggle(&mut self) {
        if self.active {
            self.stop();
        } else {
            self.start();
        }
    }

    pub(crate) fn reset(&mut self) {
        self.selection = None;
        self.end = None;
    }

    pub(crate) fn navigate(&mut self, timeline: &[TraceEntry], selection: BranchSelection) {
        self.active = true;
        self.end = branch_end(timeline, &selection);
        self.selection = Some(selection);
    }

    /// The part of `timeline` visible under the current navigation.
    pub fn apply<'a>(&self, timeline: &'a [TraceEntry]) -> &'a [TraceEntry] {
        match self.end {
            Some(end) if self.active => &timeline[..end.min(timeline.len())],
            _ => timeline,
        }
    }
}

/// Length of the timeline prefix that ends at the selected branch execution.
///
/// Walks the timeline counting occurrences of the branch range. The prefix
/// ends right after occurrence `2 * branch_index + 1`, unless occurrence
/// `2 * branch_max` comes first, in which case one more entry is kept. `None`
/// when neither occurrence is reached, meaning the whole timeline.
pub fn branch_end(timeline: &[TraceEntry], selection: &BranchSelection) -> Option<usize> {
    let target = selection.branch_index * 2 + 1;
    let max = selection.branch_max * 2;

    let mut hits = 0;
    for (i, entry) in timeline.iter().enumerate() {
        if !range_equals(&entry.range, &selection.range) {
            continue;
        }
        hits += 1;
        if hits == max {
            return Some((i + 2).min(timeline.len()));
        }
        if hits == target {
            return Some(i + 1);
        }
    }
    None
}
