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

//! Location map produced alongside instrumented source.

use std::ops::Deref;

use indexmap::IndexMap;
use scr_common::{CallMarker, Range, RawRecord, TraceKind};
use serde::{Deserialize, Serialize};

use crate::ProbeNames;

/// What the instrumenter knows about one tracked location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Source range of the tracked construct.
    pub range: Range,
    /// Kind of the tracked construct.
    #[serde(rename = "type")]
    pub kind: TraceKind,
    /// Lexically inside a function passed as a call argument.
    pub is_callback: bool,
}

/// Which probe function fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Value capture.
    Value,
    /// Before a call.
    PreCall,
    /// After a call, with its result.
    PostCall,
}

impl ProbeKind {
    /// Maps a configured probe name back to its kind.
    pub fn from_name(names: &ProbeNames, name: &str) -> Option<Self> {
        if name == names.value {
            Some(Self::Value)
        } else if name == names.pre_call {
            Some(Self::PreCall)
        } else if name == names.post_call {
            Some(Self::PostCall)
        } else {
            None
        }
    }
}

/// Tracked locations by id, in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationMap(IndexMap<String, Location>);

impl LocationMap {
    /// Create a new empty map
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: String, location: Location) {
        self.0.insert(id, location);
    }

    /// Range of every location, by id.
    pub fn ranges(&self) -> impl Iterator<Item = (&str, &Range)> {
        self.0.iter().map(|(id, location)| (id.as_str(), &location.range))
    }

    /// Turns a probe invocation into the raw record a host should emit.
    ///
    /// The pre-call probe carries no value. Unknown ids resolve to `None`.
    pub fn resolve(
        &self,
        probe: ProbeKind,
        id: &str,
        value: serde_json::Value,
    ) -> Option<RawRecord> {
        let location = self.0.get(id)?;
        let (marker, value) = match probe {
            ProbeKind::Value => (None, value),
            ProbeKind::PreCall => (Some(CallMarker::Enter), serde_json::Value::Null),
            ProbeKind::PostCall => (Some(CallMarker::Exit), value),
        };
        Some(RawRecord {
            id: id.to_string(),
            kind: location.kind.as_str().to_string(),
            range: Some(location.range),
            value,
            is_callback: location.is_callback,
            marker,
        })
    }
}

impl Deref for LocationMap {
    type Target = IndexMap<String, Location>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
