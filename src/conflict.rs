// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
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

//! Double-booking detection.
//!
//! A conflict is an existing, non-cancelled session that occupies the same
//! instructor, vehicle, or student over an overlapping `[start, end)` window.
//! Back-to-back sessions (one ends exactly when the next starts) are not
//! conflicts.

use crate::base::SessionId;
use crate::interval::TimeInterval;
use crate::resource::ResourceRef;
use crate::session::Session;
use crate::store::Tables;
use serde::{Deserialize, Serialize};

/// An overlapping session, tagged with the resource it collides on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub resource: ResourceRef,
    pub session: Session,
}

/// Read-only conflict queries over a table view.
///
/// Never mutates; calling it repeatedly against the same view gives the same
/// answer.
pub struct ConflictDetector;

impl ConflictDetector {
    /// Non-cancelled sessions on `resource` overlapping `candidate`, ordered
    /// by start time.
    ///
    /// `exclude` drops one session from consideration, so a session being
    /// edited does not collide with its own stored row.
    pub fn find_conflicts(
        tables: &Tables,
        resource: ResourceRef,
        candidate: &TimeInterval,
        exclude: Option<SessionId>,
    ) -> Vec<Session> {
        let mut conflicts: Vec<Session> = tables
            .sessions_for(resource)
            .filter(|s| !s.is_cancelled())
            .filter(|s| Some(s.id) != exclude)
            .filter(|s| s.interval.overlaps(candidate))
            .cloned()
            .collect();
        conflicts.sort_by_key(|s| (s.start_datetime(), s.id));
        conflicts
    }

    /// Runs [`find_conflicts`](Self::find_conflicts) for every resource and
    /// tags each hit with the resource it was found on.
    ///
    /// A session sharing both the instructor and the vehicle shows up once
    /// per shared resource.
    pub fn find_all(
        tables: &Tables,
        resources: &[ResourceRef],
        candidate: &TimeInterval,
        exclude: Option<SessionId>,
    ) -> Vec<Conflict> {
        let conflicts: Vec<Conflict> = resources
            .iter()
            .flat_map(|&resource| {
                Self::find_conflicts(tables, resource, candidate, exclude)
                    .into_iter()
                    .map(move |session| Conflict { resource, session })
            })
            .collect();
        if !conflicts.is_empty() {
            tracing::debug!(
                count = conflicts.len(),
                start = %candidate.start(),
                end = %candidate.end(),
                "scheduling conflicts found"
            );
        }
        conflicts
    }
}

/// Distinct ids of the sessions in `conflicts`, in first-seen order.
pub(crate) fn conflicting_ids(conflicts: &[Conflict]) -> Vec<SessionId> {
    let mut ids: Vec<SessionId> = Vec::with_capacity(conflicts.len());
    for conflict in conflicts {
        if !ids.contains(&conflict.session.id) {
            ids.push(conflict.session.id);
        }
    }
    ids
}
