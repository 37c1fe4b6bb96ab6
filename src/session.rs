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

//! Training session records.

use crate::base::{InstructorId, SessionId, StudentId, VehicleId};
use crate::interval::TimeInterval;
use crate::resource::ResourceRef;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Status changes are operator-driven; nothing transitions automatically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Theory,
    #[default]
    Driving,
    Exam,
}

/// Recorded when a session is saved despite overlapping another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictOverride {
    pub acknowledged_by: String,
    pub conflicting: Vec<SessionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub student_id: StudentId,
    pub instructor_id: Option<InstructorId>,
    pub vehicle_id: Option<VehicleId>,
    pub interval: TimeInterval,
    pub status: SessionStatus,
    pub session_type: SessionType,
    pub conflict_override: Option<ConflictOverride>,
}

impl Session {
    pub fn start_datetime(&self) -> NaiveDateTime {
        self.interval.start()
    }

    pub fn end_datetime(&self) -> NaiveDateTime {
        self.interval.end()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == SessionStatus::Cancelled
    }

    /// Whether this session occupies `resource`.
    pub fn uses(&self, resource: ResourceRef) -> bool {
        match resource {
            ResourceRef::Student(id) => self.student_id == id,
            ResourceRef::Instructor(id) => self.instructor_id == Some(id),
            ResourceRef::Vehicle(id) => self.vehicle_id == Some(id),
        }
    }

    /// Every resource reference present on the session; the student always.
    pub fn resources(&self) -> Vec<ResourceRef> {
        resources_of(self.student_id, self.instructor_id, self.vehicle_id)
    }
}

pub(crate) fn resources_of(
    student_id: StudentId,
    instructor_id: Option<InstructorId>,
    vehicle_id: Option<VehicleId>,
) -> Vec<ResourceRef> {
    let mut resources = Vec::with_capacity(3);
    if let Some(id) = instructor_id {
        resources.push(ResourceRef::Instructor(id));
    }
    if let Some(id) = vehicle_id {
        resources.push(ResourceRef::Vehicle(id));
    }
    resources.push(ResourceRef::Student(student_id));
    resources
}

/// A session to be created. Bounds are validated by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDraft {
    pub student_id: StudentId,
    pub instructor_id: Option<InstructorId>,
    pub vehicle_id: Option<VehicleId>,
    pub start_datetime: NaiveDateTime,
    pub end_datetime: NaiveDateTime,
    pub session_type: SessionType,
    pub status: SessionStatus,
}

impl SessionDraft {
    pub fn new(
        student_id: StudentId,
        start_datetime: NaiveDateTime,
        end_datetime: NaiveDateTime,
    ) -> Self {
        Self {
            student_id,
            instructor_id: None,
            vehicle_id: None,
            start_datetime,
            end_datetime,
            session_type: SessionType::default(),
            status: SessionStatus::default(),
        }
    }

    pub fn with_instructor(mut self, instructor_id: InstructorId) -> Self {
        self.instructor_id = Some(instructor_id);
        self
    }

    pub fn with_vehicle(mut self, vehicle_id: VehicleId) -> Self {
        self.vehicle_id = Some(vehicle_id);
        self
    }

    pub fn resources(&self) -> Vec<ResourceRef> {
        resources_of(self.student_id, self.instructor_id, self.vehicle_id)
    }
}

/// Partial update. `instructor_id: Some(None)` unassigns the instructor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPatch {
    pub student_id: Option<StudentId>,
    pub instructor_id: Option<Option<InstructorId>>,
    pub vehicle_id: Option<Option<VehicleId>>,
    pub start_datetime: Option<NaiveDateTime>,
    pub end_datetime: Option<NaiveDateTime>,
    pub session_type: Option<SessionType>,
    pub status: Option<SessionStatus>,
}

impl SessionPatch {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn reschedule(start_datetime: NaiveDateTime, end_datetime: NaiveDateTime) -> Self {
        Self {
            start_datetime: Some(start_datetime),
            end_datetime: Some(end_datetime),
            ..Self::default()
        }
    }

    /// Whether applying the patch to `session` moves it in time, changes who
    /// or what it occupies, or brings it back from cancellation.
    pub(crate) fn changes_schedule_of(&self, session: &Session) -> bool {
        let moved = self
            .start_datetime
            .is_some_and(|start| start != session.start_datetime())
            || self
                .end_datetime
                .is_some_and(|end| end != session.end_datetime());
        let reassigned = self.student_id.is_some_and(|id| id != session.student_id)
            || self
                .instructor_id
                .is_some_and(|id| id != session.instructor_id)
            || self.vehicle_id.is_some_and(|id| id != session.vehicle_id);
        let reactivated = session.is_cancelled()
            && self
                .status
                .is_some_and(|status| status != SessionStatus::Cancelled);
        moved || reassigned || reactivated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn session() -> Session {
        Session {
            id: SessionId(1),
            student_id: StudentId(1),
            instructor_id: Some(InstructorId(2)),
            vehicle_id: None,
            interval: TimeInterval::new(at(9), at(10)).unwrap(),
            status: SessionStatus::Scheduled,
            session_type: SessionType::Driving,
            conflict_override: None,
        }
    }

    #[test]
    fn resources_always_include_student() {
        assert_eq!(
            session().resources(),
            vec![
                ResourceRef::Instructor(InstructorId(2)),
                ResourceRef::Student(StudentId(1))
            ]
        );
    }

    #[test]
    fn uses_matches_assigned_resources_only() {
        let s = session();
        assert!(s.uses(ResourceRef::Instructor(InstructorId(2))));
        assert!(!s.uses(ResourceRef::Instructor(InstructorId(3))));
        assert!(!s.uses(ResourceRef::Vehicle(VehicleId(2))));
    }

    #[test]
    fn status_only_patch_does_not_change_schedule() {
        let patch = SessionPatch::status(SessionStatus::Completed);
        assert!(!patch.changes_schedule_of(&session()));
    }

    #[test]
    fn unchanged_times_do_not_change_schedule() {
        let patch = SessionPatch::reschedule(at(9), at(10));
        assert!(!patch.changes_schedule_of(&session()));
        let patch = SessionPatch::reschedule(at(9), at(11));
        assert!(patch.changes_schedule_of(&session()));
    }

    #[test]
    fn unassigning_instructor_changes_schedule() {
        let patch = SessionPatch {
            instructor_id: Some(None),
            ..SessionPatch::default()
        };
        assert!(patch.changes_schedule_of(&session()));
    }

    #[test]
    fn reactivation_changes_schedule() {
        let mut cancelled = session();
        cancelled.status = SessionStatus::Cancelled;
        assert!(SessionPatch::status(SessionStatus::Scheduled).changes_schedule_of(&cancelled));
    }
}
