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

//! Scheduling integration tests: conflicts, overrides and session edits.

use chrono::{NaiveDate, NaiveDateTime};
use driving_school_core::{
    Engine, InstructorId, NewStudent, OnConflict, ResourceRef, SchoolError, SessionDraft,
    SessionId, SessionPatch, SessionStatus, StoreError, StudentId, VehicleId,
};
use rust_decimal::Decimal;

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 2)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

struct School {
    engine: Engine,
    alice: StudentId,
    bob: StudentId,
    instructor: InstructorId,
    car: VehicleId,
}

fn school() -> School {
    let engine = Engine::new();
    let enroll = |cin: &str| {
        engine
            .enroll_student(NewStudent::new(cin, "Student", Decimal::ZERO))
            .into_result()
            .unwrap()
            .id()
    };
    let alice = enroll("A1");
    let bob = enroll("B1");
    let instructor = engine.register_instructor("Karim").into_result().unwrap().id;
    let car = engine
        .register_vehicle("1234-A-5", "Clio")
        .into_result()
        .unwrap()
        .id;
    School {
        engine,
        alice,
        bob,
        instructor,
        car,
    }
}

fn book(school: &School, draft: SessionDraft) -> SessionId {
    school
        .engine
        .create_session(draft, &OnConflict::Abort)
        .into_result()
        .unwrap()
        .session
        .unwrap()
        .id
}

#[test]
fn overlapping_instructor_slot_is_reported() {
    let s = school();
    let first = book(
        &s,
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(s.instructor),
    );

    let outcome = s.engine.create_session(
        SessionDraft::new(s.bob, at(9, 30), at(10, 30)).with_instructor(s.instructor),
        &OnConflict::Abort,
    );
    assert!(!outcome.success);
    let scheduled = outcome.into_result().unwrap();
    assert!(!scheduled.is_saved());
    assert_eq!(scheduled.conflicts.len(), 1);
    assert_eq!(scheduled.conflicts[0].session.id, first);
    assert_eq!(
        scheduled.conflicts[0].resource,
        ResourceRef::Instructor(s.instructor)
    );
    assert_eq!(
        s.engine
            .sessions_for(ResourceRef::Instructor(s.instructor))
            .len(),
        1
    );
}

#[test]
fn adjacent_slot_does_not_conflict() {
    let s = school();
    book(
        &s,
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(s.instructor),
    );

    let scheduled = s
        .engine
        .create_session(
            SessionDraft::new(s.bob, at(10, 0), at(11, 0)).with_instructor(s.instructor),
            &OnConflict::Abort,
        )
        .into_result()
        .unwrap();
    assert!(scheduled.is_saved());
    assert!(!scheduled.has_conflicts());
}

#[test]
fn vehicle_and_student_are_checked_too() {
    let s = school();
    book(
        &s,
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_vehicle(s.car),
    );

    let vehicle_clash = s
        .engine
        .preview_conflicts(
            &SessionDraft::new(s.bob, at(9, 15), at(9, 45)).with_vehicle(s.car),
            None,
        )
        .unwrap();
    assert_eq!(vehicle_clash.len(), 1);
    assert_eq!(vehicle_clash[0].resource, ResourceRef::Vehicle(s.car));

    let student_clash = s
        .engine
        .preview_conflicts(&SessionDraft::new(s.alice, at(9, 45), at(10, 15)), None)
        .unwrap();
    assert_eq!(student_clash.len(), 1);
    assert_eq!(student_clash[0].resource, ResourceRef::Student(s.alice));
}

#[test]
fn exclusion_hides_the_edited_session() {
    let s = school();
    let draft = SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(s.instructor);
    let id = book(&s, draft.clone());

    let excluded = s.engine.preview_conflicts(&draft, Some(id)).unwrap();
    assert!(excluded.is_empty());

    let included = s.engine.preview_conflicts(&draft, None).unwrap();
    assert!(!included.is_empty());
    assert!(included.iter().all(|c| c.session.id == id));
}

#[test]
fn inverted_interval_is_rejected_before_writing() {
    let s = school();
    let outcome = s.engine.create_session(
        SessionDraft::new(s.alice, at(10, 0), at(9, 0)),
        &OnConflict::Abort,
    );
    assert_eq!(outcome.error, Some(SchoolError::InvalidInterval));

    let empty = s.engine.create_session(
        SessionDraft::new(s.alice, at(10, 0), at(10, 0)),
        &OnConflict::Abort,
    );
    assert_eq!(empty.error, Some(SchoolError::InvalidInterval));
    assert!(s.engine.sessions_for(ResourceRef::Student(s.alice)).is_empty());
}

#[test]
fn unknown_instructor_violates_foreign_key() {
    let s = school();
    let outcome = s.engine.create_session(
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(InstructorId(99)),
        &OnConflict::Abort,
    );
    assert_eq!(
        outcome.error,
        Some(SchoolError::Store(StoreError::ForeignKeyViolation {
            table: "sessions",
            column: "instructor_id",
            id: 99,
        }))
    );
}

#[test]
fn acknowledged_override_is_recorded() {
    let s = school();
    let first = book(
        &s,
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(s.instructor),
    );

    let outcome = s.engine.create_session(
        SessionDraft::new(s.bob, at(9, 30), at(10, 30)).with_instructor(s.instructor),
        &OnConflict::proceed("front desk"),
    );
    assert!(outcome.success);
    let session = outcome.into_result().unwrap().session.unwrap();
    let ack = session.conflict_override.unwrap();
    assert_eq!(ack.acknowledged_by, "front desk");
    assert_eq!(ack.conflicting, vec![first]);
}

#[test]
fn blank_acknowledgement_is_rejected_before_writing() {
    let s = school();
    let first = book(
        &s,
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(s.instructor),
    );

    let outcome = s.engine.create_session(
        SessionDraft::new(s.bob, at(9, 30), at(10, 30)).with_instructor(s.instructor),
        &OnConflict::proceed("   "),
    );
    assert!(!outcome.success);
    assert_eq!(outcome.error, Some(SchoolError::AcknowledgementRequired));
    assert_eq!(
        s.engine
            .sessions_for(ResourceRef::Instructor(s.instructor))
            .len(),
        1
    );

    let later = book(
        &s,
        SessionDraft::new(s.bob, at(11, 0), at(12, 0)).with_instructor(s.instructor),
    );
    let outcome = s.engine.update_session(
        later,
        SessionPatch::reschedule(at(9, 30), at(10, 30)),
        &OnConflict::proceed(""),
    );
    assert_eq!(outcome.error, Some(SchoolError::AcknowledgementRequired));
    assert_eq!(s.engine.session(later).unwrap().start_datetime(), at(11, 0));
    assert!(s.engine.session(first).unwrap().conflict_override.is_none());
}

#[test]
fn acknowledgement_name_is_trimmed() {
    let s = school();
    book(
        &s,
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(s.instructor),
    );

    let session = s
        .engine
        .create_session(
            SessionDraft::new(s.bob, at(9, 30), at(10, 30)).with_instructor(s.instructor),
            &OnConflict::proceed("  front desk "),
        )
        .into_result()
        .unwrap()
        .session
        .unwrap();
    assert_eq!(session.conflict_override.unwrap().acknowledged_by, "front desk");
}

#[test]
fn status_only_update_never_blocks() {
    let s = school();
    let first = book(
        &s,
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(s.instructor),
    );
    let second = s
        .engine
        .create_session(
            SessionDraft::new(s.bob, at(9, 30), at(10, 30)).with_instructor(s.instructor),
            &OnConflict::proceed("front desk"),
        )
        .into_result()
        .unwrap()
        .session
        .unwrap()
        .id;

    let outcome = s.engine.update_session(
        second,
        SessionPatch::status(SessionStatus::Completed),
        &OnConflict::Abort,
    );
    assert!(outcome.success);
    let scheduled = outcome.into_result().unwrap();
    assert_eq!(scheduled.conflicts.len(), 1);
    assert_eq!(scheduled.conflicts[0].session.id, first);
    assert_eq!(
        s.engine.session(second).unwrap().status,
        SessionStatus::Completed
    );
}

#[test]
fn reschedule_into_conflict_is_held() {
    let s = school();
    book(
        &s,
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(s.instructor),
    );
    let later = book(
        &s,
        SessionDraft::new(s.bob, at(11, 0), at(12, 0)).with_instructor(s.instructor),
    );

    let outcome = s.engine.update_session(
        later,
        SessionPatch::reschedule(at(9, 30), at(10, 30)),
        &OnConflict::Abort,
    );
    assert!(!outcome.success);
    assert!(!outcome.into_result().unwrap().is_saved());
    assert_eq!(s.engine.session(later).unwrap().start_datetime(), at(11, 0));
}

#[test]
fn resaving_unchanged_times_reports_nothing() {
    let s = school();
    let id = book(
        &s,
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(s.instructor),
    );

    let scheduled = s
        .engine
        .update_session(
            id,
            SessionPatch::reschedule(at(9, 0), at(10, 0)),
            &OnConflict::Abort,
        )
        .into_result()
        .unwrap();
    assert!(scheduled.is_saved());
    assert!(!scheduled.has_conflicts());
}

#[test]
fn cancelled_sessions_free_the_slot() {
    let s = school();
    let first = book(
        &s,
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(s.instructor),
    );
    s.engine
        .update_session(
            first,
            SessionPatch::status(SessionStatus::Cancelled),
            &OnConflict::Abort,
        )
        .into_result()
        .unwrap();

    let scheduled = s
        .engine
        .create_session(
            SessionDraft::new(s.bob, at(9, 0), at(10, 0)).with_instructor(s.instructor),
            &OnConflict::Abort,
        )
        .into_result()
        .unwrap();
    assert!(scheduled.is_saved());

    let revived = s.engine.update_session(
        first,
        SessionPatch::status(SessionStatus::Scheduled),
        &OnConflict::Abort,
    );
    assert!(!revived.success);
    assert!(s.engine.session(first).unwrap().is_cancelled());
}

#[test]
fn delete_session_frees_the_slot() {
    let s = school();
    let id = book(
        &s,
        SessionDraft::new(s.alice, at(9, 0), at(10, 0)).with_instructor(s.instructor),
    );

    let deleted = s.engine.delete_session(id).into_result().unwrap();
    assert_eq!(deleted.id, id);
    assert!(s.engine.session(id).is_none());
    assert_eq!(
        s.engine.delete_session(id).error,
        Some(SchoolError::UnknownSession(id))
    );
    assert!(
        s.engine
            .preview_conflicts(
                &SessionDraft::new(s.bob, at(9, 0), at(10, 0)).with_instructor(s.instructor),
                None
            )
            .unwrap()
            .is_empty()
    );
}
