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

//! Transactional row store.
//!
//! The [`Store`] holds the committed [`Tables`]. A [`Transaction`] takes the
//! store lock for its whole lifetime and works on a private copy of the
//! tables; [`Transaction::commit`] swaps that copy in, anything else
//! (an explicit [`Transaction::rollback`], an error, or a drop) discards it.
//! Readers inside a transaction see its pending writes.
//!
//! The store enforces the constraints a relational schema would:
//!
//! | Constraint | Rows |
//! |------------|------|
//! | unique | `students.cin`, `payments.receipt_number`, `vehicles.plate_number` |
//! | foreign key | `payments.student_id`, `sessions.{student,instructor,vehicle}_id` |
//! | check | `students.balance = total_paid - total_due`, totals `>= 0`, `sessions.end > start` |
//!
//! Writes are crate-private: rows change only through the scheduling and
//! ledger services.

use crate::base::{InstructorId, PaymentId, SessionId, StudentId, VehicleId};
use crate::error::StoreError;
use crate::payment::Payment;
use crate::resource::{Instructor, ResourceRef, Vehicle};
use crate::session::Session;
use crate::student::Student;
use crate::SchoolError;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
struct Sequences {
    student: u32,
    instructor: u32,
    vehicle: u32,
    payment: u32,
    session: u32,
}

fn next(counter: &mut u32) -> u32 {
    *counter += 1;
    *counter
}

/// A consistent view of every table.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    students: BTreeMap<StudentId, Student>,
    instructors: BTreeMap<InstructorId, Instructor>,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    payments: BTreeMap<PaymentId, Payment>,
    sessions: BTreeMap<SessionId, Session>,
    sequences: Sequences,
}

impl Tables {
    pub fn student(&self, id: StudentId) -> Option<&Student> {
        self.students.get(&id)
    }

    pub fn student_by_cin(&self, cin: &str) -> Option<&Student> {
        self.students.values().find(|s| s.cin == cin)
    }

    pub fn students(&self) -> impl Iterator<Item = &Student> {
        self.students.values()
    }

    pub fn instructor(&self, id: InstructorId) -> Option<&Instructor> {
        self.instructors.get(&id)
    }

    pub fn instructors(&self) -> impl Iterator<Item = &Instructor> {
        self.instructors.values()
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn payment(&self, id: PaymentId) -> Option<&Payment> {
        self.payments.get(&id)
    }

    pub fn payments(&self) -> impl Iterator<Item = &Payment> {
        self.payments.values()
    }

    pub fn payments_for(&self, student_id: StudentId) -> impl Iterator<Item = &Payment> {
        self.payments
            .values()
            .filter(move |p| p.student_id == student_id)
    }

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Sessions occupying `resource`, cancelled ones included.
    pub fn sessions_for(&self, resource: ResourceRef) -> impl Iterator<Item = &Session> {
        self.sessions.values().filter(move |s| s.uses(resource))
    }

    fn check_student(&self, student: &Student) -> Result<(), StoreError> {
        let violation = |detail: &str| StoreError::CheckViolation {
            table: "students",
            id: student.id.0,
            detail: detail.to_string(),
        };
        if student.total_due < Decimal::ZERO {
            return Err(violation("total_due must not be negative"));
        }
        if student.total_paid < Decimal::ZERO {
            return Err(violation("total_paid must not be negative"));
        }
        if !student.is_consistent() {
            return Err(violation("balance must equal total_paid - total_due"));
        }
        if let Some(other) = self.student_by_cin(&student.cin)
            && other.id != student.id
        {
            return Err(StoreError::UniqueViolation {
                table: "students",
                column: "cin",
                value: student.cin.clone(),
            });
        }
        Ok(())
    }

    fn check_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        if !self.students.contains_key(&payment.student_id) {
            return Err(StoreError::ForeignKeyViolation {
                table: "payments",
                column: "student_id",
                id: payment.student_id.0,
            });
        }
        if self
            .payments
            .values()
            .any(|p| p.id != payment.id && p.receipt_number == payment.receipt_number)
        {
            return Err(StoreError::UniqueViolation {
                table: "payments",
                column: "receipt_number",
                value: payment.receipt_number.clone(),
            });
        }
        Ok(())
    }

    fn check_session(&self, session: &Session) -> Result<(), StoreError> {
        let missing = |column: &'static str, id: u32| StoreError::ForeignKeyViolation {
            table: "sessions",
            column,
            id,
        };
        if session.end_datetime() <= session.start_datetime() {
            return Err(StoreError::CheckViolation {
                table: "sessions",
                id: session.id.0,
                detail: "end_datetime must be after start_datetime".to_string(),
            });
        }
        if !self.students.contains_key(&session.student_id) {
            return Err(missing("student_id", session.student_id.0));
        }
        if let Some(id) = session.instructor_id
            && !self.instructors.contains_key(&id)
        {
            return Err(missing("instructor_id", id.0));
        }
        if let Some(id) = session.vehicle_id
            && !self.vehicles.contains_key(&id)
        {
            return Err(missing("vehicle_id", id.0));
        }
        Ok(())
    }
}

/// In-process transactional store.
///
/// One [`Transaction`] at a time: [`Store::begin`] blocks until the previous
/// one has committed or rolled back. Do not call [`Store::read`] from inside
/// a transaction on the same thread; read through the transaction instead.
#[derive(Debug, Default)]
pub struct Store {
    tables: Mutex<Tables>,
    fail_next_commit: AtomicBool,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Transaction<'_> {
        let committed = self.tables.lock();
        let working = committed.clone();
        Transaction {
            committed,
            working,
            fail_commit: &self.fail_next_commit,
            finished: false,
        }
    }

    /// Runs `f` in one transaction: commits on `Ok`, rolls back on `Err`.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, or [`StoreError::CommitFailed`] if the commit is
    /// refused, in which case nothing `f` wrote is kept.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, SchoolError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, SchoolError>,
    {
        let mut tx = self.begin();
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Runs `f` against the committed tables.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&*self.tables.lock())
    }

    /// Makes the next commit fail, leaving the committed tables untouched.
    ///
    /// Test hook for commit-failure paths; not part of the supported API.
    #[doc(hidden)]
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

/// Unit of work over a private copy of the tables.
pub struct Transaction<'a> {
    committed: MutexGuard<'a, Tables>,
    working: Tables,
    fail_commit: &'a AtomicBool,
    finished: bool,
}

impl Deref for Transaction<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &self.working
    }
}

impl Transaction<'_> {
    /// # Errors
    ///
    /// [`StoreError::CommitFailed`] if the store refuses the commit; the
    /// transaction is rolled back.
    pub fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            tracing::error!("commit refused, rolling back");
            return Err(StoreError::CommitFailed);
        }
        *self.committed = std::mem::take(&mut self.working);
        Ok(())
    }

    pub fn rollback(mut self) {
        self.finished = true;
        tracing::debug!("transaction rolled back");
    }

    // ── Students ─────────────────────────────────────────────

    pub(crate) fn insert_student(
        &mut self,
        cin: String,
        full_name: String,
        hours_planned: Decimal,
    ) -> Result<Student, StoreError> {
        let id = StudentId(next(&mut self.working.sequences.student));
        let student = Student::new(id, cin, full_name, hours_planned);
        self.working.check_student(&student)?;
        self.working.students.insert(id, student.clone());
        Ok(student)
    }

    pub(crate) fn update_student(&mut self, student: Student) -> Result<(), StoreError> {
        if !self.working.students.contains_key(&student.id) {
            return Err(StoreError::RowNotFound {
                table: "students",
                id: student.id.0,
            });
        }
        self.working.check_student(&student)?;
        self.working.students.insert(student.id, student);
        Ok(())
    }

    /// Restricts on dependent payments and sessions.
    pub(crate) fn delete_student(&mut self, id: StudentId) -> Result<Student, StoreError> {
        if self.working.payments_for(id).next().is_some() {
            return Err(StoreError::ForeignKeyViolation {
                table: "payments",
                column: "student_id",
                id: id.0,
            });
        }
        if self
            .working
            .sessions_for(ResourceRef::Student(id))
            .next()
            .is_some()
        {
            return Err(StoreError::ForeignKeyViolation {
                table: "sessions",
                column: "student_id",
                id: id.0,
            });
        }
        self.working
            .students
            .remove(&id)
            .ok_or(StoreError::RowNotFound {
                table: "students",
                id: id.0,
            })
    }

    // ── Instructors and vehicles ─────────────────────────────

    pub(crate) fn insert_instructor(&mut self, full_name: String) -> Instructor {
        let id = InstructorId(next(&mut self.working.sequences.instructor));
        let instructor = Instructor { id, full_name };
        self.working.instructors.insert(id, instructor.clone());
        instructor
    }

    pub(crate) fn insert_vehicle(
        &mut self,
        plate_number: String,
        model: String,
    ) -> Result<Vehicle, StoreError> {
        if self
            .working
            .vehicles
            .values()
            .any(|v| v.plate_number == plate_number)
        {
            return Err(StoreError::UniqueViolation {
                table: "vehicles",
                column: "plate_number",
                value: plate_number,
            });
        }
        let id = VehicleId(next(&mut self.working.sequences.vehicle));
        let vehicle = Vehicle {
            id,
            plate_number,
            model,
        };
        self.working.vehicles.insert(id, vehicle.clone());
        Ok(vehicle)
    }

    // ── Payments ─────────────────────────────────────────────

    /// Allocates an id and inserts the row `build` produces for it.
    pub(crate) fn insert_payment(
        &mut self,
        build: impl FnOnce(PaymentId) -> Payment,
    ) -> Result<Payment, StoreError> {
        let id = PaymentId(next(&mut self.working.sequences.payment));
        let payment = build(id);
        debug_assert_eq!(payment.id, id);
        self.working.check_payment(&payment)?;
        self.working.payments.insert(id, payment.clone());
        Ok(payment)
    }

    pub(crate) fn update_payment(&mut self, payment: Payment) -> Result<(), StoreError> {
        if !self.working.payments.contains_key(&payment.id) {
            return Err(StoreError::RowNotFound {
                table: "payments",
                id: payment.id.0,
            });
        }
        self.working.check_payment(&payment)?;
        self.working.payments.insert(payment.id, payment);
        Ok(())
    }

    pub(crate) fn delete_payment(&mut self, id: PaymentId) -> Result<Payment, StoreError> {
        self.working
            .payments
            .remove(&id)
            .ok_or(StoreError::RowNotFound {
                table: "payments",
                id: id.0,
            })
    }

    // ── Sessions ─────────────────────────────────────────────

    pub(crate) fn insert_session(
        &mut self,
        build: impl FnOnce(SessionId) -> Session,
    ) -> Result<Session, StoreError> {
        let id = SessionId(next(&mut self.working.sequences.session));
        let session = build(id);
        debug_assert_eq!(session.id, id);
        self.working.check_session(&session)?;
        self.working.sessions.insert(id, session.clone());
        Ok(session)
    }

    pub(crate) fn update_session(&mut self, session: Session) -> Result<(), StoreError> {
        if !self.working.sessions.contains_key(&session.id) {
            return Err(StoreError::RowNotFound {
                table: "sessions",
                id: session.id.0,
            });
        }
        self.working.check_session(&session)?;
        self.working.sessions.insert(session.id, session);
        Ok(())
    }

    pub(crate) fn delete_session(&mut self, id: SessionId) -> Result<Session, StoreError> {
        self.working
            .sessions
            .remove(&id)
            .ok_or(StoreError::RowNotFound {
                table: "sessions",
                id: id.0,
            })
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("transaction dropped without commit, rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::TimeInterval;
    use crate::payment::PaymentMethod;
    use crate::session::{SessionStatus, SessionType};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn enroll(tx: &mut Transaction<'_>, cin: &str) -> Student {
        tx.insert_student(cin.into(), "Test Student".into(), Decimal::ZERO)
            .unwrap()
    }

    fn payment_row(id: PaymentId, student_id: StudentId, receipt: &str) -> Payment {
        Payment {
            id,
            receipt_number: receipt.into(),
            student_id,
            amount: dec!(10),
            payment_method: PaymentMethod::Cash,
            payment_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            category: String::new(),
            description: String::new(),
            is_validated: false,
            validated_by: None,
            is_cancelled: false,
            cancellation_reason: None,
        }
    }

    #[test]
    fn commit_publishes_writes() {
        let store = Store::new();
        let mut tx = store.begin();
        let student = enroll(&mut tx, "A1");
        tx.commit().unwrap();

        assert!(store.read(|t| t.student(student.id).is_some()));
    }

    #[test]
    fn drop_discards_writes() {
        let store = Store::new();
        {
            let mut tx = store.begin();
            enroll(&mut tx, "A1");
        }
        assert_eq!(store.read(|t| t.students().count()), 0);
    }

    #[test]
    fn failed_commit_discards_writes() {
        let store = Store::new();
        store.fail_next_commit();
        let mut tx = store.begin();
        enroll(&mut tx, "A1");
        assert_eq!(tx.commit(), Err(StoreError::CommitFailed));
        assert_eq!(store.read(|t| t.students().count()), 0);

        // Only the next commit fails.
        let mut tx = store.begin();
        enroll(&mut tx, "A1");
        assert!(tx.commit().is_ok());
    }

    #[test]
    fn transaction_reads_its_own_writes() {
        let store = Store::new();
        let mut tx = store.begin();
        let student = enroll(&mut tx, "A1");
        assert_eq!(tx.student(student.id), Some(&student));
    }

    #[test]
    fn closure_transaction_rolls_back_on_error() {
        let store = Store::new();
        let result: Result<(), SchoolError> = store.transaction(|tx| {
            enroll(tx, "A1");
            Err(SchoolError::ReasonRequired)
        });
        assert_eq!(result, Err(SchoolError::ReasonRequired));
        assert_eq!(store.read(|t| t.students().count()), 0);
    }

    #[test]
    fn cin_is_unique() {
        let store = Store::new();
        let mut tx = store.begin();
        enroll(&mut tx, "A1");
        let err = tx
            .insert_student("A1".into(), "Other".into(), Decimal::ZERO)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::UniqueViolation { column: "cin", .. }
        ));
    }

    #[test]
    fn inconsistent_balance_is_rejected() {
        let store = Store::new();
        let mut tx = store.begin();
        let mut student = enroll(&mut tx, "A1");
        student.total_paid = dec!(100);
        let err = tx.update_student(student).unwrap_err();
        assert!(matches!(err, StoreError::CheckViolation { table: "students", .. }));
    }

    #[test]
    fn payment_requires_existing_student() {
        let store = Store::new();
        let mut tx = store.begin();
        let err = tx
            .insert_payment(|id| payment_row(id, StudentId(99), "R-1"))
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::ForeignKeyViolation {
                table: "payments",
                column: "student_id",
                id: 99
            }
        );
    }

    #[test]
    fn receipt_number_is_unique() {
        let store = Store::new();
        let mut tx = store.begin();
        let student = enroll(&mut tx, "A1");
        tx.insert_payment(|id| payment_row(id, student.id, "R-1"))
            .unwrap();
        let err = tx
            .insert_payment(|id| payment_row(id, student.id, "R-1"))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::UniqueViolation {
                column: "receipt_number",
                ..
            }
        ));
    }

    #[test]
    fn session_foreign_keys_are_checked() {
        let store = Store::new();
        let mut tx = store.begin();
        let student = enroll(&mut tx, "A1");
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let interval = TimeInterval::new(
            day.and_hms_opt(9, 0, 0).unwrap(),
            day.and_hms_opt(10, 0, 0).unwrap(),
        )
        .unwrap();
        let err = tx
            .insert_session(|id| Session {
                id,
                student_id: student.id,
                instructor_id: Some(InstructorId(5)),
                vehicle_id: None,
                interval,
                status: SessionStatus::Scheduled,
                session_type: SessionType::Driving,
                conflict_override: None,
            })
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::ForeignKeyViolation {
                table: "sessions",
                column: "instructor_id",
                id: 5
            }
        );
    }

    #[test]
    fn student_delete_restricts_on_payments() {
        let store = Store::new();
        let mut tx = store.begin();
        let student = enroll(&mut tx, "A1");
        tx.insert_payment(|id| payment_row(id, student.id, "R-1"))
            .unwrap();
        assert!(matches!(
            tx.delete_student(student.id),
            Err(StoreError::ForeignKeyViolation { table: "payments", .. })
        ));
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let store = Store::new();
        let mut tx = store.begin();
        let first = enroll(&mut tx, "A1");
        tx.delete_student(first.id).unwrap();
        let second = enroll(&mut tx, "A2");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn plate_number_is_unique() {
        let store = Store::new();
        let mut tx = store.begin();
        tx.insert_vehicle("12345-A-6".into(), "Clio".into()).unwrap();
        assert!(tx.insert_vehicle("12345-A-6".into(), "208".into()).is_err());
    }
}
