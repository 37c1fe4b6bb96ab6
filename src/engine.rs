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

//! Operation facade.
//!
//! The [`Engine`] is what a controller talks to. Each mutating call is one
//! logical operation: it opens exactly one transaction, runs the scheduling
//! or ledger services inside it, commits, and only then publishes change
//! events. The answer is an [`Outcome`] carrying a displayable message.
//!
//! # Operations
//!
//! | Area | Operations |
//! |------|------------|
//! | Students | enroll, charge, training hours, delete |
//! | Resources | register instructor, register vehicle |
//! | Payments | create, amend, validate, cancel |
//! | Sessions | create, update, delete, preview conflicts |
//!
//! # Failure reporting
//!
//! Validation and not-found failures are logged at `warn`, persistence and
//! contract failures at `error`. A failed operation leaves the store exactly
//! as it was; callers holding a cached [`Student`] should pass it to
//! [`Engine::refresh_student`].

use crate::base::{PaymentId, SessionId, StudentId};
use crate::conflict::Conflict;
use crate::config::SchoolConfig;
use crate::error::ErrorCategory;
use crate::events::{EventBus, PaymentChange, SchoolEvent, SessionChange, StudentChange, Topic};
use crate::ledger::{LedgerEngine, Reconciliation};
use crate::lifecycle::PaymentLifecycle;
use crate::money;
use crate::outcome::Outcome;
use crate::payment::{NewPayment, Payment, PaymentAmendment, PaymentMethod};
use crate::resource::{Instructor, ResourceRef, Vehicle};
use crate::scheduler::{OnConflict, Scheduled, SessionScheduler};
use crate::session::{Session, SessionDraft, SessionPatch};
use crate::stats;
use crate::store::{Store, Transaction};
use crate::student::{NewStudent, Student};
use crate::SchoolError;
use crossbeam::channel::Receiver;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Scheduling and ledger engine for one school.
///
/// # Invariants
///
/// - `balance == total_paid - total_due` for every committed student.
/// - `total_paid` equals the sum of the student's non-cancelled payments.
/// - Events are published only for committed changes.
#[derive(Debug, Default)]
pub struct Engine {
    store: Store,
    events: EventBus,
    config: SchoolConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SchoolConfig) -> Self {
        Self {
            store: Store::new(),
            events: EventBus::new(),
            config,
        }
    }

    pub fn config(&self) -> &SchoolConfig {
        &self.config
    }

    /// The underlying store, for read-only queries.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn subscribe(&self, topic: Topic) -> Receiver<SchoolEvent> {
        self.events.subscribe(topic)
    }

    // ── Students ─────────────────────────────────────────────

    /// Enrolls a student and posts the initial `total_due` as a charge.
    ///
    /// # Errors
    ///
    /// - [`SchoolError::InvalidAmount`] - `total_due` negative or above the maximum.
    /// - [`SchoolError::InvalidHours`] - negative planned hours.
    /// - [`SchoolError::Store`] - the CIN is already taken.
    pub fn enroll_student(&self, new: NewStudent) -> Outcome<Student> {
        let result = self.run("enroll_student", |tx| {
            let total_due = money::round(new.total_due);
            if total_due < Decimal::ZERO || total_due > self.config.max_amount {
                return Err(SchoolError::InvalidAmount {
                    max: self.config.max_amount,
                });
            }
            if new.hours_planned < Decimal::ZERO {
                return Err(SchoolError::InvalidHours);
            }
            let student = tx.insert_student(
                new.cin.trim().to_string(),
                new.full_name.trim().to_string(),
                new.hours_planned,
            )?;
            if total_due.is_zero() {
                return Ok(student);
            }
            LedgerEngine::apply_charge_delta(tx, student.id, total_due)
        });
        match result {
            Ok(student) => {
                tracing::debug!(student_id = %student.id, cin = %student.cin, "student enrolled");
                self.student_changed(student.id, StudentChange::Enrolled);
                Outcome::ok(format!("student {} enrolled", student.full_name), student)
            }
            Err(e) => Outcome::failed(e),
        }
    }

    /// Adds a fee to what the student owes.
    pub fn add_charge(&self, student_id: StudentId, amount: Decimal) -> Outcome<Student> {
        let result = self.run("add_charge", |tx| {
            let amount = money::validate_amount(amount, self.config.max_amount)?;
            LedgerEngine::apply_charge_delta(tx, student_id, amount)
        });
        match result {
            Ok(student) => {
                self.student_changed(student_id, StudentChange::LedgerUpdated);
                Outcome::ok(
                    format!("charge posted, balance {}", student.balance),
                    student,
                )
            }
            Err(e) => Outcome::failed(e),
        }
    }

    /// Sets planned and completed training hours. Completed hours may exceed
    /// the plan.
    pub fn update_training_hours(
        &self,
        student_id: StudentId,
        planned: Decimal,
        completed: Decimal,
    ) -> Outcome<Student> {
        let result = self.run("update_training_hours", |tx| {
            if planned < Decimal::ZERO || completed < Decimal::ZERO {
                return Err(SchoolError::InvalidHours);
            }
            let mut student = tx
                .student(student_id)
                .cloned()
                .ok_or(SchoolError::UnknownStudent(student_id))?;
            student.hours_planned = planned;
            student.hours_completed = completed;
            tx.update_student(student.clone())?;
            Ok(student)
        });
        match result {
            Ok(student) => {
                self.student_changed(student_id, StudentChange::HoursUpdated);
                Outcome::ok("training hours updated", student)
            }
            Err(e) => Outcome::failed(e),
        }
    }

    /// Deletes a student. With `cascade`, their sessions and payments go in
    /// the same transaction; without it, any dependent row blocks the delete.
    ///
    /// # Errors
    ///
    /// - [`SchoolError::UnknownStudent`] - no such student.
    /// - [`SchoolError::HasDependents`] - dependents exist and `cascade` is false.
    pub fn delete_student(&self, student_id: StudentId, cascade: bool) -> Outcome<Student> {
        let result = self.run("delete_student", |tx| {
            if tx.student(student_id).is_none() {
                return Err(SchoolError::UnknownStudent(student_id));
            }
            let sessions: Vec<SessionId> = tx
                .sessions_for(ResourceRef::Student(student_id))
                .map(|s| s.id)
                .collect();
            let payments: Vec<PaymentId> = tx.payments_for(student_id).map(|p| p.id).collect();

            if !cascade && !(sessions.is_empty() && payments.is_empty()) {
                return Err(SchoolError::HasDependents {
                    student: student_id,
                    sessions: sessions.len(),
                    payments: payments.len(),
                });
            }
            for &id in &sessions {
                tx.delete_session(id)?;
            }
            for &id in &payments {
                tx.delete_payment(id)?;
            }
            let student = tx.delete_student(student_id)?;
            Ok((student, sessions, payments))
        });
        match result {
            Ok((student, sessions, payments)) => {
                if !(sessions.is_empty() && payments.is_empty()) {
                    tracing::warn!(
                        student_id = %student_id,
                        sessions = sessions.len(),
                        payments = payments.len(),
                        "student deleted with dependents"
                    );
                }
                for session_id in sessions {
                    self.session_changed(session_id, SessionChange::Deleted);
                }
                for payment_id in payments {
                    self.events.publish(SchoolEvent::Payment {
                        payment_id,
                        student_id,
                        change: PaymentChange::Deleted,
                    });
                }
                self.student_changed(student_id, StudentChange::Deleted);
                Outcome::ok(format!("student {} deleted", student.full_name), student)
            }
            Err(e) => Outcome::failed(e),
        }
    }

    // ── Instructors and vehicles ─────────────────────────────

    pub fn register_instructor(&self, full_name: &str) -> Outcome<Instructor> {
        match self.run("register_instructor", |tx| {
            Ok(tx.insert_instructor(full_name.trim().to_string()))
        }) {
            Ok(instructor) => Outcome::ok("instructor registered", instructor),
            Err(e) => Outcome::failed(e),
        }
    }

    /// # Errors
    ///
    /// [`SchoolError::Store`] when the plate number is already registered.
    pub fn register_vehicle(&self, plate_number: &str, model: &str) -> Outcome<Vehicle> {
        match self.run("register_vehicle", |tx| {
            Ok(tx.insert_vehicle(plate_number.trim().to_string(), model.trim().to_string())?)
        }) {
            Ok(vehicle) => Outcome::ok("vehicle registered", vehicle),
            Err(e) => Outcome::failed(e),
        }
    }

    // ── Payments ─────────────────────────────────────────────

    /// Records a payment and credits the student. See
    /// [`PaymentLifecycle::create`] for the rules.
    pub fn create_payment(&self, new: NewPayment) -> Outcome<Payment> {
        let lifecycle = PaymentLifecycle::new(&self.config);
        match self.run("create_payment", |tx| lifecycle.create(tx, new)) {
            Ok(payment) => {
                self.payment_changed(&payment, PaymentChange::Created);
                Outcome::ok(format!("payment {} recorded", payment.receipt_number), payment)
            }
            Err(e) => Outcome::failed(e),
        }
    }

    pub fn amend_payment(&self, id: PaymentId, amendment: PaymentAmendment) -> Outcome<Payment> {
        let lifecycle = PaymentLifecycle::new(&self.config);
        match self.run("amend_payment", |tx| lifecycle.amend(tx, id, amendment)) {
            Ok(payment) => {
                self.payment_changed(&payment, PaymentChange::Amended);
                Outcome::ok(format!("payment {} amended", payment.receipt_number), payment)
            }
            Err(e) => Outcome::failed(e),
        }
    }

    pub fn validate_payment(&self, id: PaymentId, validated_by: &str) -> Outcome<Payment> {
        let lifecycle = PaymentLifecycle::new(&self.config);
        match self.run("validate_payment", |tx| {
            lifecycle.validate(tx, id, validated_by)
        }) {
            Ok(payment) => {
                self.events.publish(SchoolEvent::Payment {
                    payment_id: payment.id,
                    student_id: payment.student_id,
                    change: PaymentChange::Validated,
                });
                Outcome::ok(format!("payment {} validated", payment.receipt_number), payment)
            }
            Err(e) => Outcome::failed(e),
        }
    }

    pub fn cancel_payment(&self, id: PaymentId, reason: &str) -> Outcome<Payment> {
        let lifecycle = PaymentLifecycle::new(&self.config);
        match self.run("cancel_payment", |tx| lifecycle.cancel(tx, id, reason)) {
            Ok(payment) => {
                self.payment_changed(&payment, PaymentChange::Cancelled);
                Outcome::ok(format!("payment {} cancelled", payment.receipt_number), payment)
            }
            Err(e) => Outcome::failed(e),
        }
    }

    // ── Sessions ─────────────────────────────────────────────

    /// Schedules a session.
    ///
    /// When conflicts exist and `on_conflict` is [`OnConflict::Abort`], the
    /// outcome is unsuccessful but carries the conflicts so the operator can
    /// resubmit with [`OnConflict::Proceed`].
    pub fn create_session(
        &self,
        draft: SessionDraft,
        on_conflict: &OnConflict,
    ) -> Outcome<Scheduled> {
        let result = self.run("create_session", |tx| {
            SessionScheduler::create(tx, draft, on_conflict)
        });
        self.scheduled(result, SessionChange::Created)
    }

    pub fn update_session(
        &self,
        id: SessionId,
        patch: SessionPatch,
        on_conflict: &OnConflict,
    ) -> Outcome<Scheduled> {
        let result = self.run("update_session", |tx| {
            SessionScheduler::update(tx, id, patch, on_conflict)
        });
        self.scheduled(result, SessionChange::Updated)
    }

    pub fn delete_session(&self, id: SessionId) -> Outcome<Session> {
        match self.run("delete_session", |tx| SessionScheduler::delete(tx, id)) {
            Ok(session) => {
                self.session_changed(id, SessionChange::Deleted);
                Outcome::ok("session deleted", session)
            }
            Err(e) => Outcome::failed(e),
        }
    }

    /// Conflicts `draft` would have against committed sessions. Pass the
    /// session being edited as `exclude`.
    ///
    /// # Errors
    ///
    /// [`SchoolError::InvalidInterval`] when the draft ends before it starts.
    pub fn preview_conflicts(
        &self,
        draft: &SessionDraft,
        exclude: Option<SessionId>,
    ) -> Result<Vec<Conflict>, SchoolError> {
        self.store
            .read(|tables| SessionScheduler::preview(tables, draft, exclude))
    }

    // ── Reads ────────────────────────────────────────────────

    pub fn student(&self, id: StudentId) -> Option<Student> {
        self.store.read(|t| t.student(id).cloned())
    }

    pub fn student_by_cin(&self, cin: &str) -> Option<Student> {
        self.store.read(|t| t.student_by_cin(cin.trim()).cloned())
    }

    pub fn students(&self) -> Vec<Student> {
        self.store.read(|t| t.students().cloned().collect())
    }

    pub fn payment(&self, id: PaymentId) -> Option<Payment> {
        self.store.read(|t| t.payment(id).cloned())
    }

    pub fn payments_for(&self, student_id: StudentId) -> Vec<Payment> {
        self.store
            .read(|t| t.payments_for(student_id).cloned().collect())
    }

    pub fn session(&self, id: SessionId) -> Option<Session> {
        self.store.read(|t| t.session(id).cloned())
    }

    /// Sessions occupying `resource`, ordered by start time.
    pub fn sessions_for(&self, resource: ResourceRef) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .store
            .read(|t| t.sessions_for(resource).cloned().collect());
        sessions.sort_by_key(|s| (s.start_datetime(), s.id));
        sessions
    }

    /// Reloads a cached student from committed state.
    pub fn refresh_student(&self, student: &mut Student) -> Result<(), SchoolError> {
        LedgerEngine::refresh(&self.store, student)
    }

    /// Students whose stored totals disagree with their payment rows.
    pub fn audit_ledger(&self) -> Vec<Reconciliation> {
        self.store.read(|tables| {
            tables
                .students()
                .filter_map(|s| LedgerEngine::reconcile(tables, s.id()).ok())
                .filter(|r| !r.is_clean())
                .collect()
        })
    }

    pub fn revenue_for_month(&self, year: i32, month: u32) -> Decimal {
        self.store
            .read(|t| stats::revenue_for_month(t, year, month))
    }

    pub fn revenue_by_month(&self, year: i32) -> [Decimal; 12] {
        self.store.read(|t| stats::revenue_by_month(t, year))
    }

    pub fn revenue_by_method(&self) -> BTreeMap<PaymentMethod, Decimal> {
        self.store.read(stats::revenue_by_method)
    }

    pub fn revenue_by_category(&self) -> BTreeMap<String, Decimal> {
        self.store.read(stats::revenue_by_category)
    }

    pub fn outstanding_debt(&self) -> Decimal {
        self.store.read(stats::outstanding_debt)
    }

    // ── Internals ────────────────────────────────────────────

    /// One transaction for one operation, with the failure logged.
    fn run<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T, SchoolError>,
    ) -> Result<T, SchoolError> {
        let result = self.store.transaction(f);
        if let Err(e) = &result {
            match e.category() {
                ErrorCategory::Validation | ErrorCategory::NotFound => {
                    tracing::warn!(operation, error = %e, "operation rejected");
                }
                ErrorCategory::Persistence | ErrorCategory::Contract => {
                    tracing::error!(operation, error = ?e, "operation failed, rolled back");
                }
            }
        }
        result
    }

    fn scheduled(
        &self,
        result: Result<Scheduled, SchoolError>,
        change: SessionChange,
    ) -> Outcome<Scheduled> {
        match result {
            Ok(scheduled) => match &scheduled.session {
                Some(session) => {
                    self.session_changed(session.id, change);
                    let message = if scheduled.has_conflicts() {
                        format!(
                            "session saved over {} conflict(s)",
                            scheduled.conflicts.len()
                        )
                    } else {
                        "session saved".to_string()
                    };
                    Outcome::ok(message, scheduled)
                }
                None => Outcome::held(
                    format!(
                        "{} conflicting session(s), nothing saved",
                        scheduled.conflicts.len()
                    ),
                    scheduled,
                ),
            },
            Err(e) => Outcome::failed(e),
        }
    }

    fn student_changed(&self, student_id: StudentId, change: StudentChange) {
        self.events.publish(SchoolEvent::Student { student_id, change });
    }

    fn session_changed(&self, session_id: SessionId, change: SessionChange) {
        self.events.publish(SchoolEvent::Session { session_id, change });
    }

    /// Payment rows that moved money also moved the student's ledger.
    fn payment_changed(&self, payment: &Payment, change: PaymentChange) {
        self.events.publish(SchoolEvent::Payment {
            payment_id: payment.id,
            student_id: payment.student_id,
            change,
        });
        self.student_changed(payment.student_id, StudentChange::LedgerUpdated);
    }
}
