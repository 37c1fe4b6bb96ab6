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

//! Student ledger.
//!
//! The [`LedgerEngine`] is the only code that changes a student's
//! `total_paid`, `total_due` or `balance`. Every change adjusts one of the
//! totals and then derives `balance = total_paid - total_due` from the fresh
//! totals; the stored balance is never incremented on its own.
//!
//! All ledger calls take the caller's [`Transaction`], so the totals land in
//! the same commit as the payment row that caused them.

use crate::base::StudentId;
use crate::money;
use crate::store::{Store, Tables, Transaction};
use crate::student::Student;
use crate::SchoolError;
use rust_decimal::Decimal;
use serde::Serialize;

/// Stored totals compared against what the payment rows imply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub student_id: StudentId,
    pub recorded_paid: Decimal,
    /// Sum of the student's non-cancelled payments.
    pub expected_paid: Decimal,
    pub recorded_balance: Decimal,
    pub expected_balance: Decimal,
}

impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        self.recorded_paid == self.expected_paid && self.recorded_balance == self.expected_balance
    }

    /// `recorded_paid - expected_paid`.
    pub fn paid_drift(&self) -> Decimal {
        self.recorded_paid - self.expected_paid
    }
}

pub struct LedgerEngine;

impl LedgerEngine {
    /// Adjusts `total_paid` by `delta` and rederives the balance.
    ///
    /// `delta` is positive for a new or increased payment, negative for a
    /// cancellation or decrease. It is rounded to two decimals first.
    ///
    /// # Errors
    ///
    /// - [`SchoolError::UnknownStudent`] - no such student.
    /// - [`SchoolError::LedgerUnderflow`] - `total_paid` would go negative.
    /// - [`SchoolError::LedgerOverflow`] - a total or the balance would leave
    ///   the decimal range.
    pub fn apply_payment_delta(
        tx: &mut Transaction<'_>,
        student_id: StudentId,
        delta: Decimal,
    ) -> Result<Student, SchoolError> {
        Self::post(tx, student_id, |student| {
            let total_paid = student
                .total_paid
                .checked_add(money::round(delta))
                .map(money::round)
                .ok_or(SchoolError::LedgerOverflow(student.id))?;
            if total_paid < Decimal::ZERO {
                return Err(SchoolError::LedgerUnderflow(student.id));
            }
            student.total_paid = total_paid;
            Ok(())
        })
    }

    /// Adjusts `total_due` by `delta` (fees added or waived) and rederives
    /// the balance.
    ///
    /// # Errors
    ///
    /// - [`SchoolError::UnknownStudent`] - no such student.
    /// - [`SchoolError::LedgerUnderflow`] - `total_due` would go negative.
    /// - [`SchoolError::LedgerOverflow`] - a total or the balance would leave
    ///   the decimal range.
    pub fn apply_charge_delta(
        tx: &mut Transaction<'_>,
        student_id: StudentId,
        delta: Decimal,
    ) -> Result<Student, SchoolError> {
        Self::post(tx, student_id, |student| {
            let total_due = student
                .total_due
                .checked_add(money::round(delta))
                .map(money::round)
                .ok_or(SchoolError::LedgerOverflow(student.id))?;
            if total_due < Decimal::ZERO {
                return Err(SchoolError::LedgerUnderflow(student.id));
            }
            student.total_due = total_due;
            Ok(())
        })
    }

    /// Rederives and stores the balance from the stored totals.
    ///
    /// # Errors
    ///
    /// [`SchoolError::UnknownStudent`] when no such student exists.
    pub fn recompute_balance(
        tx: &mut Transaction<'_>,
        student_id: StudentId,
    ) -> Result<Decimal, SchoolError> {
        Self::post(tx, student_id, |_| Ok(())).map(|student| student.balance)
    }

    /// Compares the stored totals with the student's payment rows.
    ///
    /// # Errors
    ///
    /// [`SchoolError::UnknownStudent`] when no such student exists.
    pub fn reconcile(tables: &Tables, student_id: StudentId) -> Result<Reconciliation, SchoolError> {
        let student = tables
            .student(student_id)
            .ok_or(SchoolError::UnknownStudent(student_id))?;
        let expected_paid: Decimal = tables
            .payments_for(student_id)
            .filter(|p| p.counts())
            .map(|p| p.amount)
            .sum();
        Ok(Reconciliation {
            student_id,
            recorded_paid: student.total_paid,
            expected_paid,
            recorded_balance: student.balance,
            expected_balance: expected_paid - student.total_due,
        })
    }

    /// Replaces a cached `student` with its committed row.
    ///
    /// Used after a failed commit so a caller never keeps a speculative
    /// balance. Must not be called while a transaction is open on this thread.
    ///
    /// # Errors
    ///
    /// [`SchoolError::UnknownStudent`] when the row no longer exists.
    pub fn refresh(store: &Store, student: &mut Student) -> Result<(), SchoolError> {
        let id = student.id;
        *student = store
            .read(|tables| tables.student(id).cloned())
            .ok_or(SchoolError::UnknownStudent(id))?;
        Ok(())
    }

    fn post(
        tx: &mut Transaction<'_>,
        student_id: StudentId,
        adjust: impl FnOnce(&mut Student) -> Result<(), SchoolError>,
    ) -> Result<Student, SchoolError> {
        let mut student = tx
            .student(student_id)
            .cloned()
            .ok_or(SchoolError::UnknownStudent(student_id))?;
        adjust(&mut student)?;
        student.balance = student
            .total_paid
            .checked_sub(student.total_due)
            .ok_or(SchoolError::LedgerOverflow(student_id))?;
        debug_assert!(
            student.is_consistent(),
            "Invariant violated: balance {} != total_paid {} - total_due {}",
            student.balance,
            student.total_paid,
            student.total_due
        );
        tx.update_student(student.clone())?;
        tracing::debug!(
            student_id = %student_id,
            total_paid = %student.total_paid,
            total_due = %student.total_due,
            balance = %student.balance,
            "ledger updated"
        );
        Ok(student)
    }
}
