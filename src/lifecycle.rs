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

//! Payment state machine and its ledger side effects.
//!
//! | Operation | Allowed from | Ledger delta |
//! |-----------|--------------|--------------|
//! | create | - | `+amount` |
//! | amend | Pending, Validated | `new_amount - old_amount` |
//! | validate | Pending | none |
//! | cancel | Pending, Validated | `-amount` |
//!
//! ```text
//!  Pending ──validate──► Validated
//!     │                     │
//!     └──cancel──► Cancelled ◄──cancel──┘   (terminal)
//! ```

use crate::base::PaymentId;
use crate::config::SchoolConfig;
use crate::ledger::LedgerEngine;
use crate::money;
use crate::payment::{NewPayment, Payment, PaymentAmendment};
use crate::store::Transaction;
use crate::SchoolError;
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub struct PaymentLifecycle<'a> {
    config: &'a SchoolConfig,
}

impl<'a> PaymentLifecycle<'a> {
    pub fn new(config: &'a SchoolConfig) -> Self {
        Self { config }
    }

    /// Records a payment and credits it to the student in the same
    /// transaction.
    ///
    /// # Errors
    ///
    /// - [`SchoolError::InvalidAmount`] - amount outside `(0, max_amount]`.
    /// - [`SchoolError::ValidatorRequired`] - `validated_by` is blank.
    /// - [`SchoolError::UnknownStudent`] - no such student.
    pub fn create(
        &self,
        tx: &mut Transaction<'_>,
        new: NewPayment,
    ) -> Result<Payment, SchoolError> {
        let amount = money::validate_amount(new.amount, self.config.max_amount)?;
        let validated_by = new.validated_by.as_deref().map(operator_name).transpose()?;
        if tx.student(new.student_id).is_none() {
            return Err(SchoolError::UnknownStudent(new.student_id));
        }

        let payment_date = new
            .payment_date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let prefix = &self.config.receipt_prefix;
        let payment = tx.insert_payment(|id| Payment {
            id,
            receipt_number: receipt_number(prefix, payment_date, id),
            student_id: new.student_id,
            amount,
            payment_method: new.payment_method,
            payment_date,
            category: new.category,
            description: new.description,
            is_validated: validated_by.is_some(),
            validated_by,
            is_cancelled: false,
            cancellation_reason: None,
        })?;

        LedgerEngine::apply_payment_delta(tx, payment.student_id, amount)?;
        tracing::debug!(
            payment_id = %payment.id,
            student_id = %payment.student_id,
            amount = %amount,
            receipt = %payment.receipt_number,
            "payment recorded"
        );
        Ok(payment)
    }

    /// Changes a payment that is not cancelled.
    ///
    /// A new amount moves `total_paid` by the difference from the stored
    /// amount only, never by the full new amount.
    ///
    /// # Errors
    ///
    /// - [`SchoolError::UnknownPayment`] - no such payment.
    /// - [`SchoolError::PaymentCancelled`] - payment is cancelled.
    /// - [`SchoolError::InvalidAmount`] - new amount out of range.
    pub fn amend(
        &self,
        tx: &mut Transaction<'_>,
        id: PaymentId,
        amendment: PaymentAmendment,
    ) -> Result<Payment, SchoolError> {
        let mut payment = load_open(tx, id)?;

        if let Some(amount) = amendment.amount {
            let amount = money::validate_amount(amount, self.config.max_amount)?;
            let delta = amount - payment.amount;
            if delta != Decimal::ZERO {
                LedgerEngine::apply_payment_delta(tx, payment.student_id, delta)?;
                tracing::debug!(payment_id = %id, from = %payment.amount, to = %amount, "payment amount amended");
                payment.amount = amount;
            }
        }
        if let Some(method) = amendment.payment_method {
            payment.payment_method = method;
        }
        if let Some(date) = amendment.payment_date {
            payment.payment_date = date;
        }
        if let Some(category) = amendment.category {
            payment.category = category;
        }
        if let Some(description) = amendment.description {
            payment.description = description;
        }

        tx.update_payment(payment.clone())?;
        Ok(payment)
    }

    /// Marks a payment as administratively confirmed. No ledger effect.
    ///
    /// # Errors
    ///
    /// - [`SchoolError::ValidatorRequired`] - `validated_by` is blank.
    /// - [`SchoolError::UnknownPayment`] - no such payment.
    /// - [`SchoolError::PaymentCancelled`] - payment is cancelled.
    /// - [`SchoolError::AlreadyValidated`] - payment was validated before.
    pub fn validate(
        &self,
        tx: &mut Transaction<'_>,
        id: PaymentId,
        validated_by: &str,
    ) -> Result<Payment, SchoolError> {
        let validated_by = operator_name(validated_by)?;
        let mut payment = load_open(tx, id)?;
        if payment.is_validated {
            return Err(SchoolError::AlreadyValidated(id));
        }
        payment.is_validated = true;
        payment.validated_by = Some(validated_by);
        tx.update_payment(payment.clone())?;
        tracing::debug!(payment_id = %id, "payment validated");
        Ok(payment)
    }

    /// Cancels a payment and reverses its contribution to `total_paid`.
    ///
    /// # Errors
    ///
    /// - [`SchoolError::ReasonRequired`] - `reason` is blank.
    /// - [`SchoolError::UnknownPayment`] - no such payment.
    /// - [`SchoolError::AlreadyCancelled`] - payment was cancelled before.
    pub fn cancel(
        &self,
        tx: &mut Transaction<'_>,
        id: PaymentId,
        reason: &str,
    ) -> Result<Payment, SchoolError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SchoolError::ReasonRequired);
        }
        let mut payment = tx
            .payment(id)
            .cloned()
            .ok_or(SchoolError::UnknownPayment(id))?;
        if payment.is_cancelled {
            return Err(SchoolError::AlreadyCancelled(id));
        }

        LedgerEngine::apply_payment_delta(tx, payment.student_id, -payment.amount)?;
        payment.is_cancelled = true;
        payment.cancellation_reason = Some(reason.to_string());
        tx.update_payment(payment.clone())?;
        tracing::debug!(payment_id = %id, amount = %payment.amount, reason, "payment cancelled");
        Ok(payment)
    }
}

/// `{prefix}-{YYYYMMDD}-{id:06}`.
pub fn receipt_number(prefix: &str, date: NaiveDate, id: PaymentId) -> String {
    format!("{prefix}-{}-{:06}", date.format("%Y%m%d"), id.0)
}

fn load_open(tx: &Transaction<'_>, id: PaymentId) -> Result<Payment, SchoolError> {
    let payment = tx
        .payment(id)
        .cloned()
        .ok_or(SchoolError::UnknownPayment(id))?;
    if payment.is_cancelled {
        return Err(SchoolError::PaymentCancelled(id));
    }
    Ok(payment)
}

fn operator_name(name: &str) -> Result<String, SchoolError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SchoolError::ValidatorRequired);
    }
    Ok(name.to_string())
}
