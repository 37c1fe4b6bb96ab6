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

//! Error types for scheduling and ledger operations.
//!
//! Two layers: [`StoreError`] is raised by the transactional store (commit
//! failures and constraint violations), [`SchoolError`] is what every service
//! and the [`Engine`](crate::Engine) return.

use crate::base::{PaymentId, SessionId, StudentId};
use thiserror::Error;

/// Failures raised by the [`Store`](crate::Store).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The commit was refused; nothing from the transaction was applied.
    #[error("commit failed, transaction rolled back")]
    CommitFailed,

    #[error("duplicate value '{value}' for {table}.{column}")]
    UniqueViolation {
        table: &'static str,
        column: &'static str,
        value: String,
    },

    #[error("{table}.{column} references missing row {id}")]
    ForeignKeyViolation {
        table: &'static str,
        column: &'static str,
        id: u32,
    },

    #[error("check constraint failed on {table} row {id}: {detail}")]
    CheckViolation {
        table: &'static str,
        id: u32,
        detail: String,
    },

    #[error("{table} row {id} not found")]
    RowNotFound { table: &'static str, id: u32 },
}

/// Scheduling and ledger errors.
///
/// Every variant renders a message suitable for direct display to the
/// operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchoolError {
    /// Amount is zero, negative, or above the configured maximum
    #[error("invalid amount (must be greater than 0 and at most {max})")]
    InvalidAmount { max: rust_decimal::Decimal },

    /// Referenced student does not exist
    #[error("student {0} not found")]
    UnknownStudent(StudentId),

    /// Referenced payment does not exist
    #[error("payment {0} not found")]
    UnknownPayment(PaymentId),

    /// Referenced session does not exist
    #[error("session {0} not found")]
    UnknownSession(SessionId),

    /// Cancelled payments cannot be amended or validated
    #[error("payment {0} is cancelled")]
    PaymentCancelled(PaymentId),

    /// Cancellation is terminal
    #[error("payment {0} is already cancelled")]
    AlreadyCancelled(PaymentId),

    #[error("payment {0} is already validated")]
    AlreadyValidated(PaymentId),

    /// Cancellation reason is empty or blank
    #[error("a cancellation reason is required")]
    ReasonRequired,

    /// Validation needs the name of whoever confirmed the payment
    #[error("the validating operator must be named")]
    ValidatorRequired,

    /// Booking over a conflict needs the name of whoever accepted it
    #[error("the operator acknowledging the conflict must be named")]
    AcknowledgementRequired,

    /// Session end is not strictly after its start
    #[error("session must end after it starts")]
    InvalidInterval,

    /// Planned or completed hours are negative
    #[error("training hours cannot be negative")]
    InvalidHours,

    /// Student still has sessions or payments and cascade was not requested
    #[error("student {student} still has {sessions} session(s) and {payments} payment(s)")]
    HasDependents {
        student: StudentId,
        sessions: usize,
        payments: usize,
    },

    /// A ledger delta would drive `total_paid` or `total_due` below zero
    #[error("ledger update would make a total negative for student {0}")]
    LedgerUnderflow(StudentId),

    /// A ledger total or balance left the representable decimal range
    #[error("ledger total out of range for student {0}")]
    LedgerOverflow(StudentId),

    /// An unsuccessful outcome carried neither an entity nor an error
    #[error("{0}")]
    EmptyOutcome(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coarse classification used to decide how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input; the operator can correct it and retry.
    Validation,
    /// A referenced row does not exist.
    NotFound,
    /// Commit failure or constraint violation; nothing was applied.
    Persistence,
    /// The caller broke a contract the core relies on.
    Contract,
}

impl SchoolError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAmount { .. }
            | Self::ReasonRequired
            | Self::ValidatorRequired
            | Self::AcknowledgementRequired
            | Self::InvalidInterval
            | Self::InvalidHours
            | Self::PaymentCancelled(_)
            | Self::AlreadyCancelled(_)
            | Self::AlreadyValidated(_)
            | Self::HasDependents { .. } => ErrorCategory::Validation,
            Self::UnknownStudent(_) | Self::UnknownPayment(_) | Self::UnknownSession(_) => {
                ErrorCategory::NotFound
            }
            Self::Store(_) => ErrorCategory::Persistence,
            Self::LedgerUnderflow(_) | Self::LedgerOverflow(_) | Self::EmptyOutcome(_) => {
                ErrorCategory::Contract
            }
        }
    }

    /// Whether the operator can fix the input and try again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation | ErrorCategory::NotFound
        )
    }
}
