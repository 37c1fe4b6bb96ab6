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

//! Student records.
//!
//! A [`Student`] is a plain persisted row. Its financial totals can only be
//! changed by the [`LedgerEngine`](crate::LedgerEngine), which is why they are
//! exposed through getters rather than public fields.
//!
//! # Example
//!
//! ```
//! use driving_school_core::{Engine, NewStudent};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! let student = engine
//!     .enroll_student(NewStudent::new("AB123456", "Amina Berrada", dec!(5000)))
//!     .into_result()
//!     .unwrap();
//! assert_eq!(student.balance(), dec!(-5000));
//! ```

use crate::base::StudentId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Enrollment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudent {
    /// National identity card number, unique across students.
    pub cin: String,
    pub full_name: String,
    /// Initial amount owed for the training package.
    pub total_due: Decimal,
    pub hours_planned: Decimal,
}

impl NewStudent {
    pub fn new(cin: impl Into<String>, full_name: impl Into<String>, total_due: Decimal) -> Self {
        Self {
            cin: cin.into(),
            full_name: full_name.into(),
            total_due,
            hours_planned: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub(crate) id: StudentId,
    pub(crate) cin: String,
    pub(crate) full_name: String,
    pub(crate) total_due: Decimal,
    pub(crate) total_paid: Decimal,
    pub(crate) balance: Decimal,
    pub(crate) hours_planned: Decimal,
    pub(crate) hours_completed: Decimal,
}

impl Student {
    pub(crate) fn new(id: StudentId, cin: String, full_name: String, hours_planned: Decimal) -> Self {
        Self {
            id,
            cin,
            full_name,
            total_due: Decimal::ZERO,
            total_paid: Decimal::ZERO,
            balance: Decimal::ZERO,
            hours_planned,
            hours_completed: Decimal::ZERO,
        }
    }

    pub fn id(&self) -> StudentId {
        self.id
    }

    pub fn cin(&self) -> &str {
        &self.cin
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Cumulative amount owed.
    pub fn total_due(&self) -> Decimal {
        self.total_due
    }

    /// Cumulative amount received from non-cancelled payments.
    pub fn total_paid(&self) -> Decimal {
        self.total_paid
    }

    /// `total_paid - total_due`: positive is credit, negative is debt.
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn hours_planned(&self) -> Decimal {
        self.hours_planned
    }

    /// May exceed [`hours_planned`](Self::hours_planned).
    pub fn hours_completed(&self) -> Decimal {
        self.hours_completed
    }

    pub fn is_settled(&self) -> bool {
        self.balance == Decimal::ZERO
    }

    pub fn owes(&self) -> bool {
        self.balance < Decimal::ZERO
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.total_paid.checked_sub(self.total_due) == Some(self.balance)
    }
}
