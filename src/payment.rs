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

//! Payment records.
//!
//! Payments follow a state machine:
//! - [`Pending`] → [`Validated`] (via validate)
//! - [`Pending`] or [`Validated`] → [`Cancelled`] (via cancel, terminal)
//!
//! [`Pending`]: PaymentStatus::Pending
//! [`Validated`]: PaymentStatus::Validated
//! [`Cancelled`]: PaymentStatus::Cancelled

use crate::base::{PaymentId, StudentId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Check,
    Transfer,
    MobileMoney,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        Self::Cash,
        Self::Card,
        Self::Check,
        Self::Transfer,
        Self::MobileMoney,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Check => "check",
            Self::Transfer => "transfer",
            Self::MobileMoney => "mobile_money",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown payment method '{0}'")]
pub struct UnknownPaymentMethod(pub String);

impl FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "check" | "cheque" => Ok(Self::Check),
            "transfer" => Ok(Self::Transfer),
            "mobile_money" => Ok(Self::MobileMoney),
            _ => Err(UnknownPaymentMethod(s.to_string())),
        }
    }
}

/// Administrative state of a payment, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Validated,
    Cancelled,
}

/// Payment request as received from the controller layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub student_id: StudentId,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    /// Defaults to today when absent.
    pub payment_date: Option<NaiveDate>,
    pub category: String,
    pub description: String,
    /// Validate immediately on creation when set.
    pub validated_by: Option<String>,
}

impl NewPayment {
    pub fn new(student_id: StudentId, amount: Decimal, payment_method: PaymentMethod) -> Self {
        Self {
            student_id,
            amount,
            payment_method,
            payment_date: None,
            category: String::new(),
            description: String::new(),
            validated_by: None,
        }
    }
}

/// Fields that may change on a payment that is not cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAmendment {
    pub amount: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl PaymentAmendment {
    pub fn amount(amount: Decimal) -> Self {
        Self {
            amount: Some(amount),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub receipt_number: String,
    pub student_id: StudentId,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub category: String,
    pub description: String,
    pub is_validated: bool,
    pub validated_by: Option<String>,
    pub is_cancelled: bool,
    pub cancellation_reason: Option<String>,
}

impl Payment {
    pub fn status(&self) -> PaymentStatus {
        if self.is_cancelled {
            PaymentStatus::Cancelled
        } else if self.is_validated {
            PaymentStatus::Validated
        } else {
            PaymentStatus::Pending
        }
    }

    /// Whether this payment contributes to `total_paid` and revenue figures.
    pub fn counts(&self) -> bool {
        !self.is_cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payment() -> Payment {
        Payment {
            id: PaymentId(1),
            receipt_number: "RCP-20250310-000001".into(),
            student_id: StudentId(1),
            amount: dec!(100),
            payment_method: PaymentMethod::Cash,
            payment_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            category: String::new(),
            description: String::new(),
            is_validated: false,
            validated_by: None,
            is_cancelled: false,
            cancellation_reason: None,
        }
    }

    #[test]
    fn status_follows_flags() {
        let mut p = payment();
        assert_eq!(p.status(), PaymentStatus::Pending);
        p.is_validated = true;
        assert_eq!(p.status(), PaymentStatus::Validated);
        p.is_cancelled = true;
        assert_eq!(p.status(), PaymentStatus::Cancelled);
        assert!(!p.counts());
    }

    #[test]
    fn method_parses_loosely() {
        assert_eq!("Cash".parse(), Ok(PaymentMethod::Cash));
        assert_eq!(" mobile money ".parse(), Ok(PaymentMethod::MobileMoney));
        assert_eq!("cheque".parse(), Ok(PaymentMethod::Check));
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn unknown_method_error_message() {
        let err = "bitcoin".parse::<PaymentMethod>().unwrap_err();
        assert_eq!(err, UnknownPaymentMethod("bitcoin".into()));
        assert_eq!(err.to_string(), "unknown payment method 'bitcoin'");
    }

    #[test]
    fn method_round_trips_through_display() {
        for method in PaymentMethod::ALL {
            assert_eq!(method.to_string().parse(), Ok(method));
        }
    }
}
