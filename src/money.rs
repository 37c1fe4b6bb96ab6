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

//! Monetary rounding and range checks.
//!
//! All amounts are [`Decimal`] and are rounded to [`DECIMAL_PRECISION`]
//! places at the point of input, before they reach the store.

use crate::SchoolError;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

pub const DECIMAL_PRECISION: u32 = 2;

/// Default upper bound for a single payment or charge.
pub const MAX_AMOUNT: Decimal = dec!(1000000.00);

/// Rounds to two decimals, half away from zero.
pub fn round(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(DECIMAL_PRECISION, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds `amount` and checks `0 < amount <= max`.
///
/// The range check runs on the rounded value, so `0.004` is rejected.
pub fn validate_amount(amount: Decimal, max: Decimal) -> Result<Decimal, SchoolError> {
    let amount = round(amount);
    if amount <= Decimal::ZERO || amount > max {
        return Err(SchoolError::InvalidAmount { max });
    }
    Ok(amount)
}
