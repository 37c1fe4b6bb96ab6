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

//! Revenue aggregates.
//!
//! Every aggregate skips cancelled payments. Counting them would inflate
//! revenue by money that was handed back.

use crate::payment::{Payment, PaymentMethod};
use crate::store::Tables;
use chrono::Datelike;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

fn counted(tables: &Tables) -> impl Iterator<Item = &Payment> {
    tables.payments().filter(|p| p.counts())
}

/// Revenue for one calendar month (`month` in `1..=12`).
pub fn revenue_for_month(tables: &Tables, year: i32, month: u32) -> Decimal {
    counted(tables)
        .filter(|p| p.payment_date.year() == year && p.payment_date.month() == month)
        .map(|p| p.amount)
        .sum()
}

/// Revenue per month of `year`; index 0 is January.
pub fn revenue_by_month(tables: &Tables, year: i32) -> [Decimal; 12] {
    let mut months = [Decimal::ZERO; 12];
    for payment in counted(tables).filter(|p| p.payment_date.year() == year) {
        months[payment.payment_date.month0() as usize] += payment.amount;
    }
    months
}

/// Revenue per payment method. Methods with no payments are absent.
pub fn revenue_by_method(tables: &Tables) -> BTreeMap<PaymentMethod, Decimal> {
    let mut totals = BTreeMap::new();
    for payment in counted(tables) {
        *totals.entry(payment.payment_method).or_insert(Decimal::ZERO) += payment.amount;
    }
    totals
}

/// Revenue per free-form category; blank categories are grouped under `""`.
pub fn revenue_by_category(tables: &Tables) -> BTreeMap<String, Decimal> {
    let mut totals = BTreeMap::new();
    for payment in counted(tables) {
        *totals
            .entry(payment.category.trim().to_string())
            .or_insert(Decimal::ZERO) += payment.amount;
    }
    totals
}

/// Sum of what indebted students still owe, as a positive amount.
pub fn outstanding_debt(tables: &Tables) -> Decimal {
    tables
        .students()
        .filter(|s| s.owes())
        .map(|s| -s.balance())
        .sum()
}
