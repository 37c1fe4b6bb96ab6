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

//! Engine settings.

use crate::money::{self, MAX_AMOUNT};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchoolConfig {
    /// Largest amount accepted for a single payment or charge.
    pub max_amount: Decimal,
    /// Leading segment of generated receipt numbers.
    pub receipt_prefix: String,
}

impl SchoolConfig {
    /// Falls back to the defaults for a non-positive maximum or a blank
    /// prefix.
    pub fn new(max_amount: Decimal, receipt_prefix: impl Into<String>) -> Self {
        let defaults = Self::default();
        let max_amount = money::round(max_amount);
        let receipt_prefix = receipt_prefix.into().trim().to_string();
        Self {
            max_amount: if max_amount > Decimal::ZERO {
                max_amount
            } else {
                defaults.max_amount
            },
            receipt_prefix: if receipt_prefix.is_empty() {
                defaults.receipt_prefix
            } else {
                receipt_prefix
            },
        }
    }
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            max_amount: MAX_AMOUNT,
            receipt_prefix: "RCP".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults() {
        let config = SchoolConfig::default();
        assert_eq!(config.max_amount, MAX_AMOUNT);
        assert_eq!(config.receipt_prefix, "RCP");
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = SchoolConfig::new(dec!(-1), "  ");
        assert_eq!(config, SchoolConfig::default());
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let config: SchoolConfig = serde_json::from_str(r#"{"receipt_prefix":"AUTO"}"#).unwrap();
        assert_eq!(config.receipt_prefix, "AUTO");
        assert_eq!(config.max_amount, MAX_AMOUNT);
    }
}
