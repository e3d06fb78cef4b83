// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

//! # Rate Converter
//!
//! Pure conversion layer over a captured [`RateSnapshot`]. No I/O: callers
//! capture a snapshot once per swap attempt and pass it to every function,
//! which is what keeps a settled amount identical to its quote under
//! concurrent oracle refreshes.
//!
//! ## Rounding Policy
//!
//! - Outbound fiat debits floor to the kobo: money leaving the system is
//!   never rounded in the customer's favor.
//! - Quotes round half-up to the kobo.
//! - Asset amounts keep full precision until fixed-point scaling.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::assets::{Asset, NGN_MINOR_PER_MAJOR};
use crate::oracle::RateSnapshot;

/// Result of a conversion: output amount plus the rate that produced it.
///
/// `output == 0` (or `rate == 0`) means a rate was unavailable; callers must
/// treat that as a hard quote failure, never as a valid zero-value swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Target-asset amount.
    pub output: Decimal,
    /// Applied conversion rate.
    pub rate: Decimal,
}

impl Quote {
    const UNAVAILABLE: Quote = Quote {
        output: Decimal::ZERO,
        rate: Decimal::ZERO,
    };

    /// True when the conversion could not be priced.
    pub fn is_unavailable(&self) -> bool {
        self.output.is_zero() || self.rate.is_zero()
    }
}

/// Convert an asset amount to its NGN value at the snapshot's rate.
pub fn to_fiat(snapshot: &RateSnapshot, asset: Asset, amount: Decimal) -> Decimal {
    amount * snapshot.rate(asset)
}

/// Convert an NGN amount to an asset amount at the snapshot's rate.
/// Returns zero when the rate is unavailable.
pub fn from_fiat(snapshot: &RateSnapshot, asset: Asset, fiat_amount: Decimal) -> Decimal {
    let rate = snapshot.rate(asset);
    if rate.is_zero() {
        return Decimal::ZERO;
    }
    fiat_amount / rate
}

/// Canonical conversion between any two registered assets.
///
/// Asset→asset conversions route through NGN as a pricing computation only;
/// no fiat ledger balance is touched.
pub fn convert(snapshot: &RateSnapshot, from: Asset, to: Asset, amount: Decimal) -> Quote {
    if from == to {
        return Quote {
            output: amount,
            rate: Decimal::ONE,
        };
    }

    if to.is_fiat() {
        let rate = snapshot.rate(from);
        if rate.is_zero() {
            return Quote::UNAVAILABLE;
        }
        return Quote {
            output: to_fiat(snapshot, from, amount),
            rate,
        };
    }

    if from.is_fiat() {
        let rate = snapshot.rate(to);
        if rate.is_zero() {
            return Quote::UNAVAILABLE;
        }
        return Quote {
            output: from_fiat(snapshot, to, amount),
            rate,
        };
    }

    let from_rate = snapshot.rate(from);
    let to_rate = snapshot.rate(to);
    if from_rate.is_zero() || to_rate.is_zero() {
        return Quote::UNAVAILABLE;
    }
    Quote {
        output: from_fiat(snapshot, to, to_fiat(snapshot, from, amount)),
        rate: from_rate / to_rate,
    }
}

/// Round an NGN amount half-up to the kobo, for user-facing quotes.
pub fn round_quote(fiat_amount: Decimal) -> Decimal {
    fiat_amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Floor an NGN amount to the kobo, for outbound debits.
pub fn floor_debit(fiat_amount: Decimal) -> Decimal {
    fiat_amount.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}

/// NGN amount to integer kobo, flooring (outbound discipline).
pub fn to_kobo_floor(fiat_amount: Decimal) -> Option<i64> {
    let minor = floor_debit(fiat_amount) * Decimal::from(NGN_MINOR_PER_MAJOR);
    minor.trunc().try_into().ok()
}

/// Integer kobo to an NGN decimal amount.
pub fn kobo_to_ngn(kobo: i64) -> Decimal {
    Decimal::from(kobo) / Decimal::from(NGN_MINOR_PER_MAJOR)
}
