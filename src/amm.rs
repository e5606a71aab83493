//! Constant-product market arithmetic.
//!
//! Pure functions reproducing the on-chain unsigned-128 truncating math
//! exactly. No floating point anywhere: a quote computed here must equal the
//! amount the finalize block settles, or the user sees phantom slippage.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Basis-point denominator for fees and prices.
pub const FEE_DENOM: u128 = 10_000;

/// YES-price when both reserves are zero (an even market).
pub const EVEN_PRICE_BPS: u64 = 5_000;

/// Which outcome side of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Result of a buy-shares quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    /// Units of each side minted from the collateral.
    pub minted_per_side: u128,
    /// Fee withheld from the minted other-side amount.
    pub fee: u128,
    /// Other-side amount swapped into the pool after the fee.
    pub swapped_in: u128,
    /// Target-side amount the swap returns.
    pub swapped_out: u128,
    /// Total target-side shares the trader receives.
    pub shares_out: u128,
    /// Projected reserves after the swap leg settles.
    pub new_yes_reserve: u128,
    pub new_no_reserve: u128,
}

fn mul_div_floor(a: u128, b: u128, d: u128) -> Result<u128> {
    let num = a
        .checked_mul(b)
        .ok_or_else(|| Error::Validation("u128 overflow in AMM computation".into()))?;
    Ok(num / d)
}

/// YES price in basis points.
///
/// `floor(no_reserve * 10_000 / (yes_reserve + no_reserve))`; defined as
/// [`EVEN_PRICE_BPS`] when both reserves are zero. A scarcer YES reserve
/// prices YES higher.
pub fn price_yes_bps(yes_reserve: u128, no_reserve: u128) -> u64 {
    let total = yes_reserve.saturating_add(no_reserve);
    if total == 0 {
        return EVEN_PRICE_BPS;
    }
    match mul_div_floor(no_reserve, FEE_DENOM, total) {
        Ok(bps) => bps as u64,
        Err(_) => EVEN_PRICE_BPS,
    }
}

/// Shares of `side` received for `collateral_in` microcredits of collateral.
///
/// Mirrors the on-chain buy path step for step:
/// 1. mint `collateral_in` units of YES and of NO;
/// 2. withhold `floor(minted * fee_bps / 10_000)` from the minted
///    *other*-side units;
/// 3. swap the after-fee other-side units into `side` through the pool:
///    `out = floor(after_fee * reserve_side / (reserve_other + after_fee))`;
/// 4. the trader keeps the minted `side` units plus the swap output.
pub fn swap_shares_out(
    side: Side,
    yes_reserve: u128,
    no_reserve: u128,
    fee_bps: u64,
    collateral_in: u128,
) -> Result<SwapQuote> {
    if yes_reserve == 0 || no_reserve == 0 {
        return Err(Error::ZeroReserves);
    }
    if collateral_in == 0 {
        return Err(Error::Validation("collateral_in must be non-zero".into()));
    }
    if u128::from(fee_bps) > FEE_DENOM {
        return Err(Error::Validation("fee_bps exceeds denominator".into()));
    }

    let (reserve_side, reserve_other) = match side {
        Side::Yes => (yes_reserve, no_reserve),
        Side::No => (no_reserve, yes_reserve),
    };

    let minted = collateral_in;
    let fee = mul_div_floor(minted, u128::from(fee_bps), FEE_DENOM)?;
    let after_fee = minted - fee;

    let denominator = reserve_other
        .checked_add(after_fee)
        .ok_or_else(|| Error::Validation("u128 overflow in AMM computation".into()))?;
    let swapped_out = mul_div_floor(after_fee, reserve_side, denominator)?;

    let shares_out = minted
        .checked_add(swapped_out)
        .ok_or_else(|| Error::Validation("u128 overflow in AMM computation".into()))?;

    let new_reserve_side = reserve_side - swapped_out;
    let new_reserve_other = denominator;
    let (new_yes_reserve, new_no_reserve) = match side {
        Side::Yes => (new_reserve_side, new_reserve_other),
        Side::No => (new_reserve_other, new_reserve_side),
    };

    Ok(SwapQuote {
        minted_per_side: minted,
        fee,
        swapped_in: after_fee,
        swapped_out,
        shares_out,
        new_yes_reserve,
        new_no_reserve,
    })
}

/// YES price after a hypothetical buy, used for price-impact display.
pub fn price_after_swap(
    side: Side,
    yes_reserve: u128,
    no_reserve: u128,
    fee_bps: u64,
    collateral_in: u128,
) -> Result<u64> {
    let quote = swap_shares_out(side, yes_reserve, no_reserve, fee_bps, collateral_in)?;
    Ok(price_yes_bps(quote.new_yes_reserve, quote.new_no_reserve))
}
