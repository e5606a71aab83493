use serde::{Deserialize, Serialize};

use crate::amm;
use crate::market::MarketId;
use crate::scalar;

/// Lifecycle of a market, as stored in the status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MarketStatus {
    /// Trading is live.
    Open = 0,
    /// Oracle outcome committed. Winning shares are redeemable.
    Resolved = 1,
    /// Trading suspended by the operator.
    Paused = 2,
}

impl MarketStatus {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Open),
            1 => Some(Self::Resolved),
            2 => Some(Self::Paused),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse the on-chain scalar form (`0u8`, `1u8.public`, ...).
    pub fn from_scalar(s: &str) -> Option<Self> {
        scalar::parse_u8(s).ok().and_then(Self::from_u8)
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }

    pub fn is_paused(self) -> bool {
        matches!(self, Self::Paused)
    }
}

/// Cached projection of a market's on-chain trading state.
///
/// Mutable on chain, refresh-on-TTL in the client; see
/// [`MarketRegistry`](crate::registry::MarketRegistry) for cache ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketState {
    pub market_id: MarketId,
    pub status: MarketStatus,
    pub yes_reserve: u128,
    pub no_reserve: u128,
    pub collateral_pool: u128,
    pub fee_bps: u64,
    /// Last traded YES price from the price mapping, when present.
    pub stored_price_bps: Option<u64>,
    /// `Some(true)` = YES won. Absent until resolution.
    pub outcome: Option<bool>,
}

impl MarketState {
    /// YES price in basis points: the stored last price when the chain has
    /// one, otherwise derived from reserves. The two are not assumed to
    /// agree.
    pub fn price_yes_bps(&self) -> u64 {
        self.stored_price_bps
            .unwrap_or_else(|| amm::price_yes_bps(self.yes_reserve, self.no_reserve))
    }

    pub fn is_paused(&self) -> bool {
        self.status.is_paused()
    }

    /// The winning side of a resolved market.
    pub fn winning_side(&self) -> Option<amm::Side> {
        if !self.status.is_resolved() {
            return None;
        }
        self.outcome.map(|yes| {
            if yes {
                amm::Side::Yes
            } else {
                amm::Side::No
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(status: MarketStatus) -> MarketState {
        MarketState {
            market_id: MarketId::normalize("7field"),
            status,
            yes_reserve: 100,
            no_reserve: 300,
            collateral_pool: 400,
            fee_bps: 30,
            stored_price_bps: None,
            outcome: None,
        }
    }

    #[test]
    fn status_roundtrip() {
        for v in 0..=2 {
            let s = MarketStatus::from_u8(v).unwrap();
            assert_eq!(s.as_u8(), v);
        }
        assert!(MarketStatus::from_u8(3).is_none());
    }

    #[test]
    fn status_from_scalar() {
        assert_eq!(MarketStatus::from_scalar("0u8"), Some(MarketStatus::Open));
        assert_eq!(
            MarketStatus::from_scalar("2u8.public"),
            Some(MarketStatus::Paused)
        );
        assert_eq!(MarketStatus::from_scalar("9u8"), None);
        assert_eq!(MarketStatus::from_scalar("garbage"), None);
    }

    #[test]
    fn price_prefers_stored_value() {
        let mut s = state(MarketStatus::Open);
        assert_eq!(s.price_yes_bps(), 7_500); // derived from 100/300
        s.stored_price_bps = Some(7_100);
        assert_eq!(s.price_yes_bps(), 7_100); // stored wins, no convergence assumed
    }

    #[test]
    fn winning_side_requires_resolution() {
        let mut s = state(MarketStatus::Open);
        s.outcome = Some(true);
        assert_eq!(s.winning_side(), None);

        let mut s = state(MarketStatus::Resolved);
        s.outcome = Some(true);
        assert_eq!(s.winning_side(), Some(amm::Side::Yes));
        s.outcome = Some(false);
        assert_eq!(s.winning_side(), Some(amm::Side::No));
        s.outcome = None;
        assert_eq!(s.winning_side(), None);
    }
}
