pub mod config;
pub mod hybrid_pool;
pub mod ledger;
pub mod position;
pub mod swap;
pub mod tick;

#[cfg(test)]
mod proptest_properties;

/// One of the two pool tokens.
///
/// For limit orders this is the deposit token: a `Token0` order sells
/// token0 for token1 at its tick price, a `Token1` order the reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Asset {
    Token0,
    Token1,
}

impl Asset {
    /// The token on the other side of the pair.
    #[inline]
    pub fn other(self) -> Self {
        match self {
            Asset::Token0 => Asset::Token1,
            Asset::Token1 => Asset::Token0,
        }
    }

    /// Side of the book a swap in the given direction fills.
    #[inline]
    pub fn consumed_by(zero_for_one: bool) -> Self {
        if zero_for_one {
            Asset::Token1
        } else {
            Asset::Token0
        }
    }
}
