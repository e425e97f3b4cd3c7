use alloy_primitives::{Address, U256};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("Math error - overflow")]
    Overflow,
    #[error("Math error - underflow")]
    Underflow,
    #[error("Math error - out of bounds")]
    OutOfBounds,
    #[error("Math error - division by zero")]
    DivisionByZero,
    #[error("BitMath error - zero input value")]
    ZeroValue,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("State error - sqrtPrice out of bounds")]
    SqrtPriceOutOfBounds,
    #[error("State error - sqrtPrice is 0")]
    SqrtPriceIsZero,
    #[error("State error - sqrtRatio is 0")]
    SqrtRatioIsZero,

    #[error("State error - tick out of bounds")]
    TickOutOfBounds,

    #[error("State error - liquidity is 0")]
    LiquidityIsZero,

    #[error("State error - requested amount exceeds pool reserves")]
    InsufficientReserves,

    #[error("State error - limit order price is 0")]
    PriceIsZero,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool error - invalid tick range")]
    InvalidTickRange,
    #[error("Pool error - tick is not a multiple of the tick spacing")]
    TickNotSpaced,
    #[error("Pool error - amount is 0")]
    ZeroAmount,
    #[error("Pool error - tick liquidity cap exceeded")]
    LiquidityOverflow,
    #[error("Pool error - burn exceeds position liquidity")]
    InsufficientLiquidity,
    #[error("Pool error - position not found")]
    PositionNotFound,
    #[error("Pool error - sqrt price limit out of bounds")]
    InvalidPriceLimit,
    #[error("Pool error - invariant violated: {0}")]
    InvariantViolation(&'static str),
    #[error("Pool error - already initialized")]
    AlreadyInitialized,
    #[error("Pool error - not initialized")]
    NotInitialized,
    #[error("Pool error - protocol fee must be 0 or between 4 and 10")]
    InvalidFeeProtocol,
    #[error("Pool error - invalid config: {0}")]
    InvalidConfig(&'static str),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Ledger error - {account} holds {balance} of {token}, cannot transfer {amount}")]
    InsufficientBalance {
        account: Address,
        token: Address,
        balance: U256,
        amount: U256,
    },
    #[error("Ledger error - {failed} transfers could not be reversed")]
    RollbackFailed { failed: usize },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    MathError(#[from] crate::error::MathError),

    #[error(transparent)]
    StateError(#[from] crate::error::StateError),

    #[error(transparent)]
    PoolError(#[from] crate::error::PoolError),

    #[error(transparent)]
    LedgerError(#[from] crate::error::LedgerError),
}
