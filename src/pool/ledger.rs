//! Token custody used by the pool.
//!
//! The pool never holds balances itself. Every movement of tokens goes
//! through a [`Ledger`], with the pool identified by its configured
//! address. Mutating pool calls wrap the caller's ledger in a [`Journal`]
//! so transfers made before a failure can be reversed.

use crate::FastMap;
use crate::error::{Error, LedgerError, MathError};
use alloy_primitives::{Address, U256};
use tracing::warn;

/// Balance-checked token transfers between accounts.
pub trait Ledger {
    /// Moves `amount` of `token` from `payer` to `payee`.
    ///
    /// Must fail, rather than clamp, when `payer` holds less than `amount`.
    fn transfer_token(
        &mut self,
        payer: Address,
        payee: Address,
        token: Address,
        amount: U256,
    ) -> Result<(), Error>;

    fn balance_of(&self, account: Address, token: Address) -> U256;
}

/// Plain in-memory ledger keyed by `(account, token)`.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    balances: FastMap<(Address, Address), U256>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` of `token` to `account` out of thin air.
    pub fn mint(&mut self, account: Address, token: Address, amount: U256) {
        let balance = self.balances.entry((account, token)).or_default();
        *balance = balance.saturating_add(amount);
    }
}

impl Ledger for InMemoryLedger {
    fn transfer_token(
        &mut self,
        payer: Address,
        payee: Address,
        token: Address,
        amount: U256,
    ) -> Result<(), Error> {
        if amount.is_zero() || payer == payee {
            return Ok(());
        }
        let balance = self.balance_of(payer, token);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: payer,
                token,
                balance,
                amount,
            }
            .into());
        }
        let payee_balance = self
            .balance_of(payee, token)
            .checked_add(amount)
            .ok_or(MathError::Overflow)?;

        self.balances.insert((payer, token), balance - amount);
        self.balances.insert((payee, token), payee_balance);
        Ok(())
    }

    fn balance_of(&self, account: Address, token: Address) -> U256 {
        self.balances
            .get(&(account, token))
            .copied()
            .unwrap_or(U256::ZERO)
    }
}

/// A transfer that went through a [`Journal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub payer: Address,
    pub payee: Address,
    pub token: Address,
    pub amount: U256,
}

/// Records every successful transfer made through it so they can be
/// undone when the surrounding operation fails.
///
/// Each entry holds what the payee's balance actually gained, which is
/// what a reversal can hand back for tokens that skim on transfer.
pub struct Journal<'a, L: Ledger + ?Sized> {
    inner: &'a mut L,
    transfers: Vec<Transfer>,
}

impl<'a, L: Ledger + ?Sized> Journal<'a, L> {
    pub fn new(inner: &'a mut L) -> Self {
        Self {
            inner,
            transfers: Vec::new(),
        }
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Reverses every recorded transfer, newest first.
    ///
    /// Every reversal is attempted. Fails with
    /// `LedgerError::RollbackFailed` if the ledger refused any of them.
    pub fn rollback(self) -> Result<(), Error> {
        let mut failed = 0;
        for transfer in self.transfers.into_iter().rev() {
            if let Err(err) = self.inner.transfer_token(
                transfer.payee,
                transfer.payer,
                transfer.token,
                transfer.amount,
            ) {
                warn!(
                    payer = %transfer.payer,
                    payee = %transfer.payee,
                    token = %transfer.token,
                    amount = %transfer.amount,
                    error = %err,
                    "failed to reverse transfer during rollback"
                );
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(LedgerError::RollbackFailed { failed }.into());
        }
        Ok(())
    }
}

impl<L: Ledger + ?Sized> Ledger for Journal<'_, L> {
    fn transfer_token(
        &mut self,
        payer: Address,
        payee: Address,
        token: Address,
        amount: U256,
    ) -> Result<(), Error> {
        let payee_before = self.inner.balance_of(payee, token);
        self.inner.transfer_token(payer, payee, token, amount)?;
        let received = self
            .inner
            .balance_of(payee, token)
            .saturating_sub(payee_before);
        if !received.is_zero() {
            self.transfers.push(Transfer {
                payer,
                payee,
                token,
                amount: received,
            });
        }
        Ok(())
    }

    fn balance_of(&self, account: Address, token: Address) -> U256 {
        self.inner.balance_of(account, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::with_last_byte(b)
    }

    #[test]
    fn transfer_moves_balance() {
        let mut ledger = InMemoryLedger::new();
        ledger.mint(addr(1), addr(9), U256::from(100u8));
        ledger
            .transfer_token(addr(1), addr(2), addr(9), U256::from(40u8))
            .unwrap();
        assert_eq!(ledger.balance_of(addr(1), addr(9)), U256::from(60u8));
        assert_eq!(ledger.balance_of(addr(2), addr(9)), U256::from(40u8));
    }

    #[test]
    fn transfer_fails_instead_of_clamping() {
        let mut ledger = InMemoryLedger::new();
        ledger.mint(addr(1), addr(9), U256::from(10u8));
        let err = ledger
            .transfer_token(addr(1), addr(2), addr(9), U256::from(11u8))
            .unwrap_err();
        assert_eq!(
            err,
            Error::LedgerError(LedgerError::InsufficientBalance {
                account: addr(1),
                token: addr(9),
                balance: U256::from(10u8),
                amount: U256::from(11u8),
            })
        );
        assert_eq!(ledger.balance_of(addr(1), addr(9)), U256::from(10u8));
        assert_eq!(ledger.balance_of(addr(2), addr(9)), U256::ZERO);
    }

    #[test]
    fn journal_rolls_back_in_reverse_order() {
        let mut ledger = InMemoryLedger::new();
        ledger.mint(addr(1), addr(9), U256::from(100u8));

        let mut journal = Journal::new(&mut ledger);
        journal
            .transfer_token(addr(1), addr(2), addr(9), U256::from(100u8))
            .unwrap();
        // only possible because the first transfer landed
        journal
            .transfer_token(addr(2), addr(3), addr(9), U256::from(70u8))
            .unwrap();
        assert!(
            journal
                .transfer_token(addr(1), addr(3), addr(9), U256::ONE)
                .is_err()
        );
        assert_eq!(journal.transfers().len(), 2);
        journal.rollback().unwrap();

        assert_eq!(ledger.balance_of(addr(1), addr(9)), U256::from(100u8));
        assert_eq!(ledger.balance_of(addr(2), addr(9)), U256::ZERO);
        assert_eq!(ledger.balance_of(addr(3), addr(9)), U256::ZERO);
    }

    /// Moves a tenth of every transfer on to a collector.
    struct SkimmingLedger {
        inner: InMemoryLedger,
        collector: Address,
    }

    impl Ledger for SkimmingLedger {
        fn transfer_token(
            &mut self,
            payer: Address,
            payee: Address,
            token: Address,
            amount: U256,
        ) -> Result<(), Error> {
            self.inner.transfer_token(payer, payee, token, amount)?;
            let cut = amount / U256::from(10u8);
            self.inner.transfer_token(payee, self.collector, token, cut)
        }

        fn balance_of(&self, account: Address, token: Address) -> U256 {
            self.inner.balance_of(account, token)
        }
    }

    #[test]
    fn journal_reverses_what_the_payee_received() {
        let mut ledger = SkimmingLedger {
            inner: InMemoryLedger::new(),
            collector: addr(7),
        };
        ledger.inner.mint(addr(1), addr(9), U256::from(100u8));

        let mut journal = Journal::new(&mut ledger);
        journal
            .transfer_token(addr(1), addr(2), addr(9), U256::from(100u8))
            .unwrap();
        assert_eq!(journal.transfers()[0].amount, U256::from(90u8));
        journal.rollback().unwrap();

        // the reversal is skimmed again on its way back
        assert_eq!(ledger.balance_of(addr(2), addr(9)), U256::ZERO);
        assert_eq!(ledger.balance_of(addr(1), addr(9)), U256::from(81u8));
        assert_eq!(ledger.balance_of(addr(7), addr(9)), U256::from(19u8));
    }

    #[test]
    fn refused_reversal_is_reported() {
        let mut ledger = InMemoryLedger::new();
        ledger.mint(addr(1), addr(9), U256::from(100u8));

        let mut journal = Journal::new(&mut ledger);
        journal
            .transfer_token(addr(1), addr(2), addr(9), U256::from(100u8))
            .unwrap();
        // the payee spends what it received before the rollback
        journal
            .inner
            .transfer_token(addr(2), addr(3), addr(9), U256::from(100u8))
            .unwrap();
        assert_eq!(
            journal.rollback(),
            Err(Error::LedgerError(LedgerError::RollbackFailed { failed: 1 }))
        );
    }
}
