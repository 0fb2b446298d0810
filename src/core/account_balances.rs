//! Account balance registry
//!
//! This module provides `AccountBalances`, the fixed-size balance array behind
//! the ledger service. It knows nothing about leases, locks or persistence: it
//! only applies checked arithmetic to the three credit buckets.
//!
//! Mutations are expressed as "compute the next value" rather than "mutate in
//! place", so the ledger service can persist the next balances first and only
//! then make them visible.

use crate::types::{Account, BankError};

/// Balances of the fixed credit buckets, in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountBalances {
    balances: [i64; Account::COUNT],
}

impl AccountBalances {
    /// Create a registry with every bucket at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from explicit balances
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if any balance is negative; a negative balance
    /// can only come from a damaged ledger block.
    pub fn from_balances(balances: [i64; Account::COUNT]) -> Result<Self, BankError> {
        if let Some(&amount) = balances.iter().find(|&&b| b < 0) {
            return Err(BankError::InvalidAmount { amount });
        }
        Ok(Self { balances })
    }

    /// Balance of a single bucket
    pub fn get(&self, account: Account) -> i64 {
        self.balances[account.index()]
    }

    /// Aggregate balance over all buckets
    ///
    /// Saturates rather than wrapping; deposits refuse to push the aggregate
    /// past `i64::MAX`, so saturation only matters for hand-built registries.
    pub fn total(&self) -> i64 {
        self.balances
            .iter()
            .fold(0i64, |total, &balance| total.saturating_add(balance))
    }

    /// Iterate `(account, balance)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (Account, i64)> + '_ {
        Account::ALL.iter().map(move |&account| (account, self.get(account)))
    }

    /// Balances after depositing `amount` into `account`
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is negative
    /// - `ArithmeticOverflow` if the bucket or the aggregate would overflow
    pub fn with_deposit(&self, account: Account, amount: i64) -> Result<Self, BankError> {
        if amount < 0 {
            return Err(BankError::InvalidAmount { amount });
        }

        let new_balance = self
            .get(account)
            .checked_add(amount)
            .ok_or_else(|| BankError::arithmetic_overflow("deposit", account))?;

        // The aggregate is what callers see as the credit meter, so it must stay
        // representable too.
        self.total()
            .checked_add(amount)
            .ok_or_else(|| BankError::arithmetic_overflow("deposit", account))?;

        let mut next = *self;
        next.balances[account.index()] = new_balance;
        Ok(next)
    }

    /// Whether `amount` can be withdrawn from `account` without going negative
    pub fn can_withdraw(&self, account: Account, amount: i64) -> bool {
        amount >= 0 && self.get(account) >= amount
    }

    /// Balances after withdrawing `amount` from `account`
    ///
    /// Returns `None` if the bucket holds less than `amount` (or `amount` is
    /// negative). The caller decides how loudly to fail.
    pub fn with_withdrawal(&self, account: Account, amount: i64) -> Option<Self> {
        if !self.can_withdraw(account, amount) {
            return None;
        }

        let mut next = *self;
        next.balances[account.index()] = self.get(account) - amount;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_zeroed() {
        let balances = AccountBalances::new();

        for account in Account::ALL {
            assert_eq!(balances.get(account), 0);
        }
        assert_eq!(balances.total(), 0);
    }

    #[test]
    fn test_from_balances_rejects_negative() {
        let result = AccountBalances::from_balances([10, -1, 0]);
        assert_eq!(result, Err(BankError::InvalidAmount { amount: -1 }));
    }

    #[test]
    fn test_deposit_increases_only_target_bucket() {
        let balances = AccountBalances::new();

        let next = balances.with_deposit(Account::Promo, 250).unwrap();

        assert_eq!(next.get(Account::Promo), 250);
        assert_eq!(next.get(Account::Cashable), 0);
        assert_eq!(next.get(Account::NonCash), 0);
        assert_eq!(next.total(), 250);
        // The original is untouched
        assert_eq!(balances.total(), 0);
    }

    #[test]
    fn test_deposit_multiple_times_accumulates() {
        let balances = AccountBalances::new()
            .with_deposit(Account::Cashable, 100)
            .unwrap()
            .with_deposit(Account::Cashable, 250)
            .unwrap()
            .with_deposit(Account::NonCash, 50)
            .unwrap();

        assert_eq!(balances.get(Account::Cashable), 350);
        assert_eq!(balances.total(), 400);
    }

    #[test]
    fn test_deposit_negative_amount_fails() {
        let result = AccountBalances::new().with_deposit(Account::Cashable, -1);
        assert_eq!(result, Err(BankError::InvalidAmount { amount: -1 }));
    }

    #[test]
    fn test_deposit_overflow_in_bucket() {
        let balances = AccountBalances::from_balances([i64::MAX, 0, 0]).unwrap();

        let result = balances.with_deposit(Account::Cashable, 1);

        assert!(matches!(
            result,
            Err(BankError::ArithmeticOverflow { account: Account::Cashable, .. })
        ));
    }

    #[test]
    fn test_deposit_overflow_in_aggregate() {
        let balances = AccountBalances::from_balances([i64::MAX - 10, 0, 0]).unwrap();

        let result = balances.with_deposit(Account::Promo, 20);

        assert!(matches!(
            result,
            Err(BankError::ArithmeticOverflow { account: Account::Promo, .. })
        ));
    }

    #[test]
    fn test_withdrawal_decreases_bucket() {
        let balances = AccountBalances::from_balances([1000, 0, 0]).unwrap();

        let next = balances.with_withdrawal(Account::Cashable, 400).unwrap();

        assert_eq!(next.get(Account::Cashable), 600);
        assert_eq!(next.total(), 600);
    }

    #[test]
    fn test_withdrawal_of_entire_balance() {
        let balances = AccountBalances::from_balances([1000, 0, 0]).unwrap();

        let next = balances.with_withdrawal(Account::Cashable, 1000).unwrap();

        assert_eq!(next.get(Account::Cashable), 0);
    }

    #[test]
    fn test_withdrawal_with_insufficient_funds() {
        let balances = AccountBalances::from_balances([1000, 0, 0]).unwrap();

        assert!(!balances.can_withdraw(Account::Cashable, 1500));
        assert_eq!(balances.with_withdrawal(Account::Cashable, 1500), None);
    }

    #[test]
    fn test_withdrawal_cannot_use_other_buckets() {
        let balances = AccountBalances::from_balances([100, 900, 900]).unwrap();

        assert_eq!(balances.with_withdrawal(Account::Cashable, 500), None);
    }

    #[test]
    fn test_withdrawal_negative_amount_is_refused() {
        let balances = AccountBalances::from_balances([100, 0, 0]).unwrap();
        assert_eq!(balances.with_withdrawal(Account::Cashable, -5), None);
    }

    #[test]
    fn test_iter_yields_index_order() {
        let balances = AccountBalances::from_balances([1, 2, 3]).unwrap();
        let pairs: Vec<_> = balances.iter().collect();
        assert_eq!(
            pairs,
            vec![
                (Account::Cashable, 1),
                (Account::NonCash, 2),
                (Account::Promo, 3)
            ]
        );
    }
}
