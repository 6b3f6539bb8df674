// 💸 Transfer Engine - validate, then move funds atomically
//
// Validation order (first failure wins, nothing is written):
//   1. target is the sender's own card   → SameAccount
//   2. target is malformed or fails Luhn → ChecksumMismatch
//   3. target is not in the store        → CardNotFound
//   4. amount is not positive            → InvalidInput
//   5. amount exceeds sender balance     → InsufficientFunds
//   6. credit overflows target balance   → BalanceLimitExceeded

use tracing::{info, warn};

use crate::card::{is_well_formed, luhn_is_valid};
use crate::db::AccountStore;
use crate::entities::{mask_card_number, Account};
use crate::error::{BankError, Result};

/// Outcome of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub from_id: i64,
    pub to_id: i64,
    pub amount: i64,
}

pub struct TransferEngine<'a> {
    store: &'a mut AccountStore,
}

impl<'a> TransferEngine<'a> {
    pub fn new(store: &'a mut AccountStore) -> Self {
        TransferEngine { store }
    }

    /// Read-only checks on the target card, run before an amount is known
    pub fn check_target(&self, sender: &Account, target_number: &str) -> Result<Account> {
        let target_number = target_number.trim();

        if target_number == sender.number {
            return Err(reject(BankError::SameAccount, target_number));
        }
        if !is_well_formed(target_number) || !luhn_is_valid(target_number) {
            return Err(reject(BankError::ChecksumMismatch, target_number));
        }

        match self.store.find_by_number(target_number)? {
            Some(target) => Ok(target),
            None => Err(reject(BankError::CardNotFound, target_number)),
        }
    }

    /// Validate every rule, then debit and credit in one transaction
    pub fn transfer(
        &mut self,
        sender: &Account,
        target_number: &str,
        amount: i64,
    ) -> Result<TransferReceipt> {
        let target = self.check_target(sender, target_number)?;

        if amount <= 0 {
            return Err(reject(
                BankError::invalid_input("Transfer amount must be positive"),
                target_number,
            ));
        }
        if !sender.can_afford(amount) {
            return Err(reject(BankError::InsufficientFunds, target_number));
        }
        if target.balance.checked_add(amount).is_none() {
            return Err(reject(BankError::BalanceLimitExceeded, target_number));
        }

        self.store.transfer(sender.id, target.id, amount)?;

        info!(
            from = %sender.masked_number(),
            to = %target.masked_number(),
            amount,
            "transfer completed"
        );
        Ok(TransferReceipt {
            from_id: sender.id,
            to_id: target.id,
            amount,
        })
    }
}

fn reject(err: BankError, target_number: &str) -> BankError {
    warn!(card = %mask_card_number(target_number), reason = %err, "transfer rejected");
    err
}
