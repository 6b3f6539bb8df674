// Error taxonomy for the banking engine
// Rejections are recovered by the console, storage failures are not.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BankError>;

#[derive(Debug, Error)]
pub enum BankError {
    /// Transfer target fails the Luhn checksum
    #[error("Probably you made a mistake in the card number. Please try again!")]
    ChecksumMismatch,

    /// Transfer target is Luhn-valid but unknown
    #[error("Such a card does not exist.")]
    CardNotFound,

    #[error("Not enough money!")]
    InsufficientFunds,

    #[error("You can't transfer money to the same account!")]
    SameAccount,

    /// Credit would push a balance past the largest storable integer
    #[error("This amount would exceed the maximum balance.")]
    BalanceLimitExceeded,

    /// A row disappeared between lookup and update
    #[error("Account {0} no longer exists")]
    AccountNotFound(i64),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Could not generate a unique card number after {0} attempts")]
    GeneratorExhausted(u32),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Console read/write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BankError {
    /// Rejections that leave the session usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BankError::ChecksumMismatch
                | BankError::CardNotFound
                | BankError::InsufficientFunds
                | BankError::SameAccount
                | BankError::BalanceLimitExceeded
                | BankError::InvalidInput(_)
        )
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        BankError::InvalidInput(message.into())
    }
}
