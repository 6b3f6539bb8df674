// Simple Banking System - Core Library
// Exposes the engine for the CLI binary and for tests

pub mod error;
pub mod entities;
pub mod card;
pub mod db;
pub mod transfer;
pub mod session;
pub mod ui;

// Re-export commonly used types
pub use error::{BankError, Result};
pub use entities::{mask_card_number, Account};
pub use card::{
    luhn_check_digit, luhn_is_valid, CardGenerator, IssuedCard,
    BIN, MAX_GENERATION_ATTEMPTS,
};
pub use db::{setup_database, AccountStore};
pub use transfer::{TransferEngine, TransferReceipt};
pub use session::{Command, Reply, Session, SessionController};
pub use ui::{parse_amount, render_reply, Console};
