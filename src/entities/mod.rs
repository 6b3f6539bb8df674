// Entity Models
// Plain values loaded from and written to the `cards` table.

pub mod account;

pub use account::{mask_card_number, Account};
