// 💳 Account Entity - one row of the `cards` table
//
// "Card number is IDENTITY for the user, row id is IDENTITY for the store"
//
// - id:      surrogate key assigned by SQLite, never changes
// - number:  16-digit Luhn-valid card number, unique, never changes
// - pin:     4-digit PIN, never changes
// - balance: non-negative integer amount (minor currency unit)

use rusqlite::Row;

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Store-assigned row id
    pub id: i64,

    /// Card number, e.g. "4000003972196501"
    pub number: String,

    /// PIN, leading zeros kept ("0042")
    pub pin: String,

    /// Current balance
    pub balance: i64,
}

impl Account {
    /// Column list matching `from_row`
    pub const COLUMNS: &'static str = "id, number, pin, balance";

    /// Build from a row selected with `Account::COLUMNS`
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Account {
            id: row.get(0)?,
            number: row.get(1)?,
            pin: row.get(2)?,
            balance: row.get(3)?,
        })
    }

    /// PIN comparison used by login
    pub fn pin_matches(&self, pin: &str) -> bool {
        self.pin == pin.trim()
    }

    pub fn can_afford(&self, amount: i64) -> bool {
        amount <= self.balance
    }

    /// Mask card number (show only last 4 digits), safe for logs
    ///
    /// Example: "4000003972196501" → "*6501"
    pub fn masked_number(&self) -> String {
        mask_card_number(&self.number)
    }
}

/// Mask a card number for log output
pub fn mask_card_number(number: &str) -> String {
    if number.len() <= 4 {
        return number.to_string();
    }
    format!("*{}", &number[number.len() - 4..])
}

// ============================================================================
// TESTS
// ============================================================================
