// 🔢 Card Numbers - Luhn checksum + unique card/PIN generation
//
// Card number layout (16 digits):
//   400000    BIN (issuer prefix)
//   DDDDDDDDD 9 random digits (account identifier)
//   C         Luhn check digit

use rand::rngs::ThreadRng;
use rand::Rng;
use tracing::{debug, warn};

use crate::db::AccountStore;
use crate::error::{BankError, Result};

pub const BIN: &str = "400000";
pub const CARD_NUMBER_LEN: usize = 16;
pub const PIN_LEN: usize = 4;
const ACCOUNT_DIGITS: usize = CARD_NUMBER_LEN - BIN.len() - 1;

/// Retries before giving up on finding an unused number
pub const MAX_GENERATION_ATTEMPTS: u32 = 100;

// ============================================================================
// LUHN CHECKSUM
// ============================================================================

/// Sum of Luhn contributions, doubling every second digit counted from the
/// right-most one. `None` if the input contains a non-digit.
fn luhn_sum(digits: &str, double_rightmost: bool) -> Option<u32> {
    let mut sum = 0;
    for (i, ch) in digits.chars().rev().enumerate() {
        let mut digit = ch.to_digit(10)?;
        if (i % 2 == 0) == double_rightmost {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    Some(sum)
}

/// True when `number` is a non-empty digit string passing the Luhn check
pub fn luhn_is_valid(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }
    matches!(luhn_sum(number, false), Some(sum) if sum % 10 == 0)
}

/// Digit that makes `payload + digit` pass the Luhn check
pub fn luhn_check_digit(payload: &str) -> Option<u8> {
    let sum = luhn_sum(payload, true)?;
    Some(((10 - sum % 10) % 10) as u8)
}

/// Shape check for user-typed card numbers (before the checksum)
pub fn is_well_formed(number: &str) -> bool {
    number.len() == CARD_NUMBER_LEN && number.chars().all(|c| c.is_ascii_digit())
}

// ============================================================================
// GENERATOR
// ============================================================================

/// Freshly issued credentials, shown to the user exactly once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCard {
    pub number: String,
    pub pin: String,
}

/// Produces Luhn-valid card numbers that are not yet in the store
pub struct CardGenerator<R: Rng = ThreadRng> {
    rng: R,
    max_attempts: u32,
}

impl CardGenerator<ThreadRng> {
    pub fn new() -> Self {
        Self::with_rng(rand::thread_rng())
    }
}

impl Default for CardGenerator<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> CardGenerator<R> {
    /// Use a caller-supplied RNG (seeded in tests)
    pub fn with_rng(rng: R) -> Self {
        CardGenerator {
            rng,
            max_attempts: MAX_GENERATION_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// One random Luhn-valid number, not checked for uniqueness
    pub fn candidate(&mut self) -> String {
        let mut number = String::with_capacity(CARD_NUMBER_LEN);
        number.push_str(BIN);
        for _ in 0..ACCOUNT_DIGITS {
            number.push(self.random_digit());
        }
        // payload is all ASCII digits, so a check digit always exists
        let check = luhn_check_digit(&number).unwrap_or(0);
        number.push(char::from(b'0' + check));
        number
    }

    pub fn pin(&mut self) -> String {
        (0..PIN_LEN).map(|_| self.random_digit()).collect()
    }

    /// Issue a card whose number is not yet present in `store`
    pub fn generate(&mut self, store: &AccountStore) -> Result<IssuedCard> {
        self.generate_unique(|number| store.exists_number(number))
    }

    /// Issue a card, probing `exists` for collisions
    pub fn generate_unique<F>(&mut self, mut exists: F) -> Result<IssuedCard>
    where
        F: FnMut(&str) -> Result<bool>,
    {
        for attempt in 1..=self.max_attempts {
            let number = self.candidate();
            if exists(&number)? {
                debug!(attempt, "card number collision, retrying");
                continue;
            }
            let pin = self.pin();
            return Ok(IssuedCard { number, pin });
        }

        warn!(attempts = self.max_attempts, "card number space exhausted");
        Err(BankError::GeneratorExhausted(self.max_attempts))
    }

    fn random_digit(&mut self) -> char {
        char::from(b'0' + self.rng.gen_range(0..10u8))
    }
}

// ============================================================================
// TESTS
// ============================================================================
