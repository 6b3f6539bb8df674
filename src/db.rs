use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

use crate::entities::{mask_card_number, Account};
use crate::error::{BankError, Result};

/// Durable account table backed by one SQLite connection.
///
/// Every mutating method runs inside its own transaction. A transaction that
/// is dropped without `commit()` rolls back, so an early `?` return never
/// leaves a half-applied write behind.
pub struct AccountStore {
    conn: Connection,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases report "memory")
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "FULL")?;

    // ==========================================================================
    // Cards Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY,
            number TEXT UNIQUE NOT NULL,
            pin TEXT NOT NULL,
            balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0)
        )",
        [],
    )?;

    Ok(())
}

impl AccountStore {
    /// Open (or create) the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening account store");
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(AccountStore { conn })
    }

    /// Insert a new card with a zero balance, returning its row id
    pub fn create_account(&mut self, number: &str, pin: &str) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO cards (number, pin, balance) VALUES (?1, ?2, 0)",
            params![number, pin],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(id, card = %mask_card_number(number), "account created");
        Ok(id)
    }

    pub fn find_by_number(&self, number: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {} FROM cards WHERE number = ?1", Account::COLUMNS);
        let account = self
            .conn
            .query_row(&sql, [number], Account::from_row)
            .optional()?;
        Ok(account)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Account>> {
        let sql = format!("SELECT {} FROM cards WHERE id = ?1", Account::COLUMNS);
        let account = self
            .conn
            .query_row(&sql, [id], Account::from_row)
            .optional()?;
        Ok(account)
    }

    /// Lookup for login: the number must exist and the PIN must match
    pub fn find_by_credentials(&self, number: &str, pin: &str) -> Result<Option<Account>> {
        Ok(self
            .find_by_number(number.trim())?
            .filter(|account| account.pin_matches(pin)))
    }

    pub fn exists_number(&self, number: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cards WHERE number = ?1)",
            [number],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Overwrite the balance of one row
    pub fn update_balance(&mut self, id: i64, new_balance: i64) -> Result<()> {
        if new_balance < 0 {
            return Err(BankError::invalid_input("Balance cannot be negative"));
        }

        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE cards SET balance = ?1 WHERE id = ?2",
            params![new_balance, id],
        )?;
        if updated == 0 {
            return Err(BankError::AccountNotFound(id));
        }
        tx.commit()?;

        debug!(id, new_balance, "balance updated");
        Ok(())
    }

    /// Add `amount` to the balance of one row and return the new balance
    pub fn deposit(&mut self, id: i64, amount: i64) -> Result<i64> {
        if amount <= 0 {
            return Err(BankError::invalid_input("Income must be a positive amount"));
        }

        let tx = self.conn.transaction()?;
        // SQLite turns an overflowing integer into a REAL, so bound it here
        let updated = tx.execute(
            "UPDATE cards SET balance = balance + ?1 WHERE id = ?2 AND balance <= ?3 - ?1",
            params![amount, id, i64::MAX],
        )?;
        if updated == 0 {
            return Err(if row_exists(&tx, id)? {
                BankError::BalanceLimitExceeded
            } else {
                BankError::AccountNotFound(id)
            });
        }
        let balance: i64 =
            tx.query_row("SELECT balance FROM cards WHERE id = ?1", [id], |row| row.get(0))?;
        tx.commit()?;

        info!(id, amount, balance, "income added");
        Ok(balance)
    }

    /// Move `amount` from one row to another in a single transaction.
    ///
    /// The debit is guarded by `balance >= amount` and the credit by
    /// `balance <= i64::MAX - amount`, so a stale caller can never drive a
    /// balance negative or out of the integer range.
    pub fn transfer(&mut self, from_id: i64, to_id: i64, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(BankError::invalid_input("Transfer amount must be positive"));
        }
        if from_id == to_id {
            return Err(BankError::SameAccount);
        }

        let tx = self.conn.transaction()?;

        let debited = tx.execute(
            "UPDATE cards SET balance = balance - ?1 WHERE id = ?2 AND balance >= ?1",
            params![amount, from_id],
        )?;
        if debited == 0 {
            return Err(if row_exists(&tx, from_id)? {
                BankError::InsufficientFunds
            } else {
                BankError::AccountNotFound(from_id)
            });
        }

        let credited = tx.execute(
            "UPDATE cards SET balance = balance + ?1 WHERE id = ?2 AND balance <= ?3 - ?1",
            params![amount, to_id, i64::MAX],
        )?;
        if credited == 0 {
            // tx dropped here, debit rolled back
            return Err(if row_exists(&tx, to_id)? {
                BankError::BalanceLimitExceeded
            } else {
                BankError::AccountNotFound(to_id)
            });
        }

        tx.commit()?;

        info!(from_id, to_id, amount, "transfer committed");
        Ok(())
    }

    /// Permanently remove a row
    pub fn delete_account(&mut self, id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM cards WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(BankError::AccountNotFound(id));
        }
        tx.commit()?;

        info!(id, "account closed");
        Ok(())
    }

    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Release the connection, surfacing any error SQLite reports on close
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_conn, err)| BankError::from(err))?;
        debug!("account store closed");
        Ok(())
    }
}

fn row_exists(conn: &Connection, id: i64) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cards WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}
