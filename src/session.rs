// 🔐 Session Controller - LoggedOut / LoggedIn state machine
//
// The controller owns the session value and borrows the store. It knows
// nothing about menus or terminals: commands come in, typed replies go out.

use rand::rngs::ThreadRng;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::card::{CardGenerator, IssuedCard};
use crate::db::AccountStore;
use crate::entities::{mask_card_number, Account};
use crate::error::{BankError, Result};
use crate::transfer::{TransferEngine, TransferReceipt};

// ============================================================================
// COMMANDS & REPLIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateAccount,
    Login { number: String, pin: String },
    Balance,
    AddIncome(i64),
    Transfer { target: String, amount: i64 },
    CloseAccount,
    Logout,
    Exit,
}

impl Command {
    /// Stable name for logs; never includes the PIN
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateAccount => "create-account",
            Command::Login { .. } => "login",
            Command::Balance => "balance",
            Command::AddIncome(_) => "add-income",
            Command::Transfer { .. } => "transfer",
            Command::CloseAccount => "close-account",
            Command::Logout => "logout",
            Command::Exit => "exit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    CardCreated(IssuedCard),
    LoggedIn,
    /// Unknown number or wrong PIN, deliberately indistinguishable
    LoginFailed,
    Balance(i64),
    IncomeAdded { balance: i64 },
    Transferred(TransferReceipt),
    AccountClosed,
    LoggedOut,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    LoggedOut,
    LoggedIn(Account),
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct SessionController<'a, R: Rng = ThreadRng> {
    store: &'a mut AccountStore,
    generator: CardGenerator<R>,
    session: Session,
}

impl<'a> SessionController<'a, ThreadRng> {
    pub fn new(store: &'a mut AccountStore) -> Self {
        Self::with_generator(store, CardGenerator::new())
    }
}

impl<'a, R: Rng> SessionController<'a, R> {
    pub fn with_generator(store: &'a mut AccountStore, generator: CardGenerator<R>) -> Self {
        SessionController {
            store,
            generator,
            session: Session::LoggedOut,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.session, Session::LoggedIn(_))
    }

    /// Dispatch one command against the current state
    pub fn handle(&mut self, command: Command) -> Result<Reply> {
        debug!(command = command.name(), logged_in = self.is_logged_in(), "dispatch");

        match command {
            Command::Exit => {
                self.session = Session::LoggedOut;
                Ok(Reply::Exit)
            }
            Command::CreateAccount => {
                self.require_logged_out()?;
                self.create_account()
            }
            Command::Login { number, pin } => {
                self.require_logged_out()?;
                self.login(&number, &pin)
            }
            Command::Balance => {
                let account = self.refresh()?;
                Ok(Reply::Balance(account.balance))
            }
            Command::AddIncome(amount) => {
                let account = self.refresh()?;
                if amount > 0 && account.balance.checked_add(amount).is_none() {
                    return Err(BankError::BalanceLimitExceeded);
                }
                let balance = self.store.deposit(account.id, amount)?;
                self.refresh()?;
                Ok(Reply::IncomeAdded { balance })
            }
            Command::Transfer { target, amount } => {
                let sender = self.refresh()?;
                let receipt = TransferEngine::new(self.store).transfer(&sender, &target, amount)?;
                self.refresh()?;
                Ok(Reply::Transferred(receipt))
            }
            Command::CloseAccount => {
                let account = self.current_account()?.clone();
                self.store.delete_account(account.id)?;
                self.session = Session::LoggedOut;
                info!(card = %account.masked_number(), "session ended by account closure");
                Ok(Reply::AccountClosed)
            }
            Command::Logout => {
                self.current_account()?;
                self.session = Session::LoggedOut;
                Ok(Reply::LoggedOut)
            }
        }
    }

    /// Read-only target validation so the caller can reject a bad card
    /// before asking for an amount
    pub fn check_transfer_target(&mut self, target: &str) -> Result<()> {
        let sender = self.refresh()?;
        TransferEngine::new(self.store).check_target(&sender, target)?;
        Ok(())
    }

    fn create_account(&mut self) -> Result<Reply> {
        let card = self.generator.generate(self.store)?;
        self.store.create_account(&card.number, &card.pin)?;
        Ok(Reply::CardCreated(card))
    }

    fn login(&mut self, number: &str, pin: &str) -> Result<Reply> {
        match self.store.find_by_credentials(number, pin)? {
            Some(account) => {
                info!(card = %account.masked_number(), "logged in");
                self.session = Session::LoggedIn(account);
                Ok(Reply::LoggedIn)
            }
            None => {
                warn!(card = %mask_card_number(number.trim()), "login failed");
                Ok(Reply::LoginFailed)
            }
        }
    }

    fn current_account(&self) -> Result<&Account> {
        match &self.session {
            Session::LoggedIn(account) => Ok(account),
            Session::LoggedOut => Err(BankError::invalid_input("Log into an account first")),
        }
    }

    fn require_logged_out(&self) -> Result<()> {
        if self.is_logged_in() {
            return Err(BankError::invalid_input("Log out first"));
        }
        Ok(())
    }

    /// Reload the bound account so the session never reports a stale balance
    fn refresh(&mut self) -> Result<Account> {
        let id = self.current_account()?.id;
        match self.store.find_by_id(id)? {
            Some(account) => {
                self.session = Session::LoggedIn(account.clone());
                Ok(account)
            }
            None => {
                self.session = Session::LoggedOut;
                Err(BankError::AccountNotFound(id))
            }
        }
    }
}
