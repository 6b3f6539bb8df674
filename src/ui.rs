// 🖥️ Console - line-based menus over any BufRead / Write pair
//
// Maps menu choices to session commands and renders replies. Recoverable
// errors are printed and the loop continues; anything else ends the loop
// and is returned to the caller, which still owns (and closes) the store.

use rand::Rng;
use std::io::{BufRead, Write};
use tracing::{debug, error};

use crate::error::{BankError, Result};
use crate::session::{Command, Reply, SessionController};

// ============================================================================
// MENU TEXT
// ============================================================================

pub const MAIN_MENU: &str = "1. Create an account\n2. Log into account\n0. Exit";
pub const ACCOUNT_MENU: &str =
    "1. Balance\n2. Add income\n3. Do transfer\n4. Close account\n5. Log out\n0. Exit";

pub const CARD_NUMBER_PROMPT: &str = "Enter your card number:";
pub const PIN_PROMPT: &str = "Enter your PIN:";
pub const INCOME_PROMPT: &str = "Enter income:";
pub const TRANSFER_PROMPT: &str = "Transfer\nEnter card number:";
pub const AMOUNT_PROMPT: &str = "Enter how much money you want to transfer:";

pub const WRONG_OPTION: &str = "Wrong option!";
pub const WRONG_CREDENTIALS: &str = "Wrong card number or PIN!";
pub const GOODBYE: &str = "Bye!";

/// Text shown for a successful reply
pub fn render_reply(reply: &Reply) -> String {
    match reply {
        Reply::CardCreated(card) => format!(
            "\nYour card has been created\nYour card number:\n{}\nYour card PIN:\n{}\n",
            card.number, card.pin
        ),
        Reply::LoggedIn => "\nYou have successfully logged in!\n".to_string(),
        Reply::LoginFailed => format!("\n{}\n", WRONG_CREDENTIALS),
        Reply::Balance(balance) => format!("\nBalance: {}\n", balance),
        Reply::IncomeAdded { .. } => "Income was added!\n".to_string(),
        Reply::Transferred(_) => "Success!\n".to_string(),
        Reply::AccountClosed => "\nThe account has been closed!\n".to_string(),
        Reply::LoggedOut => "\nYou have successfully logged out!\n".to_string(),
        Reply::Exit => format!("\n{}", GOODBYE),
    }
}

/// Parse a user-typed amount (whole, positive)
pub fn parse_amount(raw: &str) -> Result<i64> {
    match raw.trim().parse::<i64>() {
        Ok(amount) if amount > 0 => Ok(amount),
        _ => Err(BankError::invalid_input("Please enter a positive whole number")),
    }
}

// ============================================================================
// CONSOLE
// ============================================================================

pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Console { input, output }
    }

    /// Hand back the writer (used by tests to inspect what was printed)
    pub fn into_output(self) -> W {
        self.output
    }

    /// Read-eval loop until Exit, end of input, or a fatal error
    pub fn run<G: Rng>(&mut self, controller: &mut SessionController<'_, G>) -> Result<()> {
        loop {
            let menu = if controller.is_logged_in() { ACCOUNT_MENU } else { MAIN_MENU };
            self.say(menu)?;

            let choice = match self.read_line()? {
                Some(line) => line,
                None => {
                    debug!("end of input");
                    controller.handle(Command::Exit)?;
                    self.say(&render_reply(&Reply::Exit))?;
                    return Ok(());
                }
            };

            let outcome = if controller.is_logged_in() {
                self.account_choice(controller, &choice)
            } else {
                self.main_choice(controller, &choice)
            };

            match outcome {
                Ok(Some(Reply::Exit)) => {
                    self.say(&render_reply(&Reply::Exit))?;
                    return Ok(());
                }
                Ok(Some(reply)) => self.say(&render_reply(&reply))?,
                Ok(None) => {}
                Err(err) if err.is_recoverable() => self.say(&err.to_string())?,
                Err(err) => {
                    error!(error = %err, "command failed");
                    self.say(&format!("Error: {}", err))?;
                    return Err(err);
                }
            }
        }
    }

    fn main_choice<G: Rng>(
        &mut self,
        controller: &mut SessionController<'_, G>,
        choice: &str,
    ) -> Result<Option<Reply>> {
        let command = match choice {
            "1" => Command::CreateAccount,
            "2" => {
                let Some(number) = self.ask(&format!("\n{}", CARD_NUMBER_PROMPT))? else {
                    return Ok(Some(Reply::Exit));
                };
                let Some(pin) = self.ask(PIN_PROMPT)? else {
                    return Ok(Some(Reply::Exit));
                };
                Command::Login { number, pin }
            }
            "0" => Command::Exit,
            _ => return Err(BankError::invalid_input(WRONG_OPTION)),
        };
        controller.handle(command).map(Some)
    }

    fn account_choice<G: Rng>(
        &mut self,
        controller: &mut SessionController<'_, G>,
        choice: &str,
    ) -> Result<Option<Reply>> {
        let command = match choice {
            "1" => Command::Balance,
            "2" => {
                let Some(raw) = self.ask(&format!("\n{}", INCOME_PROMPT))? else {
                    return Ok(Some(Reply::Exit));
                };
                Command::AddIncome(parse_amount(&raw)?)
            }
            "3" => {
                let Some(target) = self.ask(&format!("\n{}", TRANSFER_PROMPT))? else {
                    return Ok(Some(Reply::Exit));
                };
                // Reject a bad card before asking for money
                controller.check_transfer_target(&target)?;
                let Some(raw) = self.ask(AMOUNT_PROMPT)? else {
                    return Ok(Some(Reply::Exit));
                };
                Command::Transfer {
                    target,
                    amount: parse_amount(&raw)?,
                }
            }
            "4" => Command::CloseAccount,
            "5" => Command::Logout,
            "0" => Command::Exit,
            _ => return Err(BankError::invalid_input(WRONG_OPTION)),
        };
        controller.handle(command).map(Some)
    }

    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        self.say(prompt)?;
        self.read_line()
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{}", text)?;
        self.output.flush()?;
        Ok(())
    }

    /// Next trimmed line, `None` at end of input
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{luhn_is_valid, CardGenerator};
    use crate::db::AccountStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;
    use std::path::Path;

    /// Run one console session over `script`, returning everything printed
    fn run_script(store: &mut AccountStore, script: &str, seed: u64) -> String {
        let generator = CardGenerator::with_rng(StdRng::seed_from_u64(seed));
        let mut controller = SessionController::with_generator(store, generator);
        let mut console = Console::new(Cursor::new(script.to_string()), Vec::new());

        console.run(&mut controller).unwrap();

        String::from_utf8(console.into_output()).unwrap()
    }

    /// Same as `run_script` but against a fresh connection to `path`,
    /// closed afterwards like the binary does
    fn run_process(path: &Path, script: &str, seed: u64) -> String {
        let mut store = AccountStore::open(path).unwrap();
        let output = run_script(&mut store, script, seed);
        store.close().unwrap();
        output
    }

    /// (number, pin) printed on their own lines after card creation
    fn extract_card(output: &str) -> (String, String) {
        let lines: Vec<&str> = output.lines().collect();
        let number = lines
            .iter()
            .find(|l| l.len() == 16 && l.starts_with("400000") && l.chars().all(|c| c.is_ascii_digit()))
            .expect("card number line")
            .to_string();
        let pin = lines
            .iter()
            .find(|l| l.len() == 4 && l.chars().all(|c| c.is_ascii_digit()))
            .expect("pin line")
            .to_string();
        (number, pin)
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("10000").unwrap(), 10000);
        assert_eq!(parse_amount(" 15000\n").unwrap(), 15000);
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("ten").is_err());
    }

    #[test]
    fn test_create_account_output() {
        let mut store = AccountStore::open_in_memory().unwrap();

        let output = run_script(&mut store, "1\n0\n", 1);
        let (number, pin) = extract_card(&output);

        assert!(luhn_is_valid(&number));
        assert_eq!(pin.len(), 4);
        assert!(output.contains("Bye!"));
        assert_eq!(store.find_by_number(&number).unwrap().unwrap().balance, 0);
    }

    #[test]
    fn test_login_success_and_fresh_balance() {
        let mut store = AccountStore::open_in_memory().unwrap();
        let (number, pin) = extract_card(&run_script(&mut store, "1\n0\n", 2));

        let output = run_script(&mut store, &format!("2\n{}\n{}\n1\n0\n", number, pin), 2);

        assert!(output.to_lowercase().contains("successfully"));
        assert!(output.contains("Balance: 0"));
    }

    #[test]
    fn test_login_wrong_pin() {
        let mut store = AccountStore::open_in_memory().unwrap();
        let (number, pin) = extract_card(&run_script(&mut store, "1\n0\n", 3));
        let wrong = if pin == "1000" { "1001" } else { "1000" };

        let output = run_script(&mut store, &format!("2\n{}\n{}\n0\n", number, wrong), 3);

        assert!(!output.to_lowercase().contains("successfully"));
        assert!(output.contains(WRONG_CREDENTIALS));
    }

    #[test]
    fn test_logout_returns_to_main_menu() {
        let mut store = AccountStore::open_in_memory().unwrap();
        let (number, pin) = extract_card(&run_script(&mut store, "1\n0\n", 4));

        let output = run_script(&mut store, &format!("2\n{}\n{}\n5\n0\n", number, pin), 4);
        let after_logout = output.split("logged out!").nth(1).unwrap();

        assert!(after_logout.to_lowercase().contains("create"));
    }

    #[test]
    fn test_wrong_option_does_not_crash() {
        let mut store = AccountStore::open_in_memory().unwrap();

        let output = run_script(&mut store, "9\nabc\n\n0\n", 5);

        assert_eq!(output.matches(WRONG_OPTION).count(), 3);
        assert!(output.ends_with("Bye!\n"));
    }

    #[test]
    fn test_end_of_input_exits() {
        let mut store = AccountStore::open_in_memory().unwrap();

        let output = run_script(&mut store, "1\n", 6);

        assert!(output.ends_with("Bye!\n"));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_income_persists_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.s3db");

        let (number, pin) = extract_card(&run_process(&path, "1\n0\n", 7));
        run_process(&path, &format!("2\n{}\n{}\n2\n10000\n0\n", number, pin), 7);
        {
            let store = AccountStore::open(&path).unwrap();
            assert_eq!(store.find_by_number(&number).unwrap().unwrap().balance, 10000);
        }

        run_process(&path, &format!("2\n{}\n{}\n2\n15000\n0\n", number, pin), 7);

        let store = AccountStore::open(&path).unwrap();
        assert_eq!(store.find_by_number(&number).unwrap().unwrap().balance, 25000);
    }

    #[test]
    fn test_transfer_scenario() {
        let mut store = AccountStore::open_in_memory().unwrap();
        let (receiver, _) = extract_card(&run_script(&mut store, "1\n0\n", 8));
        let (sender, pin) = extract_card(&run_script(&mut store, "1\n0\n", 9));

        let script = format!(
            "2\n{sender}\n{pin}\n\
             3\n2000007269641764\n\
             3\n2000007269641768\n\
             3\n{receiver}\n100000\n\
             2\n20000\n\
             3\n{receiver}\n10000\n\
             0\n"
        );
        let output = run_script(&mut store, &script, 9).to_lowercase();

        assert!(output.contains("mistake"));
        assert!(output.contains("does not exist"));
        assert!(output.contains("not enough money"));
        assert!(output.contains("success!"));
        assert_eq!(store.find_by_number(&sender).unwrap().unwrap().balance, 10000);
        assert_eq!(store.find_by_number(&receiver).unwrap().unwrap().balance, 10000);
    }

    #[test]
    fn test_transfer_to_own_card_rejected() {
        let mut store = AccountStore::open_in_memory().unwrap();
        let (number, pin) = extract_card(&run_script(&mut store, "1\n0\n", 10));

        let script = format!("2\n{number}\n{pin}\n2\n500\n3\n{number}\n0\n");
        let output = run_script(&mut store, &script, 10);

        assert!(output.contains("same account"));
        assert_eq!(store.find_by_number(&number).unwrap().unwrap().balance, 500);
    }

    #[test]
    fn test_income_past_limit_keeps_console_running() {
        let mut store = AccountStore::open_in_memory().unwrap();
        let (number, pin) = extract_card(&run_script(&mut store, "1\n0\n", 12));
        let id = store.find_by_number(&number).unwrap().unwrap().id;
        store.update_balance(id, i64::MAX).unwrap();

        let script = format!("2\n{number}\n{pin}\n2\n1\n1\n0\n");
        let output = run_script(&mut store, &script, 12);

        assert!(output.contains("exceed the maximum balance"));
        assert!(output.contains(&format!("Balance: {}", i64::MAX)));
        assert!(output.contains("Bye!"));
        assert_eq!(store.find_by_number(&number).unwrap().unwrap().balance, i64::MAX);
    }

    #[test]
    fn test_close_account_removes_row() {
        let mut store = AccountStore::open_in_memory().unwrap();
        let (number, pin) = extract_card(&run_script(&mut store, "1\n0\n", 11));

        let output = run_script(&mut store, &format!("2\n{}\n{}\n4\n0\n", number, pin), 11);

        assert!(output.contains("The account has been closed!"));
        assert!(store.find_by_number(&number).unwrap().is_none());
    }

    #[test]
    fn test_two_accounts_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.s3db");

        let output = run_process(&path, "1\n1\n0\n", 12);
        let numbers: Vec<&str> = output
            .lines()
            .filter(|l| l.len() == 16 && l.starts_with("400000"))
            .collect();
        assert_eq!(numbers.len(), 2);

        let store = AccountStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 2);
        for number in numbers {
            assert_eq!(store.find_by_number(number).unwrap().unwrap().balance, 0);
        }
    }
}
