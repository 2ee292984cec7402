/// Users role: list, add interactively, or remove by email.
use anyhow::{bail, Result};
use clap::Args;

use crate::{
    cli::common,
    store::{self, UserStore},
};

#[derive(Args)]
pub struct UsersCommand {
    /// Add a new user
    #[arg(short = 'a', long = "add")]
    pub add: bool,

    /// Remove a user by email
    #[arg(short = 'r', long = "remove", value_name = "EMAIL")]
    pub remove: Option<String>,
}

/// The one thing this invocation will do. Add wins over remove when both
/// flags are given; neither means list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    Add,
    Remove(String),
    List,
}

impl UserIntent {
    pub fn from_flags(add: bool, remove: Option<&str>) -> Self {
        if add {
            UserIntent::Add
        } else if let Some(email) = remove.filter(|email| !email.is_empty()) {
            UserIntent::Remove(email.to_string())
        } else {
            UserIntent::List
        }
    }
}

impl UsersCommand {
    pub fn execute(&self) -> Result<()> {
        let store = UserStore::open_default()?;

        match UserIntent::from_flags(self.add, self.remove.as_deref()) {
            UserIntent::Add => add_user(&store),
            UserIntent::Remove(email) => remove_user(&store, &email),
            UserIntent::List => {
                let users = store.find_all()?;
                common::list_users(&users);
                Ok(())
            }
        }
    }
}

fn add_user(store: &UserStore) -> Result<()> {
    let name = common::ask("Name: ")?;

    let email = common::ask("Email: ")?;
    if !store::is_valid_email(&email) {
        bail!("{} is not a valid email address", email);
    }

    let password = common::ask_password("Password: ")?;
    let confirm = common::ask_password("Confirm: ")?;

    if password != confirm {
        bail!("password and confirmation do not match");
    }

    store.create(&name, &email, &password)?;
    log::info!("User created successfully.");

    Ok(())
}

fn remove_user(store: &UserStore, email: &str) -> Result<()> {
    let user = store.find_by_email(email)?;
    store.delete(&user)?;

    log::info!("User removed successfully.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_means_list() {
        assert_eq!(UserIntent::from_flags(false, None), UserIntent::List);
    }

    #[test]
    fn remove_carries_the_email() {
        assert_eq!(
            UserIntent::from_flags(false, Some("ada@example.com")),
            UserIntent::Remove("ada@example.com".to_string())
        );
    }

    #[test]
    fn empty_remove_value_falls_back_to_list() {
        assert_eq!(UserIntent::from_flags(false, Some("")), UserIntent::List);
    }

    #[test]
    fn add_wins_when_both_flags_are_set() {
        assert_eq!(
            UserIntent::from_flags(true, Some("ada@example.com")),
            UserIntent::Add
        );
    }
}
