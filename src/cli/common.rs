/// Common functions for CLI.
use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};

use crate::store::User;

/// Prompt on stdout, read one line from stdin. A blank answer is an error.
pub fn ask(question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush().context("failed to flush stdout")?;

    let mut value = String::new();
    io::stdin()
        .lock()
        .read_line(&mut value)
        .context("failed to read from stdin")?;

    let value = value.trim().to_string();
    if value.is_empty() {
        bail!("value cannot be blank");
    }

    Ok(value)
}

/// Prompt for a password with the input masked.
pub fn ask_password(question: &str) -> Result<String> {
    rpassword::prompt_password(question).context("password stdin error")
}

/// List all users.
pub fn list_users(users: &[User]) {
    println!("Listing Users: ");

    for user in users {
        println!("  * {} ({})", user.name, user.email);
    }
}
