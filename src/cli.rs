/// CLI interface and commands.

/// Common functions for CLI.
pub mod common;

/// Node role: register this host with a server.
pub mod node;

/// Server role: run the server or drive the daemon.
pub mod server;

/// Users role: manage accounts in the user database.
pub mod users;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "envdb")]
#[command(about = "The Environment Database - Ask your environment questions", version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'v', long = "debug", global = true)]
    pub debug: bool,

    /// Enable dev mode
    #[arg(long, global = true)]
    pub dev: bool,

    /// Remove all output logging
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the tcp server for node connections
    Server(server::ServerCommand),
    /// Register a new node
    Node(node::NodeCommand),
    /// User management (default lists all users)
    Users(users::UsersCommand),
}
