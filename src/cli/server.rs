/// Server role: run in the foreground or drive the daemon.
use anyhow::{bail, Context, Result};
use clap::Args;

use crate::{config, daemon, server::Server};

#[derive(Args)]
pub struct ServerCommand {
    /// Daemon command (start, stop, status)
    pub command: Option<String>,

    /// Port for the server to listen on
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Port for the status interface to listen on
    #[arg(short = 'P', long = "http-port")]
    pub http_port: Option<u16>,
}

/// What the optional daemon command resolves to. Matching is exact and
/// case-sensitive; anything unrecognized is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAction {
    Foreground,
    Start,
    Stop,
    Status,
}

impl ServerAction {
    pub fn parse(command: Option<&str>) -> Result<Self> {
        match command {
            None | Some("") => Ok(ServerAction::Foreground),
            Some("start") => Ok(ServerAction::Start),
            Some("stop") => Ok(ServerAction::Stop),
            Some("status") => Ok(ServerAction::Status),
            Some(other) => bail!("unknown command '{}'", other),
        }
    }
}

impl ServerCommand {
    pub fn execute(&self) -> Result<()> {
        let port = config::resolve_port(self.port, config::DEFAULT_SERVER_PORT);
        let web_port = config::resolve_port(self.http_port, config::DEFAULT_WEB_SERVER_PORT);

        // The server is constructed before the daemon command is looked at;
        // a failed construction aborts every sub-command the same way.
        let server = Server::new(port)?;

        match ServerAction::parse(self.command.as_deref())? {
            ServerAction::Foreground => {
                let rt = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .context("failed to build tokio runtime")?;

                if let Err(e) = rt.block_on(server.run(web_port)) {
                    log::error!("server run ended: {:#}", e);
                }

                Ok(())
            }
            ServerAction::Start => daemon::start(server, web_port),
            ServerAction::Stop => daemon::stop(),
            ServerAction::Status => daemon::status(),
        }
    }
}
