/// Node role: privilege check, connection descriptor, retrying run.
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::{config, node::Node};

const NODE_RETRY_COUNT: u32 = 50;

#[derive(Args)]
pub struct NodeCommand {
    /// A name used to uniquely identify this node
    pub name: String,

    /// Address of the server to connect to
    #[arg(short = 's', long = "server")]
    pub server: String,

    /// Port to use for the connection
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,
}

impl NodeCommand {
    pub fn execute(&self) -> Result<()> {
        // Privilege check comes first; no descriptor is built until it passes.
        ensure_root()?;

        let node = Node {
            name: self.name.clone(),
            host: self.server.clone(),
            port: config::resolve_port(self.port, config::DEFAULT_SERVER_PORT),
            retry_count: NODE_RETRY_COUNT,
            config: config::NodeConfig::load()?,
        };

        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?;

        if let Err(e) = rt.block_on(node.run()) {
            log::error!("node run ended: {:#}", e);
        }

        Ok(())
    }
}

fn ensure_root() -> Result<()> {
    let output = Command::new("whoami")
        .output()
        .context("failed to query current user")?;

    if !output.status.success() {
        bail!("failed to query current user (whoami exited with {})", output.status);
    }

    let user = String::from_utf8_lossy(&output.stdout);
    if user.trim_end_matches('\n') != "root" {
        bail!("the node client must run as root");
    }

    Ok(())
}
