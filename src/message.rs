/// Line-delimited JSON messages exchanged between nodes and the server.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// First message a node sends after connecting.
    Register {
        name: String,
        node_id: String,
        hostname: String,
        os: String,
        arch: String,
    },
    /// Server accepted the registration.
    Registered { id: String },
    /// Server refused the registration.
    Rejected { reason: String },
    /// Node heartbeat.
    Ping,
    /// Server heartbeat reply.
    Pong,
}

impl Message {
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to encode message")
    }

    pub fn decode(line: &str) -> Result<Message> {
        serde_json::from_str(line).with_context(|| format!("failed to decode message: {}", line))
    }
}

/// Write one message as a single newline-terminated JSON line.
pub async fn send<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = message.encode()?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .context("failed to send message")?;
    Ok(())
}
