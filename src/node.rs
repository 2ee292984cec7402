/// The node client: registers with a server and keeps the session alive.
use std::{process::Command, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
};

use crate::{
    config::NodeConfig,
    message::{self, Message},
    retry_operation,
};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Connection descriptor for one registration attempt.
pub struct Node {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub retry_count: u32,
    pub config: NodeConfig,
}

/// An established, registered connection to the server.
#[derive(Debug)]
pub struct Session {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Node {
    /// Connect and register, retrying up to `retry_count` times, then serve
    /// heartbeats until the server goes away. Blocks for the life of the
    /// connection.
    pub async fn run(&self) -> Result<()> {
        let log_prefix = format!("node '{}' connection to {}:{}", self.name, self.host, self.port);

        let mut session = retry_operation!(self.retry_count, self.connect().await, log_prefix)?;
        log::info!(
            "node '{}' registered with {}:{}",
            self.name,
            self.host,
            self.port
        );

        session.serve().await
    }

    async fn connect(&self) -> Result<Session> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("failed to connect to {}:{}", self.host, self.port))?;

        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let register = Message::Register {
            name: self.name.clone(),
            node_id: self.config.node_id.clone(),
            hostname: hostname(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        };
        message::send(&mut writer, &register).await?;

        let reply = lines
            .next_line()
            .await?
            .ok_or_else(|| anyhow!("server closed the connection during registration"))?;

        match Message::decode(&reply)? {
            Message::Registered { id } => {
                log::debug!("server acknowledged registration with id {}", id);
                Ok(Session { lines, writer })
            }
            Message::Rejected { reason } => bail!("registration rejected: {}", reason),
            other => bail!("unexpected reply to register: {:?}", other),
        }
    }
}

impl Session {
    /// Heartbeat loop. Returns normally when the server closes the
    /// connection.
    pub async fn serve(&mut self) -> Result<()> {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    message::send(&mut self.writer, &Message::Ping).await?;
                }
                line = self.lines.next_line() => {
                    let Some(line) = line? else {
                        log::info!("server closed the connection");
                        return Ok(());
                    };

                    match Message::decode(&line)? {
                        Message::Pong => log::debug!("heartbeat acknowledged"),
                        other => log::warn!("unexpected message from server: {:?}", other),
                    }
                }
            }
        }
    }
}

fn hostname() -> String {
    Command::new("hostname")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn node_for(port: u16) -> Node {
        Node {
            name: "web-1".to_string(),
            host: "127.0.0.1".to_string(),
            port,
            retry_count: 1,
            config: NodeConfig {
                node_id: "feedfacefeedface".to_string(),
            },
        }
    }

    async fn scripted_server(reply_with: fn(String) -> Message) -> u16 {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();

            let line = lines.next_line().await.unwrap().unwrap();
            let Message::Register { node_id, .. } = Message::decode(&line).unwrap() else {
                panic!("expected register, got {}", line);
            };

            message::send(&mut writer, &reply_with(node_id)).await.unwrap();
        });

        port
    }

    #[tokio::test]
    async fn connect_sends_register_and_accepts_the_ack() {
        let port = scripted_server(|node_id| Message::Registered { id: node_id }).await;

        assert!(node_for(port).connect().await.is_ok());
    }

    #[tokio::test]
    async fn connect_surfaces_a_rejection() {
        let port = scripted_server(|_| Message::Rejected {
            reason: "name taken".to_string(),
        })
        .await;

        let err = node_for(port).connect().await.unwrap_err();
        assert!(err.to_string().contains("name taken"));
    }

    #[test]
    fn hostname_never_comes_back_empty() {
        assert!(!hostname().is_empty());
    }
}
