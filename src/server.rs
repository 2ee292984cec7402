/// The TCP server nodes register with, plus a plain-text status interface.
use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    sync::Mutex,
};

use crate::{
    config,
    message::{self, Message},
};

/// One connected node as the server sees it.
#[derive(Debug, Clone)]
pub struct NodeSession {
    pub name: String,
    pub node_id: String,
    pub hostname: String,
    pub os: String,
    pub arch: String,
    pub addr: SocketAddr,
}

type Registry = Arc<Mutex<HashMap<String, NodeSession>>>;

pub struct Server {
    port: u16,
}

impl Server {
    /// Construct the server for the resolved listen port. Fails when the
    /// data directory cannot be prepared; the listen socket itself is bound
    /// in [`Server::run`] so that `stop`/`status` work while a daemonized
    /// server holds the port.
    pub fn new(port: u16) -> Result<Server> {
        config::data_dir()?;
        Ok(Server { port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Accept node connections until the process is terminated. Blocks for
    /// the life of the process.
    pub async fn run(&self, web_port: u16) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .with_context(|| format!("failed to bind server port {}", self.port))?;

        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));

        let status_registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Err(e) = serve_status(web_port, status_registry).await {
                log::error!("status interface failed: {:#}", e);
            }
        });

        log::info!("server listening on 0.0.0.0:{}", self.port);

        loop {
            let (stream, addr) = listener
                .accept()
                .await
                .context("failed to accept node connection")?;

            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                if let Err(e) = handle_node(stream, addr, registry).await {
                    log::warn!("node connection from {} ended: {:#}", addr, e);
                }
            });
        }
    }
}

async fn handle_node(stream: TcpStream, addr: SocketAddr, registry: Registry) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let first = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow!("connection closed before registration"))?;

    let session = match Message::decode(&first)? {
        Message::Register {
            name,
            node_id,
            hostname,
            os,
            arch,
        } => NodeSession {
            name,
            node_id,
            hostname,
            os,
            arch,
            addr,
        },
        other => bail!("expected register, got {:?}", other),
    };

    {
        let mut nodes = registry.lock().await;
        if nodes.contains_key(&session.name) {
            let reason = format!("node name '{}' is already connected", session.name);
            message::send(&mut writer, &Message::Rejected { reason: reason.clone() }).await?;
            log::warn!("rejected registration from {}: {}", addr, reason);
            return Ok(());
        }
        nodes.insert(session.name.clone(), session.clone());
    }

    message::send(
        &mut writer,
        &Message::Registered {
            id: session.node_id.clone(),
        },
    )
    .await?;
    log::info!("node '{}' registered from {}", session.name, addr);

    let result = node_loop(&mut lines, &mut writer).await;

    registry.lock().await.remove(&session.name);
    log::info!("node '{}' disconnected", session.name);

    result
}

async fn node_loop(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    writer: &mut OwnedWriteHalf,
) -> Result<()> {
    while let Some(line) = lines.next_line().await? {
        match Message::decode(&line)? {
            Message::Ping => message::send(writer, &Message::Pong).await?,
            other => log::warn!("unexpected message from node: {:?}", other),
        }
    }

    Ok(())
}

/// Minimal status endpoint: every connection gets one plain-text report
/// over HTTP and the socket is closed.
async fn serve_status(web_port: u16, registry: Registry) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", web_port))
        .await
        .with_context(|| format!("failed to bind status port {}", web_port))?;

    log::info!("status interface listening on 0.0.0.0:{}", web_port);

    loop {
        let (mut stream, addr) = listener
            .accept()
            .await
            .context("failed to accept status connection")?;

        let body = render_status(&*registry.lock().await);
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );

        if let Err(e) = stream.write_all(response.as_bytes()).await {
            log::debug!("status reply to {} failed: {}", addr, e);
        }
    }
}

fn render_status(nodes: &HashMap<String, NodeSession>) -> String {
    let mut report = format!("envdb server\nconnected nodes: {}\n", nodes.len());

    let mut names: Vec<&String> = nodes.keys().collect();
    names.sort();

    for name in names {
        let node = &nodes[name];
        report.push_str(&format!(
            "  * {} ({} {}/{}) from {}\n",
            node.name, node.hostname, node.os, node.arch, node.addr
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(name: &str) -> Message {
        Message::Register {
            name: name.to_string(),
            node_id: "feedfacefeedface".to_string(),
            hostname: "test.internal".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
        }
    }

    async fn spawn_server(registry: Registry) -> SocketAddr {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (stream, peer) = listener.accept().await.unwrap();
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let _ = handle_node(stream, peer, registry).await;
                });
            }
        });

        addr
    }

    #[tokio::test]
    async fn node_registers_and_gets_heartbeat_replies() {
        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));
        let addr = spawn_server(Arc::clone(&registry)).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        message::send(&mut writer, &register("web-1")).await.unwrap();
        let reply = Message::decode(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(matches!(reply, Message::Registered { .. }));
        assert!(registry.lock().await.contains_key("web-1"));

        message::send(&mut writer, &Message::Ping).await.unwrap();
        let reply = Message::decode(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply, Message::Pong);
    }

    #[tokio::test]
    async fn duplicate_live_name_is_rejected() {
        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));
        let addr = spawn_server(Arc::clone(&registry)).await;

        let first = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = first.into_split();
        let mut lines = BufReader::new(reader).lines();

        message::send(&mut writer, &register("web-1")).await.unwrap();
        let reply = Message::decode(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(matches!(reply, Message::Registered { .. }));

        let second = TcpStream::connect(addr).await.unwrap();
        let (reader, mut second_writer) = second.into_split();
        let mut second_lines = BufReader::new(reader).lines();

        message::send(&mut second_writer, &register("web-1")).await.unwrap();
        let reply = Message::decode(&second_lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(matches!(reply, Message::Rejected { .. }));

        // the original session is untouched
        assert!(registry.lock().await.contains_key("web-1"));
    }

    fn session(name: &str) -> NodeSession {
        NodeSession {
            name: name.to_string(),
            node_id: "0011223344556677".to_string(),
            hostname: format!("{}.internal", name),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            addr: "10.0.0.5:50000".parse().unwrap(),
        }
    }

    #[test]
    fn status_report_for_empty_registry() {
        let report = render_status(&HashMap::new());
        assert!(report.contains("connected nodes: 0"));
    }

    #[test]
    fn status_report_lists_nodes_sorted_by_name() {
        let mut nodes = HashMap::new();
        nodes.insert("web-2".to_string(), session("web-2"));
        nodes.insert("web-1".to_string(), session("web-1"));

        let report = render_status(&nodes);
        assert!(report.contains("connected nodes: 2"));

        let first = report.find("web-1").unwrap();
        let second = report.find("web-2").unwrap();
        assert!(first < second);
    }
}
