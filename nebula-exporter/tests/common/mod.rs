//! In-process stand-ins for a CasparCG server.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UdpSocket};

/// Behaviour of a [`MockAmcpServer`].
#[derive(Debug, Clone)]
pub struct MockAmcp {
    pub version: String,
    /// Video mode per channel; `INFO n` fails past the end. INFO documents
    /// are indented XML with bare `\n` between lines, as CasparCG sends them.
    pub video_modes: Vec<Option<String>>,
    /// Close the first connection after answering this many commands
    pub drop_first_after: Option<usize>,
}

impl MockAmcp {
    pub fn with_channels(count: usize, mode: &str) -> Self {
        Self {
            version: "2.3.1-stable".to_string(),
            video_modes: vec![Some(mode.to_string()); count],
            drop_first_after: None,
        }
    }

    fn respond(&self, command: &str) -> String {
        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("VERSION"), _) => format!("201 VERSION OK\r\n{}\r\n", self.version),
            (Some("INFO"), Some(id)) => {
                let mode = id
                    .parse::<usize>()
                    .ok()
                    .and_then(|id| id.checked_sub(1))
                    .and_then(|index| self.video_modes.get(index));
                match mode {
                    Some(Some(mode)) => format!(
                        "201 INFO OK\r\n<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<channel>\n   <framerate>50</framerate>\n   <video-mode>{}</video-mode>\n   <stage>\n      <layer/>\n   </stage>\n</channel>\r\n",
                        mode
                    ),
                    Some(None) => "201 INFO OK\r\n<channel>\n   <stage/>\n</channel>\r\n".to_string(),
                    None => "401 INFO ERROR\r\n".to_string(),
                }
            }
            _ => "400 ERROR\r\nUnknown command\r\n".to_string(),
        }
    }
}

/// A running mock server.
pub struct MockAmcpServer {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    commands: Arc<AtomicUsize>,
}

impl MockAmcpServer {
    pub async fn start(behaviour: MockAmcp) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(AtomicUsize::new(0));

        let behaviour = Arc::new(behaviour);
        let conn_count = Arc::clone(&connections);
        let cmd_count = Arc::clone(&commands);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let index = conn_count.fetch_add(1, Ordering::SeqCst);
                let behaviour = Arc::clone(&behaviour);
                let cmd_count = Arc::clone(&cmd_count);

                tokio::spawn(async move {
                    let limit = if index == 0 {
                        behaviour.drop_first_after
                    } else {
                        None
                    };
                    let (read, mut write) = stream.into_split();
                    let mut lines = BufReader::new(read).lines();
                    let mut answered = 0;

                    while let Ok(Some(line)) = lines.next_line().await {
                        cmd_count.fetch_add(1, Ordering::SeqCst);
                        let response = behaviour.respond(line.trim());
                        if write.write_all(response.as_bytes()).await.is_err() {
                            break;
                        }
                        answered += 1;
                        if limit.is_some_and(|limit| answered >= limit) {
                            break;
                        }
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            commands,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }
}

/// A UDP port that was free a moment ago.
pub async fn free_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.local_addr().unwrap().port()
}

/// Poll `condition` every 10 ms until it holds or `timeout` passes.
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
