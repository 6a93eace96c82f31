#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use rcontail::rcon::XorKeystream;

/// Get an OS-assigned free port
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// A unique scratch directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rcontail-{}-{}", tag, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub type Responder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// An in-process game server speaking the obfuscated RCON wire protocol.
///
/// Per connection: sends `key` in the clear, expects `Login <password>`,
/// answers `SUCCESS` or `FAILED`, then answers every further command through
/// `respond`. Each direction runs its own keystream, positions carried
/// across messages.
pub struct MockRconServer {
    pub port: u16,
    /// Connections accepted so far (== handshake attempts observed).
    pub connections: Arc<AtomicUsize>,
    pub _task: tokio::task::JoinHandle<()>,
}

impl MockRconServer {
    pub async fn start(key: Vec<u8>, password: &str, respond: Responder) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let connections = Arc::new(AtomicUsize::new(0));
        let password = password.to_string();

        let conn_counter = connections.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                conn_counter.fetch_add(1, Ordering::SeqCst);
                let key = key.clone();
                let password = password.clone();
                let respond = respond.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, key, password, respond).await;
                });
            }
        });

        Self {
            port,
            connections,
            _task: task,
        }
    }

    pub fn attempts(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    key: Vec<u8>,
    password: String,
    respond: Responder,
) -> std::io::Result<()> {
    stream.write_all(&key).await?;

    let mut rx = XorKeystream::new(&key).unwrap();
    let mut tx = XorKeystream::new(&key).unwrap();
    let mut authenticated = false;
    let mut buf = vec![0u8; 8192];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        let command = String::from_utf8_lossy(&rx.apply(&buf[..n])).into_owned();

        let reply = if !authenticated {
            match command.strip_prefix("Login ") {
                Some(given) if given == password => {
                    authenticated = true;
                    "SUCCESS".to_string()
                }
                _ => "FAILED".to_string(),
            }
        } else {
            respond(&command)
        };
        stream.write_all(&tx.apply(reply.as_bytes())).await?;
    }
}

/// A listener that accepts and immediately closes every connection, so each
/// handshake attempt fails (empty key frame). Returns the attempt counter.
pub struct SlammingListener {
    pub port: u16,
    pub connections: Arc<AtomicUsize>,
    pub _task: tokio::task::JoinHandle<()>,
}

impl SlammingListener {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let connections = Arc::new(AtomicUsize::new(0));

        let conn_counter = connections.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                conn_counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        Self {
            port,
            connections,
            _task: task,
        }
    }

    pub fn attempts(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}
