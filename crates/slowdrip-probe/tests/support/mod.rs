//! In-process TCP servers standing in for the probe target.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use slowdrip_common::Target;
use slowdrip_probe::engine::payload::HEADER_TERMINATOR;

/// How the test server treats each accepted connection.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Read the header, echo it back, then wait for the client to hang up.
    Echo,
    /// Read the header, reply with `n` filler bytes, then wait for EOF.
    Flood(usize),
    /// Read the header and never answer.
    Silent,
    /// Drop the connection after receiving `n` bytes.
    CloseAfter(usize),
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub accepted: Arc<AtomicUsize>,
    streams: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl TestServer {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let (tx, streams) = mpsc::unbounded_channel();

        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let received = serve(socket, behavior).await;
                    let _ = tx.send(received);
                });
            }
        });

        Self {
            addr,
            accepted,
            streams,
        }
    }

    pub fn target(&self) -> Target {
        Target::with_port("127.0.0.1", self.addr.port())
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Waits for the next connection to finish and returns what it sent.
    pub async fn next_stream(&mut self) -> Vec<u8> {
        self.streams.recv().await.expect("server task alive")
    }
}

async fn serve(mut socket: TcpStream, behavior: Behavior) -> Vec<u8> {
    let limit = match behavior {
        Behavior::CloseAfter(n) => n,
        _ => usize::MAX,
    };
    let mut received = Vec::new();
    let mut buf = [0u8; 64];

    while received.len() < limit && !received.ends_with(HEADER_TERMINATOR) {
        let want = buf.len().min(limit - received.len());
        match socket.read(&mut buf[..want]).await {
            Ok(0) | Err(_) => return received,
            Ok(n) => received.extend_from_slice(&buf[..n]),
        }
    }

    match behavior {
        Behavior::CloseAfter(_) => return received,
        Behavior::Echo => {
            let _ = socket.write_all(&received).await;
        }
        Behavior::Flood(n) => {
            let _ = socket.write_all(&vec![b'x'; n]).await;
        }
        Behavior::Silent => {}
    }

    let mut sink = [0u8; 64];
    while let Ok(n) = socket.read(&mut sink).await {
        if n == 0 {
            break;
        }
    }
    received
}

/// An address with nothing listening on it.
pub async fn closed_target() -> Target {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Target::with_port("127.0.0.1", port)
}
