use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bus::{classify_and_enqueue, NodeBus};
use crate::model::message::Message;

const ACCEPT_POLL: Duration = Duration::from_millis(1000);
const OUTBOX_POLL: Duration = Duration::from_millis(100);
const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Owns the listening socket and the outbound connector. Runs as its own thread; see
/// `node::Node::run`. Nonblocking accept-and-poll on the listen side; 3-retry/
/// 500ms-backoff/5s-timeout on the send side for connection refusal.
pub struct TransportWorker {
    listener: TcpListener,
}

impl TransportWorker {
    pub fn bind(host: &str, port: u16) -> anyhow::Result<Self> {
        let listener = TcpListener::bind((host, port))?;
        listener.set_nonblocking(true)?;
        info!(host, port, "transport worker listening");
        Ok(Self { listener })
    }

    /// Accept loop: reads one JSON frame per connection, classifies and enqueues it.
    /// Shutdown is cooperative -- `running` is polled once per `ACCEPT_POLL` tick.
    pub fn run_listener(&self, bus: Arc<NodeBus>, running: Arc<AtomicBool>) {
        while running.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(err) = handle_connection(stream, &bus) {
                        warn!(%err, %peer, "dropped malformed inbound frame");
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL);
                }
                Err(err) => {
                    warn!(%err, "accept failed");
                    std::thread::sleep(ACCEPT_POLL);
                }
            }
        }
        debug!("transport listener stopped");
    }

    /// Drains the outbox: one connect-serialize-write-close per frame, with retry on
    /// connection refusal.
    pub fn run_sender(bus: Arc<NodeBus>, running: Arc<AtomicBool>) {
        while running.load(Ordering::Relaxed) {
            match bus.outbox_rx.recv_timeout(OUTBOX_POLL) {
                Ok(frame) => {
                    if let Err(err) = send(&frame.host, frame.port, &frame.message) {
                        warn!(%err, host = %frame.host, port = frame.port, "outbound send failed after retries");
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("transport sender stopped");
    }
}

fn handle_connection(mut stream: TcpStream, bus: &NodeBus) -> anyhow::Result<()> {
    stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
    let peer = stream
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let mut raw = String::new();
    stream.read_to_string(&mut raw)?;
    let message = Message::decode(&raw)?;
    classify_and_enqueue(bus, message, peer);
    Ok(())
}

/// Opens a fresh outbound connection, serializes `message`, writes it in one shot, and
/// closes. Retries up to `SEND_RETRIES` times with `RETRY_BACKOFF` on connection
/// refusal only; other errors are not retried.
pub fn send(host: &str, port: u16, message: &Message) -> anyhow::Result<()> {
    let encoded = message.encode()?;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_send(host, port, &encoded) {
            Ok(()) => return Ok(()),
            Err(err)
                if err.kind() == std::io::ErrorKind::ConnectionRefused
                    && attempt < SEND_RETRIES =>
            {
                warn!(host, port, attempt, "connection refused, retrying");
                std::thread::sleep(RETRY_BACKOFF);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn try_send(host: &str, port: u16, encoded: &str) -> std::io::Result<()> {
    let mut stream = TcpStream::connect((host, port))?;
    stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;
    stream.write_all(encoded.as_bytes())?;
    stream.shutdown(std::net::Shutdown::Write)
}
