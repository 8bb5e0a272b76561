use std::collections::HashMap;
use std::os::fd::{AsRawFd, RawFd};
use std::process;

use tcp_shim::{Address, Connection, Interest, Listener, Poller, Result};
use tcp_shim::{debug, error, info, warn};

/// Port the echo server listens on.
const DEMO_PORT: u16 = 8080;

/// How long each poll waits before looping again.
const POLL_TIMEOUT_MS: i32 = 1000;

/// Size of the receive buffer.
const BUF_SIZE: usize = 4096;

/// An accepted connection and the bytes still to be echoed back to it.
#[derive(Debug)]
struct Client {
    conn: Connection,
    pending: Vec<u8>,
}

impl Client {
    fn new(conn: Connection) -> Self {
        Self {
            conn,
            pending: Vec::new(),
        }
    }
}

fn main() {
    let listener = Listener::bind(Address::UNSPECIFIED_V4, DEMO_PORT).unwrap_or_else(|err| {
        error!("failed to create listener: {err}");
        process::exit(1);
    });

    let mut clients: HashMap<RawFd, Client> = Default::default();

    echo_loop(&listener, &mut clients);
}

/// Runs a single-threaded echo server on `listener`.
///
/// The listener and every accepted connection are polled for readiness; the
/// listener is only accepted on when a connection is pending, so the blocking
/// `accept()` returns immediately. A client whose echo could not be sent in
/// full is polled for write readiness until it drains.
///
/// # Panics
///
/// Exits the process if polling fails.
fn echo_loop(listener: &Listener, clients: &mut HashMap<RawFd, Client>) -> ! {
    let mut poller = Poller::new();
    poller.add(listener);

    let mut buf = [0u8; BUF_SIZE];

    loop {
        let ready = poller.wait(POLL_TIMEOUT_MS).unwrap_or_else(|err| {
            error!("{err}");
            process::exit(1);
        });

        for fd in ready {
            if fd == listener.as_raw_fd() {
                match listener.accept() {
                    Ok((conn, peer)) => {
                        info!("[{peer}] connection opened");
                        poller.add(&conn);
                        clients.insert(conn.as_raw_fd(), Client::new(conn));
                    }
                    Err(err) => error!("{err}"),
                }
                continue;
            }

            let Some(client) = clients.get_mut(&fd) else {
                warn!("readiness reported for unknown descriptor {fd}");
                poller.remove(fd);
                continue;
            };

            let next = service(client, &mut buf).unwrap_or_else(|err| {
                error!("[{}] {err}", client.conn.peer_endpoint());
                None
            });

            match next {
                Some(interest) => {
                    poller.set_interest(fd, interest);
                }
                None => {
                    poller.remove(fd);
                    if let Some(client) = clients.remove(&fd) {
                        info!("[{}] connection closed", client.conn.peer_endpoint());
                    }
                }
            }
        }
    }
}

/// Makes progress on echoing for `client` without waiting on the socket.
///
/// New data is only read once everything previously received has been sent
/// back, so a peer that does not read its replies stops being read from.
///
/// Returns the readiness to wait for next, or `None` once the peer has shut
/// down its side of the connection.
fn service(client: &mut Client, buf: &mut [u8]) -> Result<Option<Interest>> {
    let conn = &client.conn;

    if client.pending.is_empty() {
        let nbytes = match conn.recv(buf) {
            Ok(0) => return Ok(None),
            Ok(n) => n,
            Err(err) if err.would_block() => return Ok(Some(Interest::Read)),
            Err(err) => return Err(err),
        };

        debug!("[{}] read {nbytes} bytes", conn.peer_endpoint());
        client.pending.extend_from_slice(&buf[..nbytes]);
    }

    let mut sent = 0;
    while sent < client.pending.len() {
        match conn.send(&client.pending[sent..]) {
            Ok(0) => break,
            Ok(n) => sent += n,
            // The peer is not draining its receive buffer yet.
            Err(err) if err.would_block() => break,
            Err(err) => return Err(err),
        }
    }
    client.pending.drain(..sent);

    if client.pending.is_empty() {
        Ok(Some(Interest::Read))
    } else {
        debug!(
            "[{}] {} bytes waiting for the peer to read",
            conn.peer_endpoint(),
            client.pending.len()
        );
        Ok(Some(Interest::Write))
    }
}
