use std::{collections::HashMap, io, thread};
use std::{io::prelude::*, thread::JoinHandle};
use std::{
    net::{SocketAddr, TcpListener, TcpStream},
    time::Duration,
};

use log::{error, info};
use serde::{Deserialize, Serialize};

use super::{backoff::ExponentialBackoff, util, Communicator, Message};

const RETRY_WAIT_MS: Duration = Duration::from_millis(250);
const RETRY_MAX_WAIT_MS: Duration = Duration::from_millis(5000);

type SendSink = crossbeam_channel::Sender<(usize, Vec<u8>)>;
type RecvSrc = crossbeam_channel::Receiver<Vec<u8>>;

/// The envelope that crosses the wire, MessagePack-encoded and framed with a
/// little-endian u64 byte length.
#[derive(Serialize, Deserialize)]
struct WireMessage {
    source: usize,
    tag: u16,
    values: Vec<f64>,
}

/// Owns the two I/O threads of one rank: a listener accepting peer
/// connections and handing each its own reader thread, and a serial sender
/// draining the outgoing channel over cached connections, reconnecting with
/// exponential backoff when a peer is not up yet or a connection breaks.
pub struct TcpHost {
    listen_thread: Option<thread::JoinHandle<()>>,
    send_thread: Option<thread::JoinHandle<()>>,
}

impl TcpHost {
    pub fn new(rank: usize, peers: Vec<SocketAddr>) -> (Self, SendSink, RecvSrc) {
        let (send_sink, send_src) = crossbeam_channel::unbounded();
        let send_thread = Self::start_serial_sender(peers.clone(), send_src);

        let (recv_sink, recv_src) = crossbeam_channel::unbounded();
        let listen_thread = Self::start_listener(peers[rank], recv_sink);

        (
            TcpHost {
                send_thread: Some(send_thread),
                listen_thread: Some(listen_thread),
            },
            send_sink,
            recv_src,
        )
    }

    /// Wait for the sender thread to drain and exit; it does so once every
    /// send sink clone has been dropped. The listener thread is detached.
    pub fn join(&mut self) {
        if let Some(handle) = self.send_thread.take() {
            handle.join().unwrap()
        }
        self.listen_thread.take();
    }

    fn start_serial_sender(
        peers: Vec<SocketAddr>,
        send_src: crossbeam_channel::Receiver<(usize, Vec<u8>)>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let mut table: HashMap<usize, TcpStream> = HashMap::new();

            for (rank, message) in send_src {
                if !table.contains_key(&rank) {
                    table.insert(
                        rank,
                        Self::connect_with_retry(peers[rank], RETRY_WAIT_MS, RETRY_MAX_WAIT_MS)
                            .unwrap(),
                    );
                }
                let client = table.get_mut(&rank).unwrap();

                loop {
                    let msg_sz = message.len() as u64;
                    match client
                        .write_all(&msg_sz.to_le_bytes())
                        .and_then(|()| client.write_all(&message))
                        .and_then(|()| {
                            util::read_u64(client).and_then(|ack| {
                                if ack != msg_sz {
                                    Err(io::Error::new(
                                        io::ErrorKind::InvalidData,
                                        format!(
                                            "sent {} bytes but receiver acked {}",
                                            msg_sz, ack
                                        ),
                                    ))
                                } else {
                                    Ok(())
                                }
                            })
                        }) {
                        Ok(()) => break,
                        Err(msg) => {
                            error!("failed to send message to {}: {}", peers[rank], msg);
                            *client = Self::connect_with_retry(
                                peers[rank],
                                RETRY_WAIT_MS,
                                RETRY_MAX_WAIT_MS,
                            )
                            .unwrap();
                        }
                    }
                }
            }
        })
    }

    fn start_listener(
        addr: SocketAddr,
        recv_sink: crossbeam_channel::Sender<Vec<u8>>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            info!("listening on {}", addr);
            let listener = TcpListener::bind(addr).unwrap();
            loop {
                let (stream, remote) = listener.accept().unwrap();
                Self::handle_connection(stream, remote, recv_sink.clone());
            }
        })
    }

    fn handle_connection(
        mut stream: TcpStream,
        remote: SocketAddr,
        recv_sink: crossbeam_channel::Sender<Vec<u8>>,
    ) -> JoinHandle<Result<(), std::io::Error>> {
        info!("receiving connection from {}", remote);
        thread::spawn(move || loop {
            util::read_u64(&mut stream)
                .and_then(|size| util::read_bytes_vec(&mut stream, size as usize))
                .and_then(|bytes| {
                    let num_bytes = bytes.len() as u64;
                    recv_sink
                        .send(bytes)
                        .map(|()| num_bytes)
                        .map_err(|msg| io::Error::new(io::ErrorKind::Other, msg))
                })
                .and_then(|size| stream.write_all(&size.to_le_bytes()))
                .map_err(|e| {
                    std::io::Error::new(
                        e.kind(),
                        format!("connection from {} failed: {}", remote, e),
                    )
                })?
        })
    }

    fn connect_with_retry(
        addr: SocketAddr,
        initial_wait: Duration,
        max_wait: Duration,
    ) -> Option<TcpStream> {
        let mut with_retries = ExponentialBackoff::new(initial_wait, max_wait, 2);

        with_retries.find_map(|sleep| match TcpStream::connect(&addr) {
            Ok(s) => Some(s),
            Err(msg) => {
                info!("connect to {} failed, retrying: {}", addr, msg);
                thread::sleep(sleep);
                None
            }
        })
    }
}

/// A rank group over TCP: each peer address in `peers` is one rank's
/// listening endpoint, and this rank is `peers[rank]`.
pub struct TcpCommunicator {
    rank: usize,
    num_peers: usize,
    host: TcpHost,
    send_sink: Option<SendSink>,
    recv_src: RecvSrc,
}

impl TcpCommunicator {
    pub fn new(rank: usize, peers: Vec<SocketAddr>) -> Self {
        let num_peers = peers.len();
        let (host, send_sink, recv_src) = TcpHost::new(rank, peers);
        Self {
            rank,
            num_peers,
            host,
            send_sink: Some(send_sink),
            recv_src,
        }
    }
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.num_peers
    }

    fn send(&self, rank: usize, tag: u16, values: Vec<f64>) {
        let envelope = WireMessage {
            source: self.rank,
            tag,
            values,
        };
        let bytes = rmp_serde::to_vec(&envelope).expect("message encoding cannot fail");
        self.send_sink
            .as_ref()
            .unwrap()
            .send((rank, bytes))
            .unwrap()
    }

    fn recv_any(&self) -> Message {
        let bytes = self.recv_src.recv().unwrap();
        let envelope: WireMessage =
            rmp_serde::from_read_ref(&bytes).expect("malformed message from peer");
        Message {
            source: envelope.source,
            tag: envelope.tag,
            values: envelope.values,
        }
    }
}

impl Drop for TcpCommunicator {
    fn drop(&mut self) {
        self.send_sink.take().unwrap();
        self.host.join();
    }
}
