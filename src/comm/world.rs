//! Socket-backed world
//!
//! The root listens on a TCP address; every walker connects, says HELLO, and
//! from then on talks only to the root. Inside the root one task per walker
//! connection decodes frames into a shared mailbox, which is what makes
//! [`recv_any`](Communicator::recv_any) source-agnostic.
//!
//! The root keeps a sender to its own mailbox, so an empty mailbox never
//! reports end-of-stream: a receive for a report that never arrives waits
//! forever, even if every walker connection has closed.

use super::error::{CommError, CommResult};
use super::protocol::*;
use super::{Communicator, Rank, Status, Tag, ROOT_RANK};
use crate::config::ProcessIdentity;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, warn};

const MAX_CONNECT_BACKOFF: Duration = Duration::from_millis(200);

/// One process's view of the run
pub struct World {
    identity: ProcessIdentity,
    link: Link,
}

enum Link {
    Root(RootLink),
    Walker(WalkerLink),
}

/// What a connection reader hands to the root mailbox
#[derive(Debug)]
enum Incoming {
    Data(Envelope),
    Finalize(Rank),
    Closed(Rank),
}

struct RootLink {
    mailbox: mpsc::UnboundedReceiver<Incoming>,
    /// Held so the mailbox stays open with zero live readers
    _keepalive: mpsc::UnboundedSender<Incoming>,
    peers: BTreeMap<Rank, OwnedWriteHalf>,
    readers: Vec<JoinHandle<()>>,
    pending: VecDeque<Envelope>,
    finalized: BTreeSet<Rank>,
    closed: BTreeSet<Rank>,
}

struct WalkerLink {
    stream: TcpStream,
    pending: VecDeque<Envelope>,
}

impl World {
    /// Join the run
    ///
    /// The root binds `root_addr` and waits for `world_size - 1` walkers.
    /// Walkers retry connecting to `root_addr` until `connect_timeout` elapses.
    /// The root waits for its walkers no longer than `connect_timeout` either,
    /// so a rank that never joins fails the whole init instead of hanging it.
    ///
    /// # Returns
    ///
    /// A world whose every walker has completed the handshake with the root.
    pub async fn init(
        identity: ProcessIdentity,
        root_addr: SocketAddr,
        connect_timeout: Duration,
    ) -> CommResult<Self> {
        if identity.rank >= identity.world_size {
            return Err(CommError::InvalidRank(identity.rank));
        }

        if identity.is_root() {
            // A lone root has nobody to listen for
            if identity.num_walkers() == 0 {
                return Ok(Self::root(identity, RootLink::empty()));
            }
            let listener = TcpListener::bind(root_addr).await?;
            Self::from_listener(identity, listener, connect_timeout).await
        } else {
            Self::connect(identity, root_addr, connect_timeout).await
        }
    }

    /// Root side of [`init`](Self::init) with an already bound listener
    ///
    /// Every walker must connect and say HELLO within `accept_timeout`,
    /// counted from the call.
    pub async fn from_listener(
        identity: ProcessIdentity,
        listener: TcpListener,
        accept_timeout: Duration,
    ) -> CommResult<Self> {
        if !identity.is_root() {
            return Err(CommError::InvalidRank(identity.rank));
        }

        let expected = identity.num_walkers() as usize;
        let deadline = Instant::now() + accept_timeout;
        debug!(addr = ?listener.local_addr().ok(), expected, "root waiting for walkers");

        let mut link = RootLink::empty();
        let tx = link._keepalive.clone();

        while link.peers.len() < expected {
            // Accept the next connection and read its first frame
            let accepted = timeout_at(deadline, async {
                let (mut stream, addr) = listener.accept().await?;
                let first = read_message(&mut stream).await?;
                Ok::<_, CommError>((stream, addr, first))
            })
            .await;

            let (stream, addr, first) = match accepted {
                Ok(accepted) => accepted?,
                Err(_) => {
                    return Err(CommError::AcceptTimeout {
                        joined: link.peers.len() as u32,
                        expected: expected as u32,
                        timeout_ms: accept_timeout.as_millis() as u64,
                    })
                }
            };

            // Validate handshake
            let rank = match first {
                Message::Hello(hello) => {
                    if hello.protocol_version != PROTOCOL_VERSION {
                        return Err(CommError::ProtocolMismatch {
                            local: PROTOCOL_VERSION,
                            peer: hello.protocol_version,
                        });
                    }
                    hello.rank
                }
                other => return Err(CommError::unexpected(other)),
            };

            if rank == ROOT_RANK || rank >= identity.world_size {
                return Err(CommError::InvalidRank(rank));
            }
            if link.peers.contains_key(&rank) {
                return Err(CommError::DuplicateRank(rank));
            }

            // Split the stream: reads go to a forwarding task, writes stay here
            stream.set_nodelay(true)?;
            let (read_half, write_half) = stream.into_split();
            link.readers.push(tokio::spawn(forward_frames(rank, read_half, tx.clone())));
            link.peers.insert(rank, write_half);

            debug!(rank, %addr, connected = link.peers.len(), expected, "walker joined");
        }

        Ok(Self::root(identity, link))
    }

    fn root(identity: ProcessIdentity, link: RootLink) -> Self {
        Self {
            identity,
            link: Link::Root(link),
        }
    }

    async fn connect(
        identity: ProcessIdentity,
        root_addr: SocketAddr,
        connect_timeout: Duration,
    ) -> CommResult<Self> {
        let deadline = Instant::now() + connect_timeout;
        let mut backoff = Duration::from_millis(10);

        // Retry until the root is listening or the deadline passes
        let mut stream = loop {
            match TcpStream::connect(root_addr).await {
                Ok(stream) => break stream,
                Err(e) => {
                    if Instant::now() >= deadline {
                        debug!(error = %e, "giving up on root");
                        return Err(CommError::ConnectTimeout(connect_timeout.as_millis() as u64));
                    }
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_CONNECT_BACKOFF);
                }
            }
        };

        // Send handshake
        stream.set_nodelay(true)?;
        write_message(
            &mut stream,
            &Message::Hello(HelloMessage {
                protocol_version: PROTOCOL_VERSION,
                rank: identity.rank,
            }),
        )
        .await?;

        debug!(rank = identity.rank, %root_addr, "connected to root");

        Ok(Self {
            identity,
            link: Link::Walker(WalkerLink {
                stream,
                pending: VecDeque::new(),
            }),
        })
    }

}

impl RootLink {
    fn empty() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            mailbox: rx,
            _keepalive: tx,
            peers: BTreeMap::new(),
            readers: Vec::new(),
            pending: VecDeque::new(),
            finalized: BTreeSet::new(),
            closed: BTreeSet::new(),
        }
    }

    fn take_pending(&mut self, tag: Tag) -> Option<Envelope> {
        let pos = self.pending.iter().position(|env| env.tag == tag)?;
        self.pending.remove(pos)
    }

    async fn recv_any(&mut self, tag: Tag) -> CommResult<Envelope> {
        if let Some(env) = self.take_pending(tag) {
            return Ok(env);
        }

        loop {
            match self.mailbox.recv().await {
                Some(Incoming::Data(env)) if env.tag == tag => return Ok(env),
                Some(Incoming::Data(env)) => self.pending.push_back(env),
                Some(Incoming::Finalize(rank)) => {
                    self.finalized.insert(rank);
                }
                Some(Incoming::Closed(rank)) => {
                    self.closed.insert(rank);
                }
                None => return Err(CommError::Disconnected),
            }
        }
    }

    async fn finalize(mut self) -> CommResult<()> {
        let mut outstanding: BTreeSet<Rank> = self
            .peers
            .keys()
            .copied()
            .filter(|r| !self.finalized.contains(r) && !self.closed.contains(r))
            .collect();

        while !outstanding.is_empty() {
            match self.mailbox.recv().await {
                Some(Incoming::Data(env)) => {
                    warn!(source = env.source, tag = env.tag, "discarding message received during finalize");
                }
                Some(Incoming::Finalize(rank)) => {
                    outstanding.remove(&rank);
                }
                Some(Incoming::Closed(rank)) => {
                    self.closed.insert(rank);
                    outstanding.remove(&rank);
                }
                None => break,
            }
        }

        if !self.pending.is_empty() {
            warn!(count = self.pending.len(), "discarding unreceived messages at finalize");
        }

        // Release every walker that is still connected
        for (rank, mut writer) in std::mem::take(&mut self.peers) {
            if self.closed.contains(&rank) {
                continue;
            }
            if let Err(e) = write_message(&mut writer, &Message::FinalizeAck).await {
                debug!(rank, error = %e, "could not ack finalize");
                continue;
            }
            let _ = writer.shutdown().await;
        }

        for reader in self.readers.drain(..) {
            reader.abort();
        }

        debug!("root finalized");
        Ok(())
    }
}

impl WalkerLink {
    async fn recv_any(&mut self, tag: Tag) -> CommResult<Envelope> {
        if let Some(pos) = self.pending.iter().position(|env| env.tag == tag) {
            if let Some(env) = self.pending.remove(pos) {
                return Ok(env);
            }
        }

        loop {
            match read_message(&mut self.stream).await? {
                Message::Data(env) if env.tag == tag => return Ok(env),
                Message::Data(env) => self.pending.push_back(env),
                other => return Err(CommError::unexpected(other)),
            }
        }
    }

    async fn finalize(mut self, rank: Rank) -> CommResult<()> {
        write_message(&mut self.stream, &Message::Finalize { rank }).await?;

        // Wait for the root to release everyone
        loop {
            match read_message(&mut self.stream).await? {
                Message::FinalizeAck => break,
                Message::Data(env) => {
                    warn!(source = env.source, tag = env.tag, "discarding message received during finalize");
                }
                other => return Err(CommError::unexpected(other)),
            }
        }

        let _ = self.stream.shutdown().await;
        debug!(rank, "walker finalized");
        Ok(())
    }
}

impl Communicator for World {
    fn rank(&self) -> Rank {
        self.identity.rank
    }

    fn size(&self) -> u32 {
        self.identity.world_size
    }

    async fn send(&mut self, value: u64, dest: Rank, tag: Tag) -> CommResult<()> {
        let msg = Message::Data(Envelope {
            source: self.identity.rank,
            tag,
            value,
        });

        match &mut self.link {
            Link::Walker(link) => {
                if dest != ROOT_RANK {
                    return Err(CommError::InvalidRank(dest));
                }
                write_message(&mut link.stream, &msg).await
            }
            Link::Root(link) => {
                let writer = link.peers.get_mut(&dest).ok_or(CommError::InvalidRank(dest))?;
                write_message(writer, &msg).await
            }
        }
    }

    async fn recv_any(&mut self, tag: Tag) -> CommResult<(u64, Status)> {
        let env = match &mut self.link {
            Link::Root(link) => link.recv_any(tag).await?,
            Link::Walker(link) => link.recv_any(tag).await?,
        };

        Ok((
            env.value,
            Status {
                source: env.source,
                tag: env.tag,
            },
        ))
    }

    async fn finalize(self) -> CommResult<()> {
        match self.link {
            Link::Root(link) => link.finalize().await,
            Link::Walker(link) => link.finalize(self.identity.rank).await,
        }
    }
}

/// Decode frames from one walker into the root mailbox until it finalizes or drops
async fn forward_frames(rank: Rank, mut reader: OwnedReadHalf, tx: mpsc::UnboundedSender<Incoming>) {
    loop {
        let incoming = match read_message(&mut reader).await {
            Ok(Message::Data(env)) => {
                if env.source != rank {
                    warn!(rank, claimed = env.source, "envelope source does not match connection");
                }
                Incoming::Data(Envelope { source: rank, ..env })
            }
            Ok(Message::Finalize { .. }) => {
                let _ = tx.send(Incoming::Finalize(rank));
                return;
            }
            Ok(other) => {
                warn!(rank, message = ?other, "ignoring unexpected message");
                continue;
            }
            Err(CommError::Disconnected) => {
                warn!(rank, "walker disconnected");
                let _ = tx.send(Incoming::Closed(rank));
                return;
            }
            Err(e) => {
                warn!(rank, error = %e, "dropping walker connection");
                let _ = tx.send(Incoming::Closed(rank));
                return;
            }
        };

        if tx.send(incoming).is_err() {
            return;
        }
    }
}
