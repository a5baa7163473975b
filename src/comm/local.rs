//! In-process world
//!
//! Every rank gets a [`LocalEndpoint`] holding an unbounded mailbox and a
//! sender to every other mailbox. Routing follows [`World`](super::World):
//! walkers may only address the root, the root may address any walker.
//! Each endpoint also holds a sender to its own mailbox, so a receive that
//! nobody will satisfy waits forever, as it does over sockets.

use super::error::{CommError, CommResult};
use super::protocol::Envelope;
use super::{Communicator, Rank, Status, Tag, ROOT_RANK};
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// Factory for a set of connected in-process endpoints
pub struct LocalWorld;

impl LocalWorld {
    /// Create `world_size` endpoints, indexed by rank
    pub fn create(world_size: u32) -> Vec<LocalEndpoint> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..world_size).map(|_| mpsc::unbounded_channel::<Envelope>()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalEndpoint {
                rank: rank as Rank,
                peers: senders.clone(),
                inbox,
                pending: VecDeque::new(),
            })
            .collect()
    }
}

/// One rank of a [`LocalWorld`]
pub struct LocalEndpoint {
    rank: Rank,
    peers: Vec<mpsc::UnboundedSender<Envelope>>,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    pending: VecDeque<Envelope>,
}

impl Communicator for LocalEndpoint {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> u32 {
        self.peers.len() as u32
    }

    async fn send(&mut self, value: u64, dest: Rank, tag: Tag) -> CommResult<()> {
        let routable = dest != self.rank && (self.rank == ROOT_RANK || dest == ROOT_RANK);
        let peer = self
            .peers
            .get(dest as usize)
            .filter(|_| routable)
            .ok_or(CommError::InvalidRank(dest))?;

        peer.send(Envelope {
            source: self.rank,
            tag,
            value,
        })
        .map_err(|_| CommError::Disconnected)
    }

    async fn recv_any(&mut self, tag: Tag) -> CommResult<(u64, Status)> {
        let env = match self.pending.iter().position(|env| env.tag == tag) {
            Some(pos) => self.pending.remove(pos),
            None => None,
        };

        let env = match env {
            Some(env) => env,
            None => loop {
                let env = self.inbox.recv().await.ok_or(CommError::Disconnected)?;
                if env.tag == tag {
                    break env;
                }
                self.pending.push_back(env);
            },
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
        Ok(())
    }
}
