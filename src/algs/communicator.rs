//! Thin façade over in-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* copied at send time, so callers may
//! reuse their buffers immediately. Sends are non-blocking and return a
//! waitable handle; receives block until a matching message arrives. Messages
//! between one `(source, destination, tag)` triple are delivered in FIFO order
//! by every backend, and the halo exchange relies on that.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;

use crate::halo_error::HaloError;

/// Typed message tag. Each protocol phase uses its own tag so that messages of
/// different phases can never be matched against each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    /// Rendezvous: one `(sender, receiver)` edge per receive halo, sent to the master.
    pub const DISCOVERY_EDGES: CommTag = CommTag(0);
    /// Rendezvous: master fan-out of "who will contact you".
    pub const DISCOVERY_ROUTES: CommTag = CommTag(1);
    /// Transmit-halo setup requests.
    pub const TRANSMIT_SETUP: CommTag = CommTag(2);
    /// Point-to-point emulation of a gather to the root.
    pub const GATHER: CommTag = CommTag(3);

    const SYNC_BASE: u16 = 100;

    /// Tag of halo payloads exchanged for axis level `level`.
    pub const fn sync_level(level: usize) -> CommTag {
        CommTag(Self::SYNC_BASE + level as u16)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Block until the operation behind this handle has completed.
    fn wait(self);
}

impl Wait for () {
    fn wait(self) {}
}

/// Wait on every handle, in order.
pub fn wait_all<H: Wait>(handles: impl IntoIterator<Item = H>) {
    for h in handles {
        h.wait();
    }
}

/// Point-to-point communication interface.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;

    /// Rank of the calling process.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Start sending a copy of `buf` to `peer`.
    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> Self::SendHandle;

    /// Block until a message from `peer` with `tag` arrives and return it.
    fn recv(&self, peer: usize, tag: CommTag) -> Result<Vec<u8>, HaloError>;

    /// Collect one buffer from every rank on `root`.
    ///
    /// Returns `Some(buffers)` (indexed by rank) on the root and `None`
    /// elsewhere. Every rank must call it.
    fn gather(
        &self,
        root: usize,
        tag: CommTag,
        buf: &[u8],
    ) -> Result<Option<Vec<Vec<u8>>>, HaloError> {
        if root >= self.size() {
            return Err(HaloError::RankOutOfRange {
                rank: root,
                size: self.size(),
            });
        }
        let send = self.isend(root, tag, buf);
        let gathered = if self.rank() == root {
            (0..self.size())
                .map(|peer| self.recv(peer, tag))
                .collect::<Result<Vec<_>, _>>()
                .map(Some)
        } else {
            Ok(None)
        };
        send.wait();
        gathered
    }
}

impl<C: Communicator + ?Sized> Communicator for &C {
    type SendHandle = C::SendHandle;

    fn rank(&self) -> usize {
        (**self).rank()
    }
    fn size(&self) -> usize {
        (**self).size()
    }
    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> Self::SendHandle {
        (**self).isend(peer, tag, buf)
    }
    fn recv(&self, peer: usize, tag: CommTag) -> Result<Vec<u8>, HaloError> {
        (**self).recv(peer, tag)
    }
}

impl<C: Communicator + ?Sized> Communicator for Arc<C> {
    type SendHandle = C::SendHandle;

    fn rank(&self) -> usize {
        (**self).rank()
    }
    fn size(&self) -> usize {
        (**self).size()
    }
    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> Self::SendHandle {
        (**self).isend(peer, tag, buf)
    }
    fn recv(&self, peer: usize, tag: CommTag) -> Result<Vec<u8>, HaloError> {
        (**self).recv(peer, tag)
    }
}

// --- NoComm: single rank, loopback only ---

/// Single-rank communicator for serial runs and unit tests.
///
/// Messages addressed to rank 0 are looped back. Receiving when nothing is
/// queued is an error instead of a hang, since no other rank could ever send.
#[derive(Clone, Debug, Default)]
pub struct NoComm {
    loopback: Arc<DashMap<u16, VecDeque<Bytes>>>,
}

impl NoComm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Communicator for NoComm {
    type SendHandle = ();

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) {
        if peer != 0 {
            log::warn!("NoComm dropping message for rank {peer} (tag {})", tag.0);
            return;
        }
        self.loopback
            .entry(tag.as_u16())
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn recv(&self, peer: usize, tag: CommTag) -> Result<Vec<u8>, HaloError> {
        if peer != 0 {
            return Err(HaloError::RankOutOfRange { rank: peer, size: 1 });
        }
        self.loopback
            .get_mut(&tag.as_u16())
            .and_then(|mut queue| queue.pop_front())
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| HaloError::Comm {
                neighbor: peer,
                reason: format!("no message pending for tag {} on a single rank", tag.0),
            })
    }
}

// --- ThreadComm: one thread per simulated rank ---

type Key = (usize, usize, u16); // (src, dst, tag)

/// In-process communicator: every simulated rank runs on its own thread and
/// all ranks of one group share a mailbox.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<DashMap<Key, VecDeque<Bytes>>>,
}

impl ThreadComm {
    /// Build the communicators of a fresh group of `size` ranks.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let mailbox = Arc::new(DashMap::new());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    fn try_pop(&self, key: &Key) -> Option<Bytes> {
        self.mailbox.get_mut(key).and_then(|mut q| q.pop_front())
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) {
        let key = (self.rank, peer, tag.as_u16());
        self.mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn recv(&self, peer: usize, tag: CommTag) -> Result<Vec<u8>, HaloError> {
        if peer >= self.size {
            return Err(HaloError::RankOutOfRange {
                rank: peer,
                size: self.size,
            });
        }
        let key = (peer, self.rank, tag.as_u16());
        loop {
            if let Some(bytes) = self.try_pop(&key) {
                return Ok(bytes.to_vec());
            }
            std::thread::yield_now();
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;
    use std::rc::Rc;

    struct MpiInner {
        // declared before `universe`: the world handle must drop before finalize
        world: SimpleCommunicator,
        _universe: Option<Universe>,
    }

    /// MPI communicator over `MPI_COMM_WORLD`.
    #[derive(Clone)]
    pub struct MpiComm {
        inner: Rc<MpiInner>,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Initialize MPI and wrap the world communicator.
        pub fn new() -> Result<Self, HaloError> {
            let universe = mpi::initialize().ok_or_else(|| HaloError::Comm {
                neighbor: 0,
                reason: "MPI already initialized or initialization failed".into(),
            })?;
            let world = universe.world();
            Ok(Self::wrap(world, Some(universe)))
        }

        /// Wrap a communicator of an already initialized environment.
        pub fn from_communicator(world: SimpleCommunicator) -> Self {
            Self::wrap(world, None)
        }

        fn wrap(world: SimpleCommunicator, universe: Option<Universe>) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                inner: Rc::new(MpiInner {
                    world,
                    _universe: universe,
                }),
                rank,
                size,
            }
        }

        pub fn world(&self) -> &SimpleCommunicator {
            &self.inner.world
        }
    }

    /// Outstanding immediate send; owns the copied payload until completion.
    pub struct MpiSendHandle {
        request: Option<Request<'static, [u8]>>,
        buf: *mut [u8],
    }

    impl Wait for MpiSendHandle {
        fn wait(self) {
            drop(self);
        }
    }

    impl Drop for MpiSendHandle {
        fn drop(&mut self) {
            if let Some(request) = self.request.take() {
                request.wait();
            }
            // SAFETY: `buf` came from `Box::leak` in `isend` and the request
            // referencing it has completed above.
            unsafe { drop(Box::from_raw(self.buf)) };
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSendHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> MpiSendHandle {
            let owned: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let ptr: *mut [u8] = owned;
            // SAFETY: `ptr` stays valid until the handle is dropped, which
            // waits on the request first.
            let payload: &'static [u8] = unsafe { &*ptr };
            let request = self
                .inner
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, payload, tag.as_u16() as i32);
            MpiSendHandle {
                request: Some(request),
                buf: ptr,
            }
        }

        fn recv(&self, peer: usize, tag: CommTag) -> Result<Vec<u8>, HaloError> {
            if peer >= self.size {
                return Err(HaloError::RankOutOfRange {
                    rank: peer,
                    size: self.size,
                });
            }
            let (data, _status) = self
                .inner
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(tag.as_u16() as i32);
            Ok(data)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiSendHandle};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_roundtrip_two_ranks() {
        let world = ThreadComm::world(2);
        let send = world[0].isend(1, CommTag(7), &[1, 2, 3, 4]);
        send.wait();
        let data = world[1].recv(0, CommTag(7)).unwrap();
        assert_eq!(data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn thread_tags_do_not_mix() {
        let world = ThreadComm::world(2);
        world[0].isend(1, CommTag(1), b"one");
        world[0].isend(1, CommTag(2), b"two");
        assert_eq!(world[1].recv(0, CommTag(2)).unwrap(), b"two");
        assert_eq!(world[1].recv(0, CommTag(1)).unwrap(), b"one");
    }

    #[test]
    fn separate_worlds_do_not_share_mailboxes() {
        let a = ThreadComm::world(2);
        let b = ThreadComm::world(2);
        a[0].isend(1, CommTag(5), &[9]);
        b[0].isend(1, CommTag(5), &[7]);
        assert_eq!(b[1].recv(0, CommTag(5)).unwrap(), vec![7]);
        assert_eq!(a[1].recv(0, CommTag(5)).unwrap(), vec![9]);
    }

    #[test]
    fn nocomm_loops_back_and_errors_when_empty() {
        let comm = NoComm::new();
        comm.isend(0, CommTag::GATHER, &[42]);
        assert_eq!(comm.recv(0, CommTag::GATHER).unwrap(), vec![42]);
        assert!(matches!(
            comm.recv(0, CommTag::GATHER),
            Err(HaloError::Comm { .. })
        ));
        assert!(matches!(
            comm.recv(3, CommTag::GATHER),
            Err(HaloError::RankOutOfRange { rank: 3, size: 1 })
        ));
    }

    #[test]
    fn sync_tags_offset_by_level() {
        assert_eq!(CommTag::sync_level(0).as_u16(), 100);
        assert_eq!(CommTag::sync_level(2).as_u16(), 102);
    }

    #[test]
    fn gather_on_single_rank() {
        let comm = NoComm::new();
        let got = comm.gather(0, CommTag::GATHER, &[1, 2]).unwrap();
        assert_eq!(got, Some(vec![vec![1, 2]]));
    }
}
