//! HaloError: unified error type for grid-halo public APIs.
//!
//! Configuration problems surface synchronously from constructors. Protocol
//! problems that can be detected locally (malformed wire records, payloads of
//! the wrong size) surface from the communication phases.

use thiserror::Error;

/// Unified error type for partitioning and halo-exchange operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HaloError {
    /// Lengths of shape / partition / coordinate (or halo) vectors disagree.
    #[error("dimension mismatch in {context}: expected {expected} axes, found {found}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },
    /// A decomposition coordinate is not below its axis' partition count.
    #[error("coordinate {coordinate} on axis {axis} is out of range for {partitions} partitions")]
    CoordinateOutOfRange {
        axis: usize,
        coordinate: usize,
        partitions: usize,
    },
    /// An axis was asked to split into zero chunks or more chunks than nodes.
    #[error("cannot split axis {axis} of extent {extent} into {partitions} partitions")]
    InvalidPartitionCount {
        axis: usize,
        extent: usize,
        partitions: usize,
    },
    /// A chunk is narrower than the halo a neighbor wants to read from it.
    #[error("stencil depth {depth} on axis {axis} exceeds chunk width {width}")]
    StencilTooWide {
        axis: usize,
        depth: usize,
        width: usize,
    },
    /// Requested bounds leave the global mesh.
    #[error("{side} bounds out of global mesh bounds on axis {axis}")]
    OutOfMeshBounds { side: &'static str, axis: usize },
    /// The mesh has no nodes on some axis.
    #[error("mesh axis {0} has no nodes")]
    EmptyAxis(usize),
    /// The mesh axis is not strictly increasing.
    #[error("mesh axis {0} is not strictly increasing")]
    UnsortedAxis(usize),
    /// The two keys are not adjacent in the decomposition.
    #[error("domain {sender} is not a neighbor of domain {receiver}")]
    NotANeighbor { receiver: String, sender: String },
    /// A neighbor lies in a direction where the halo width is zero.
    #[error("domain {receiver} has no halo facing neighbor {sender} on axis {axis}")]
    NoHaloTowardNeighbor {
        receiver: String,
        sender: String,
        axis: usize,
    },
    /// A transmit request names a window outside the serving domain's interior.
    #[error("halo window requested by rank {receiver} exceeds interior of domain {domain}")]
    HaloExceedsNeighbor { domain: String, receiver: usize },
    /// A transmit request names a domain this rank does not own.
    #[error("rank {rank} does not own domain {domain}")]
    UnknownDomain { rank: usize, domain: String },
    /// Array or window shapes disagree.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    /// A window does not fit inside the array it addresses.
    #[error("window {window} lies outside array of shape {shape:?}")]
    WindowOutOfRange { window: String, shape: Vec<usize> },
    /// A halo payload carried the wrong number of bytes.
    #[error("halo payload from rank {neighbor}: expected {expected} bytes, got {found}")]
    PayloadSize {
        neighbor: usize,
        expected: usize,
        found: usize,
    },
    /// A wire record could not be decoded.
    #[error("malformed wire record from rank {neighbor}: {reason}")]
    Wire { neighbor: usize, reason: String },
    /// The communicator failed to deliver a message.
    #[error("communication with rank {neighbor} failed: {reason}")]
    Comm { neighbor: usize, reason: String },
    /// The master's routing table disagrees with the locally derived one.
    #[error("rank {rank}: discovered halo edges disagree with partition geometry ({detail})")]
    DiscoveryMismatch { rank: usize, detail: String },
    /// A rank index is not part of the communicator.
    #[error("rank {rank} is outside a communicator of size {size}")]
    RankOutOfRange { rank: usize, size: usize },
}
