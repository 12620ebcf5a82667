//! Communication and the halo protocol built on it.

pub mod communicator;
pub mod halo_exchange;
pub mod rendezvous;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, ThreadComm, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use halo_exchange::exchange;
pub use rendezvous::{discover_incoming, exchange_transmit_requests};
