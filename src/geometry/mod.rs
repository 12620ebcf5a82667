//! Pure index and geometry helpers for regular block decompositions.
//!
//! Nothing in this module communicates. Every rank evaluates these functions
//! on the same, statically known partition metadata and arrives at the same
//! answers, which is what lets receive halos be derived without messaging.

pub mod adjacency;
pub mod bounds;
pub mod domain_key;
pub mod index_box;
pub mod indices;

pub use adjacency::{
    Halos, calculate_adjacency, compute_receiver_halo_location, compute_sender,
};
pub use bounds::{
    Bounds, create_mask_from_indices, do_create_domain, location_to_window,
    modify_halos_and_indices,
};
pub use domain_key::DomainKey;
pub use index_box::IndexBox;
pub use indices::{LocalIndices, calc_local_indices};
