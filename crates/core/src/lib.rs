//! Domain models, shared types, and error definitions.
//!
//! Foundation crate -- no allocation logic and no I/O.

pub mod error;
pub mod types;

pub use error::{OwnershipError, OwnershipResult};
pub use types::{
    Allocation, Claim, Client, ClientId, Handoff, HandoffKind, Priority, Resource, ResourceSet,
};
