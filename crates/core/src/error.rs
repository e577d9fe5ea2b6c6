//! Centralized error types for the ownership workspace.

use crate::types::{ClientId, Resource};
use thiserror::Error;

/// Top-level error enum. Variants map to failure modes of the allocator.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum OwnershipError {
    /// A strategy was asked to pick while no open resource had an eligible
    /// claimant. Only reachable through a broken allocation loop.
    #[error("No eligible claimant among {open_claims} open claims")]
    NoEligibleClaimant { open_claims: usize },

    /// A strategy returned a pair that is not among the open claims it was given.
    #[error("Strategy picked {resource} for {client}, which is not an open claim")]
    InvalidPick { resource: Resource, client: ClientId },

    #[error("Client {0} is already registered")]
    DuplicateClient(ClientId),
}

pub type OwnershipResult<T> = Result<T, OwnershipError>;
