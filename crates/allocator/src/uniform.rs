//! Fair-share strategy.
//!
//! A client may not receive another resource in this pass while some
//! eligible competitor still holds fewer. Among eligible clients, the least
//! contended resource is served first.

use crate::strategy::{
    allocation_by_client, filter_or_all, least_claimed_resources_queue, priority_claims,
    AllocationStrategy,
};
use ownership_core::{Allocation, Claim, ClientId, OwnershipError, OwnershipResult, Resource};

/// Aims towards uniform distribution of resources across clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uniform;

impl Uniform {
    pub fn new() -> Self {
        Self
    }

    /// Claims of clients holding fewer resources than the current maximum.
    ///
    /// Falls back to every claim when all clients are equally loaded.
    pub fn deprived_claims<'c, 'a>(
        claims: &[&'c Claim<'a>],
        allocation: &Allocation,
    ) -> Vec<&'c Claim<'a>> {
        let held = allocation_by_client(allocation);
        let held_count = |client: ClientId| held.get(&client).map_or(0, Vec::len);
        let max_held = held.values().map(Vec::len).max().unwrap_or(0);

        filter_or_all(claims.iter().copied(), |claim| {
            held_count(claim.client.id) < max_held
        })
    }

    /// Candidate clients per resource, least contended resource first.
    ///
    /// Contention is ranked over all open claims; candidates come from the
    /// priority- and deprivation-filtered subset, in claim order. Resources
    /// without candidates are dropped.
    pub fn queue(
        claims: &[Claim<'_>],
        allocation: &Allocation,
    ) -> Vec<(Resource, Vec<ClientId>)> {
        let open: Vec<&Claim> = claims.iter().collect();
        let eligible = Self::deprived_claims(&priority_claims(&open), allocation);

        least_claimed_resources_queue(claims)
            .into_iter()
            .filter_map(|resource| {
                let candidates: Vec<ClientId> = eligible
                    .iter()
                    .filter(|claim| claim.contains(&resource))
                    .map(|claim| claim.client.id)
                    .collect();
                (!candidates.is_empty()).then_some((resource, candidates))
            })
            .collect()
    }
}

impl AllocationStrategy for Uniform {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn pick_pair(
        &self,
        claims: &[Claim<'_>],
        allocation: &Allocation,
    ) -> OwnershipResult<(Resource, ClientId)> {
        Self::queue(claims, allocation)
            .into_iter()
            .next()
            .and_then(|(resource, candidates)| candidates.first().map(|c| (resource, *c)))
            .ok_or(OwnershipError::NoEligibleClaimant {
                open_claims: claims.len(),
            })
    }
}
