//! Strategy contract and the queries every strategy shares.
//!
//! A strategy makes one decision per call: given the claims still open in
//! this pass and the in-progress allocation built so far, it names the next
//! `(resource, client)` pair. The [`Manager`](crate::Manager) loops it.

use ownership_core::{Allocation, Claim, ClientId, OwnershipResult, Resource};
use std::collections::HashMap;

/// Decides which resource-client pair is served next.
pub trait AllocationStrategy: Send + Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// Picks the next decision of the pass.
    ///
    /// `claims` holds only open claims (decided resources already removed,
    /// empty claims dropped). Returns
    /// [`OwnershipError::NoEligibleClaimant`](ownership_core::OwnershipError::NoEligibleClaimant)
    /// when there is nothing to pick.
    fn pick_pair(
        &self,
        claims: &[Claim<'_>],
        allocation: &Allocation,
    ) -> OwnershipResult<(Resource, ClientId)>;
}

/// Keeps the items matching `keep`; if none match, keeps everything.
pub fn filter_or_all<T, I, F>(items: I, keep: F) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> bool,
{
    let all: Vec<T> = items.into_iter().collect();
    if all.iter().any(&keep) {
        all.into_iter().filter(|item| keep(item)).collect()
    } else {
        all
    }
}

/// Claims of non-LOW clients, or every claim once only LOW clients remain.
pub fn priority_claims<'c, 'a>(claims: &[&'c Claim<'a>]) -> Vec<&'c Claim<'a>> {
    filter_or_all(claims.iter().copied(), |claim| {
        !claim.client.is_low_priority()
    })
}

/// In-progress allocation grouped by holder.
///
/// Resource order within a group is unspecified.
pub fn allocation_by_client(allocation: &Allocation) -> HashMap<ClientId, Vec<Resource>> {
    let mut grouped: HashMap<ClientId, Vec<Resource>> = HashMap::new();
    for (resource, client) in allocation.iter() {
        grouped.entry(client).or_default().push(resource);
    }
    grouped
}

/// Distinct-claimant count per resource, in first-encounter order.
///
/// Two-phase like a reverse index: slot every resource on first sight,
/// then push each claimant once.
pub fn resource_contention(claims: &[Claim<'_>]) -> Vec<(Resource, usize)> {
    let mut slots: HashMap<Resource, usize> = HashMap::new();
    let mut claimants: Vec<(Resource, Vec<ClientId>)> = Vec::new();

    for claim in claims {
        for resource in &claim.resources {
            let slot = *slots.entry(*resource).or_insert_with(|| {
                claimants.push((*resource, Vec::new()));
                claimants.len() - 1
            });
            let seen = &mut claimants[slot].1;
            if !seen.contains(&claim.client.id) {
                seen.push(claim.client.id);
            }
        }
    }

    claimants
        .into_iter()
        .map(|(resource, clients)| (resource, clients.len()))
        .collect()
}

/// Resources ordered by ascending contention.
///
/// The sort is stable: equally contended resources keep first-encounter order.
pub fn least_claimed_resources_queue(claims: &[Claim<'_>]) -> Vec<Resource> {
    let mut contention = resource_contention(claims);
    contention.sort_by_key(|(_, count)| *count);
    contention.into_iter().map(|(resource, _)| resource).collect()
}
