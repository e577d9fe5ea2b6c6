//! Client roster and committed allocation.
//!
//! Every roster change rebuilds the allocation from scratch by looping the
//! strategy once per claimed resource, then commits only the cells that
//! actually changed.

use crate::strategy::AllocationStrategy;
use crate::uniform::Uniform;
use ownership_core::{
    Allocation, Claim, Client, ClientId, Handoff, OwnershipError, OwnershipResult, Resource,
};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// Manages `resource -> client` assignment.
///
/// Single-threaded: callers sharing a manager wrap it in one lock around
/// each `add`/`revoke`.
pub struct Manager {
    /// External catalog. Informational; the algorithm only sees claims.
    resources: Vec<Resource>,
    clients: Vec<Client>,
    allocation: Allocation,
    last_handoffs: Vec<Handoff>,
    strategy: Box<dyn AllocationStrategy>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("strategy", &self.strategy.name())
            .field("resources", &self.resources.len())
            .field("clients", &self.clients.len())
            .field("allocation", &self.allocation)
            .finish()
    }
}

impl Manager {
    pub fn new() -> Self {
        Self::with_strategy(Box::new(Uniform::new()))
    }

    pub fn with_strategy(strategy: Box<dyn AllocationStrategy>) -> Self {
        Self {
            resources: Vec::new(),
            clients: Vec::new(),
            allocation: Allocation::new(),
            last_handoffs: Vec::new(),
            strategy,
        }
    }

    pub fn with_resources(mut self, resources: impl IntoIterator<Item = Resource>) -> Self {
        self.set_resources(resources);
        self
    }

    pub fn set_resources(&mut self, resources: impl IntoIterator<Item = Resource>) {
        self.resources = resources.into_iter().collect();
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id)
    }

    /// Mutable access to a roster member.
    ///
    /// Changes are picked up by the next pass; nothing is recomputed here.
    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.iter_mut().find(|c| c.id == id)
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    /// Cells changed by the most recent [`reassign`](Self::reassign), ordered by resource.
    pub fn last_handoffs(&self) -> &[Handoff] {
        &self.last_handoffs
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Registers `client` and reallocates.
    ///
    /// A client whose id is already registered is rejected with
    /// [`OwnershipError::DuplicateClient`]; roster and allocation stay as they were.
    pub fn add(&mut self, client: Client) -> OwnershipResult<&Allocation> {
        if self.client(client.id).is_some() {
            tracing::warn!(client = %client.id, "duplicate client rejected");
            return Err(OwnershipError::DuplicateClient(client.id));
        }

        tracing::info!(
            client = %client.id,
            priority = %client.priority,
            claims = client.claimed.len(),
            roster = self.clients.len() + 1,
            "adding client"
        );
        self.clients.push(client);
        self.allocate()
    }

    /// Removes `client` from the roster and reallocates.
    ///
    /// An unknown id still triggers a pass.
    pub fn revoke(&mut self, client: ClientId) -> OwnershipResult<&Allocation> {
        let before = self.clients.len();
        self.clients.retain(|c| c.id != client);

        if self.clients.len() == before {
            tracing::warn!(client = %client, "revoking unknown client");
        } else {
            tracing::info!(client = %client, roster = self.clients.len(), "revoked client");
        }
        self.allocate()
    }

    /// Resources claimed by any roster client. One decision per resource.
    pub fn get_claimed_resources(&self) -> HashSet<Resource> {
        self.clients
            .iter()
            .flat_map(|c| c.claimed.iter().copied())
            .collect()
    }

    /// Catalog entries nobody currently claims.
    pub fn unclaimed_resources(&self) -> Vec<Resource> {
        let claimed = self.get_claimed_resources();
        self.resources
            .iter()
            .filter(|r| !claimed.contains(*r))
            .copied()
            .collect()
    }

    /// Roster claims without `excluded` resources, in roster order.
    ///
    /// Clients left with nothing to claim are dropped.
    pub fn get_open_claims(&self, excluded: &HashSet<Resource>) -> Vec<Claim<'_>> {
        self.clients
            .iter()
            .map(|client| {
                Claim::new(
                    client,
                    client
                        .claimed
                        .iter()
                        .filter(|r| !excluded.contains(*r))
                        .copied(),
                )
            })
            .filter(|claim| !claim.resources.is_empty())
            .collect()
    }

    /// Rebuilds the allocation from the current roster and commits the diff.
    ///
    /// On error nothing is committed.
    pub fn allocate(&mut self) -> OwnershipResult<&Allocation> {
        let decisions = self.get_claimed_resources().len();
        let mut in_progress = Allocation::new();
        let mut decided: HashSet<Resource> = HashSet::with_capacity(decisions);

        for iteration in 0..decisions {
            let claims = self.get_open_claims(&decided);
            let (resource, client) = self.strategy.pick_pair(&claims, &in_progress)?;

            let is_open = claims
                .iter()
                .any(|claim| claim.client.id == client && claim.contains(&resource));
            if !is_open {
                return Err(OwnershipError::InvalidPick { resource, client });
            }

            tracing::debug!(%resource, %client, iteration, "picked");
            in_progress.insert(resource, client);
            decided.insert(resource);
        }

        self.commit(in_progress);

        tracing::info!(
            strategy = self.strategy.name(),
            decisions,
            handoffs = self.last_handoffs.len(),
            "allocation pass complete"
        );
        Ok(&self.allocation)
    }

    /// Installs `new_allocation`, touching only cells whose holder changed.
    pub fn reassign(&mut self, new_allocation: Allocation) -> &Allocation {
        self.commit(new_allocation);
        &self.allocation
    }

    fn commit(&mut self, new_allocation: Allocation) {
        let keys: BTreeSet<Resource> = self
            .allocation
            .resources()
            .chain(new_allocation.resources())
            .copied()
            .collect();

        let mut handoffs = Vec::new();
        for resource in keys {
            let from = self.allocation.get(&resource);
            let to = new_allocation.get(&resource);
            if from == to {
                continue;
            }

            if from.is_some() {
                self.allocation.remove(&resource);
            }
            if let Some(client) = to {
                self.allocation.insert(resource, client);
            }

            let handoff = Handoff { resource, from, to };
            tracing::debug!(%handoff, "reassigned");
            handoffs.push(handoff);
        }

        self.last_handoffs = handoffs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(id: u64) -> Resource {
        Resource::new(id)
    }

    fn alloc(cells: &[(u64, u64)]) -> Allocation {
        cells.iter().map(|(r, c)| (Resource::new(*r), ClientId(*c))).collect()
    }

    // Resources 0..5; S1, S2, S3 each claim the resource matching their id.
    fn setup() -> Manager {
        let mut manager = Manager::new().with_resources((0..5).map(Resource::new));
        for id in 1..=3 {
            manager.add(Client::new(id).with_claims([r(id)])).unwrap();
        }
        manager
    }

    #[test]
    fn starts_empty() {
        let manager = Manager::new();
        assert!(manager.allocation().is_empty());
        assert_eq!(manager.strategy_name(), "uniform");
    }

    #[test]
    fn add_allocates_new_claim() {
        let mut manager = setup();
        let allocation = manager.add(Client::new(4).with_claims([r(4)])).unwrap();

        assert_eq!(*allocation, alloc(&[(1, 1), (2, 2), (3, 3), (4, 4)]));
    }

    #[test]
    fn add_rejects_duplicate() {
        let mut manager = setup();
        let err = manager
            .add(Client::new(2).with_claims([r(4)]))
            .unwrap_err();

        assert_eq!(err, OwnershipError::DuplicateClient(ClientId(2)));
        assert_eq!(manager.clients().len(), 3);
        assert_eq!(*manager.allocation(), alloc(&[(1, 1), (2, 2), (3, 3)]));
    }

    #[test]
    fn revoke_releases_resources() {
        let mut manager = setup();
        let allocation = manager.revoke(ClientId(1)).unwrap();

        assert_eq!(*allocation, alloc(&[(2, 2), (3, 3)]));
    }

    #[test]
    fn revoke_unknown_client_keeps_allocation() {
        let mut manager = setup();
        let allocation = manager.revoke(ClientId(42)).unwrap().clone();

        assert_eq!(allocation, alloc(&[(1, 1), (2, 2), (3, 3)]));
        assert!(manager.last_handoffs().is_empty());
    }

    #[test]
    fn open_claims_exclude_decided_resources() {
        let manager = setup();
        let excluded: HashSet<Resource> = [r(1)].into_iter().collect();
        let claims = manager.get_open_claims(&excluded);

        let summary: Vec<(ClientId, Vec<Resource>)> = claims
            .iter()
            .map(|c| (c.client.id, c.resources.to_vec()))
            .collect();
        assert_eq!(
            summary,
            vec![(ClientId(2), vec![r(2)]), (ClientId(3), vec![r(3)])]
        );
    }

    #[test]
    fn claimed_resources_span_roster() {
        let manager = setup();
        let expected: HashSet<Resource> = [r(1), r(2), r(3)].into_iter().collect();

        assert_eq!(manager.get_claimed_resources(), expected);
        assert_eq!(manager.unclaimed_resources(), vec![r(0), r(4)]);
    }

    #[test]
    fn reassign_touches_only_changed_cells() {
        let mut manager = setup();
        let allocation = manager.reassign(alloc(&[(1, 3), (2, 2)])).clone();

        assert_eq!(allocation, alloc(&[(1, 3), (2, 2)]));
        assert_eq!(
            manager.last_handoffs(),
            &[
                Handoff {
                    resource: r(1),
                    from: Some(ClientId(1)),
                    to: Some(ClientId(3)),
                },
                Handoff {
                    resource: r(3),
                    from: Some(ClientId(3)),
                    to: None,
                },
            ]
        );
    }

    #[test]
    fn allocate_is_idempotent() {
        let mut manager = setup();
        let allocation = manager.allocate().unwrap().clone();

        assert_eq!(allocation, alloc(&[(1, 1), (2, 2), (3, 3)]));
        assert!(manager.last_handoffs().is_empty());
    }

    #[test]
    fn client_mut_changes_apply_on_next_pass() {
        let mut manager = setup();
        if let Some(client) = manager.client_mut(ClientId(1)) {
            client.claimed.clear();
        }
        // Stale until the next pass.
        assert_eq!(manager.allocation().get(&r(1)), Some(ClientId(1)));

        manager.allocate().unwrap();
        assert_eq!(manager.allocation().get(&r(1)), None);
    }

    struct Rogue;

    impl AllocationStrategy for Rogue {
        fn name(&self) -> &'static str {
            "rogue"
        }

        fn pick_pair(
            &self,
            _claims: &[Claim<'_>],
            _allocation: &Allocation,
        ) -> OwnershipResult<(Resource, ClientId)> {
            Ok((Resource::new(99), ClientId(1)))
        }
    }

    #[test]
    fn invalid_pick_commits_nothing() {
        let mut manager = Manager::with_strategy(Box::new(Rogue));
        let err = manager
            .add(Client::new(1).with_claims([r(1)]))
            .unwrap_err();

        assert_eq!(
            err,
            OwnershipError::InvalidPick {
                resource: r(99),
                client: ClientId(1),
            }
        );
        assert!(manager.allocation().is_empty());
        assert_eq!(manager.clients().len(), 1);
    }
}
