//! Allocation report generator.
//!
//! Takes a [`Manager`] snapshot and produces per-client shares, contention
//! hotspots, and the handoffs of the last commit.

use crate::manager::Manager;
use crate::strategy::{allocation_by_client, resource_contention};
use ownership_core::{ClientId, Handoff, Priority, Resource};
use serde::Serialize;
use std::collections::HashSet;

/// Snapshot of the committed allocation.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationReport {
    pub strategy: &'static str,
    pub catalog_size: usize,
    pub claimed_resources: usize,
    pub allocated_resources: usize,
    /// One entry per roster client, ordered by client id.
    pub shares: Vec<ClientShare>,
    /// Resources with two or more claimants, most contended first.
    pub hotspots: Vec<ResourceContention>,
    pub handoffs: Vec<Handoff>,
}

/// What one client claims and holds.
#[derive(Debug, Clone, Serialize)]
pub struct ClientShare {
    pub client: ClientId,
    pub priority: Priority,
    pub claimed: usize,
    /// Held resources, ascending.
    pub held: Vec<Resource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceContention {
    pub resource: Resource,
    pub claimants: usize,
    pub holder: Option<ClientId>,
}

impl AllocationReport {
    pub fn build(manager: &Manager) -> Self {
        let allocation = manager.allocation();
        let mut by_client = allocation_by_client(allocation);

        let mut shares: Vec<ClientShare> = manager
            .clients()
            .iter()
            .map(|client| {
                let mut held = by_client.remove(&client.id).unwrap_or_default();
                held.sort_unstable();
                ClientShare {
                    client: client.id,
                    priority: client.priority,
                    claimed: client.claimed.len(),
                    held,
                }
            })
            .collect();
        shares.sort_by_key(|share| share.client);

        let claims = manager.get_open_claims(&HashSet::new());
        let mut hotspots: Vec<ResourceContention> = resource_contention(&claims)
            .into_iter()
            .filter(|(_, claimants)| *claimants > 1)
            .map(|(resource, claimants)| ResourceContention {
                resource,
                claimants,
                holder: allocation.get(&resource),
            })
            .collect();
        hotspots.sort_by(|a, b| {
            b.claimants
                .cmp(&a.claimants)
                .then(a.resource.cmp(&b.resource))
        });

        AllocationReport {
            strategy: manager.strategy_name(),
            catalog_size: manager.resources().len(),
            claimed_resources: manager.get_claimed_resources().len(),
            allocated_resources: allocation.len(),
            shares,
            hotspots,
            handoffs: manager.last_handoffs().to_vec(),
        }
    }

    /// Max minus min held count across NORMAL clients with a non-empty claim set.
    pub fn spread(&self) -> usize {
        let held = self
            .shares
            .iter()
            .filter(|s| s.priority == Priority::Normal && s.claimed > 0)
            .map(|s| s.held.len());

        let (min, max) = held.fold((usize::MAX, 0), |(lo, hi), n| (lo.min(n), hi.max(n)));
        max.saturating_sub(min)
    }

    /// Render the report as a formatted string.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push('\n');
        out.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        out.push_str("║                      ALLOCATION REPORT                       ║\n");
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        out.push_str(&format!("║  Strategy:           {:>39} ║\n", self.strategy));
        out.push_str(&format!("║  Catalog:            {:>39} ║\n", self.catalog_size));
        out.push_str(&format!(
            "║  Claimed:            {:>39} ║\n",
            self.claimed_resources
        ));
        out.push_str(&format!(
            "║  Allocated:          {:>39} ║\n",
            self.allocated_resources
        ));
        out.push_str(&format!("║  Spread:             {:>39} ║\n", self.spread()));
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        if self.shares.is_empty() {
            out.push_str("║  No clients.                                                 ║\n");
        } else {
            out.push_str("║  SHARES                                                      ║\n");
            for share in &self.shares {
                let held: Vec<String> = share.held.iter().map(ToString::to_string).collect();
                out.push_str(&format!(
                    "║  {} [{}] {}/{}: {}\n",
                    share.client,
                    share.priority,
                    share.held.len(),
                    share.claimed,
                    held.join(", ")
                ));
            }
        }

        if !self.hotspots.is_empty() {
            out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
            out.push_str("║  CONTENTION HOTSPOTS                                         ║\n");
            for spot in &self.hotspots {
                let holder = spot
                    .holder
                    .map_or_else(|| "-".to_string(), |c| c.to_string());
                out.push_str(&format!(
                    "║  {}  claimants: {}  held by: {}\n",
                    spot.resource, spot.claimants, holder
                ));
            }
        }

        if !self.handoffs.is_empty() {
            out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
            out.push_str("║  LAST HANDOFFS                                               ║\n");
            for handoff in &self.handoffs {
                out.push_str(&format!("║  {}\n", handoff));
            }
        }

        out.push_str("╚══════════════════════════════════════════════════════════════╝\n");
        out
    }
}
