//! Domain types for the ownership allocator.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Inline storage for claim sets. Most clients claim a handful of resources.
pub type ResourceSet = SmallVec<[Resource; 8]>;

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// An indivisible unit assignable to exactly one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    pub id: u64,
}

impl Resource {
    pub const fn new(id: u64) -> Self {
        Self { id }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.id)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Ordered `Low < Normal` so higher priority sorts last.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => f.write_str("low"),
            Priority::Normal => f.write_str("normal"),
        }
    }
}

/// A competing subject. Identity is `id`; `priority` and `claimed` may change
/// between passes and are re-read on every pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    #[serde(default)]
    pub priority: Priority,
    /// Resources this client is willing to receive, in declaration order.
    #[serde(default)]
    pub claimed: ResourceSet,
}

impl Client {
    pub fn new(id: u64) -> Self {
        Self {
            id: ClientId(id),
            priority: Priority::default(),
            claimed: SmallVec::new(),
        }
    }

    pub fn with_claims(mut self, resources: impl IntoIterator<Item = Resource>) -> Self {
        self.claimed = resources.into_iter().collect();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[inline]
    pub fn claims(&self, resource: &Resource) -> bool {
        self.claimed.contains(resource)
    }

    #[inline]
    pub fn is_low_priority(&self) -> bool {
        self.priority == Priority::Low
    }
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Client {}

impl Hash for Client {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// The still-open part of one client's claim set during a pass.
///
/// Borrows the roster's client so priority is read at decision time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim<'a> {
    pub client: &'a Client,
    pub resources: ResourceSet,
}

impl<'a> Claim<'a> {
    pub fn new(client: &'a Client, resources: impl IntoIterator<Item = Resource>) -> Self {
        Self {
            client,
            resources: resources.into_iter().collect(),
        }
    }

    #[inline]
    pub fn contains(&self, resource: &Resource) -> bool {
        self.resources.contains(resource)
    }
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// `Resource -> ClientId` assignment. At most one client per resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Allocation {
    assignments: HashMap<Resource, ClientId>,
}

impl Allocation {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, resource: &Resource) -> Option<ClientId> {
        self.assignments.get(resource).copied()
    }

    /// Assigns `resource`, returning the previous holder if any.
    pub fn insert(&mut self, resource: Resource, client: ClientId) -> Option<ClientId> {
        self.assignments.insert(resource, client)
    }

    pub fn remove(&mut self, resource: &Resource) -> Option<ClientId> {
        self.assignments.remove(resource)
    }

    #[inline]
    pub fn contains(&self, resource: &Resource) -> bool {
        self.assignments.contains_key(resource)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Resource, ClientId)> + '_ {
        self.assignments.iter().map(|(r, c)| (*r, *c))
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.assignments.keys()
    }

    /// Cells ordered by resource, for stable output.
    pub fn sorted(&self) -> Vec<(Resource, ClientId)> {
        let mut cells: Vec<_> = self.iter().collect();
        cells.sort_unstable();
        cells
    }

    /// Number of resources held by `client`.
    pub fn held_by(&self, client: ClientId) -> usize {
        self.assignments.values().filter(|c| **c == client).count()
    }
}

impl FromIterator<(Resource, ClientId)> for Allocation {
    fn from_iter<I: IntoIterator<Item = (Resource, ClientId)>>(iter: I) -> Self {
        Self {
            assignments: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handoff
// ---------------------------------------------------------------------------

/// `Grant` (nobody -> client), `Transfer` (client -> other), `Release` (client -> nobody).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffKind {
    Grant,
    Transfer,
    Release,
}

/// One committed cell change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handoff {
    pub resource: Resource,
    pub from: Option<ClientId>,
    pub to: Option<ClientId>,
}

impl Handoff {
    /// `None` when `from == to`; such a cell is not a change.
    pub fn kind(&self) -> Option<HandoffKind> {
        match (self.from, self.to) {
            (None, Some(_)) => Some(HandoffKind::Grant),
            (Some(_), None) => Some(HandoffKind::Release),
            (Some(a), Some(b)) if a != b => Some(HandoffKind::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for Handoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |c: Option<ClientId>| c.map_or_else(|| "-".to_string(), |c| c.to_string());
        write!(f, "{}: {} -> {}", self.resource, side(self.from), side(self.to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_equality_is_by_id() {
        let a = Client::new(1).with_claims([Resource::new(2)]);
        let b = Client::new(1).with_priority(Priority::Low);
        assert_eq!(a, b);
        assert_ne!(a, Client::new(2));
    }

    #[test]
    fn display_matches_diagnostic_names() {
        assert_eq!(Resource::new(3).to_string(), "R3");
        assert_eq!(Client::new(7).to_string(), "S7");
    }

    #[test]
    fn default_priority_is_normal() {
        let client = Client::new(1);
        assert_eq!(client.priority, Priority::Normal);
        assert!(!client.is_low_priority());
        assert!(Priority::Low < Priority::Normal);
    }

    #[test]
    fn allocation_counts_held_resources() {
        let alloc: Allocation = [
            (Resource::new(1), ClientId(1)),
            (Resource::new(2), ClientId(1)),
            (Resource::new(3), ClientId(2)),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            alloc.sorted(),
            vec![
                (Resource::new(1), ClientId(1)),
                (Resource::new(2), ClientId(1)),
                (Resource::new(3), ClientId(2)),
            ]
        );
        assert_eq!(alloc.held_by(ClientId(1)), 2);
        assert_eq!(alloc.held_by(ClientId(9)), 0);
    }

    #[test]
    fn allocation_insert_replaces_holder() {
        let mut alloc = Allocation::new();
        assert_eq!(alloc.insert(Resource::new(1), ClientId(1)), None);
        assert_eq!(alloc.insert(Resource::new(1), ClientId(2)), Some(ClientId(1)));
        assert_eq!(alloc.len(), 1);
        assert_eq!(alloc.get(&Resource::new(1)), Some(ClientId(2)));
    }

    #[test]
    fn handoff_kinds() {
        let r = Resource::new(1);
        let cell = |from: Option<u64>, to: Option<u64>| Handoff {
            resource: r,
            from: from.map(ClientId),
            to: to.map(ClientId),
        };
        let grant = cell(None, Some(1));
        let transfer = cell(Some(1), Some(2));
        let release = cell(Some(2), None);
        let noop = cell(Some(2), Some(2));

        assert_eq!(grant.kind(), Some(HandoffKind::Grant));
        assert_eq!(transfer.kind(), Some(HandoffKind::Transfer));
        assert_eq!(release.kind(), Some(HandoffKind::Release));
        assert_eq!(noop.kind(), None);
        assert_eq!(transfer.to_string(), "R1: S1 -> S2");
        assert_eq!(release.to_string(), "R1: S2 -> -");
    }

    #[test]
    fn allocation_serializes_as_json_object() {
        let alloc: Allocation = [(Resource::new(4), ClientId(2))].into_iter().collect();
        let json = serde_json::to_string(&alloc).unwrap();
        assert_eq!(json, r#"{"4":2}"#);
    }
}
