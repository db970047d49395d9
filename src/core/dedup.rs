use crate::domain::model::{Fingerprint, ProxyNode};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub nodes: Vec<ProxyNode>,
    pub considered: usize,
    pub removed: usize,
}

/// First-write-wins over the scan order: the first node seen with a fingerprint is kept,
/// later ones are dropped whatever their display name.
pub struct Deduplicator;

impl Deduplicator {
    pub fn dedup(nodes: Vec<ProxyNode>) -> DedupOutcome {
        let considered = nodes.len();
        let mut seen: HashSet<Fingerprint> = HashSet::with_capacity(considered);
        let mut kept = Vec::with_capacity(considered);

        for node in nodes {
            let fingerprint = node.fingerprint();
            if seen.insert(fingerprint) {
                kept.push(node);
            } else {
                tracing::debug!(
                    "Duplicate {} ({}) dropped",
                    node.fingerprint(),
                    node.display_name
                );
            }
        }

        DedupOutcome {
            removed: considered - kept.len(),
            considered,
            nodes: kept,
        }
    }
}
