//! Collects terminal host outcomes into the final, ordered inventory.
use itertools::Itertools;
use log::debug;

use crate::node::{HostState, Node, ScanResult, Tally};

/// Which terminal states make it into the inventory.
///   - verified-only keeps hosts that confirmed fleet membership.
///   - include-failed also keeps hosts that matched the filter but failed to
///     authenticate or verify, tagged with their state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportPolicy {
    #[default]
    VerifiedOnly,
    IncludeFailed,
}

impl ReportPolicy {
    pub const fn retains(self, state: HostState) -> bool {
        match state {
            HostState::Verified => true,
            HostState::AuthFailed | HostState::VerifyFailed => {
                matches!(self, Self::IncludeFailed)
            }
            HostState::Unreachable | HostState::ExcludedByFilter | HostState::Cancelled => false,
        }
    }
}

/// The single consumer of worker results.
#[derive(Debug, Default)]
pub struct Aggregator {
    policy: ReportPolicy,
    nodes: Vec<Node>,
    tally: Tally,
}

impl Aggregator {
    pub fn new(policy: ReportPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn push(&mut self, node: Node) {
        self.tally.record(node.state);
        if self.policy.retains(node.state) {
            self.nodes.push(node);
        } else {
            debug!("Dropping {} ({})", node.address, node.state);
        }
    }

    /// Orders nodes by ascending address so identical inputs always give
    /// identical output, whatever order the workers finished in.
    pub fn finish(self) -> ScanResult {
        let nodes = self
            .nodes
            .into_iter()
            .sorted_by_key(|node| node.address)
            .dedup_by(|a, b| a.address == b.address)
            .collect();

        ScanResult {
            nodes,
            tally: self.tally,
        }
    }
}

impl Extend<Node> for Aggregator {
    fn extend<T: IntoIterator<Item = Node>>(&mut self, iter: T) {
        for node in iter {
            self.push(node);
        }
    }
}
