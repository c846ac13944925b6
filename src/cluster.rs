//! Cluster membership lookup: leader address and server list. The gateway
//! treats these as opaque `"host:port"` strings; it never parses them.

use auto_impl::auto_impl;

/// A single-method-per-concern seam, in the style of this crate's other
/// small trait objects: implementors decide how leader/membership state is
/// tracked (consensus log, static config, test fixture) and the gateway
/// only ever calls through the trait.
#[auto_impl(&, Box, Arc)]
pub trait ClusterInfo: Send + Sync {
    fn leader(&self) -> Option<String>;
    fn servers(&self) -> Vec<String>;
}

/// A fixed leader and server list, sufficient for a single-node deployment
/// or for tests that don't exercise real membership changes.
#[derive(Debug, Clone)]
pub struct StaticCluster {
    leader: Option<String>,
    servers: Vec<String>,
}

impl StaticCluster {
    pub fn new(leader: Option<String>, servers: Vec<String>) -> Self {
        Self { leader, servers }
    }

    pub fn single_node(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            leader: Some(address.clone()),
            servers: vec![address],
        }
    }
}

impl ClusterInfo for StaticCluster {
    fn leader(&self) -> Option<String> {
        self.leader.clone()
    }

    fn servers(&self) -> Vec<String> {
        self.servers.clone()
    }
}
