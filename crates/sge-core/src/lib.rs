//! # sge-core: Spatial Economy Modeling Core
//!
//! Data structures shared by the allocation solver and the command line:
//! the transport network, the economic parameters defined on it, and the
//! error type used while building them.
//!
//! ## Design Philosophy
//!
//! A spatial economy is modeled as an **undirected graph** where:
//! - **Nodes**: locations that produce, trade and consume, each inside one region
//! - **Edges**: transport links, stored with a declared orientation
//!
//! Everything in this crate is validated once at construction and immutable
//! afterwards, so downstream code can index freely without re-checking.
//!
//! ## Quick Start
//!
//! ```rust
//! use sge_core::{ModelParams, Topology};
//!
//! // Two cities in two regions, one link between them
//! let topology = Topology::from_parts(vec![0, 1], vec![(0, 1)]).unwrap();
//!
//! // One good; the first city is twice as productive
//! let params = ModelParams::new(vec![vec![2.0], vec![1.0]], vec![1.0, 1.0])
//!     .resolve(&topology)
//!     .unwrap();
//!
//! assert_eq!(params.n_goods(), 1);
//! assert_eq!(topology.incidence().get(0, 0), Some(&1.0));
//! ```
//!
//! ## Modules
//!
//! - [`topology`] - graph, region partition and incidence matrices
//! - [`params`] - elasticities, productivities, capacities
//! - [`scenario`] - serializable scenario description and variable floors
//! - [`error`] - [`SgeError`] and [`SgeResult`]

use serde::{Deserialize, Serialize};

pub mod error;
pub mod params;
pub mod scenario;
pub mod topology;

pub use error::{SgeError, SgeResult};
pub use params::{kappa_from_infrastructure, ModelParams};
pub use scenario::{Floors, Scenario};
pub use topology::{Link, Location, Topology, TopologyBuilder, TopologySpec};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(usize);

impl NodeId {
    #[inline]
    pub fn new(value: usize) -> Self {
        NodeId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl EdgeId {
    #[inline]
    pub fn new(value: usize) -> Self {
        EdgeId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl RegionId {
    #[inline]
    pub fn new(value: usize) -> Self {
        RegionId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&NodeId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: RegionId = serde_json::from_str("3").unwrap();
        assert_eq!(back.value(), 3);
    }
}
