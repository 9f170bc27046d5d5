//! Transport network topology
//!
//! A [`Topology`] is an undirected graph of locations partitioned into
//! regions. Each edge is stored with the orientation it was declared with:
//! the first endpoint is the *origin*, the second the *destination*. That
//! orientation fixes the sign convention of the incidence matrix
//!
//! ```text
//! A(j, e) = +1   if j is the origin of e
//!           -1   if j is the destination of e
//!            0   otherwise
//!
//! Apos = max(A, 0)      Aneg = max(-A, 0)
//! ```
//!
//! Flows on an edge are carried as a nonnegative pair: the *direct* flow
//! moves origin → destination, the *indirect* flow destination → origin.
//!
//! Node and edge indices are dense (`0..J`, `0..E`) and match insertion
//! order, so `NodeId(j)` is also the petgraph `NodeIndex` of node `j`.

use crate::error::{SgeError, SgeResult};
use crate::{EdgeId, NodeId, RegionId};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};

/// Node weight: a location and the region it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: NodeId,
    pub region: RegionId,
}

/// Edge weight: an oriented transport link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: EdgeId,
    pub origin: NodeId,
    pub destination: NodeId,
}

/// Validated transport network with a region partition.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: UnGraph<Location, Link>,
    edges: Vec<(usize, usize)>,
    regions: Vec<usize>,
    members: Vec<Vec<usize>>,
}

impl Topology {
    /// Start building a topology node by node.
    pub fn builder() -> TopologyBuilder {
        TopologyBuilder::default()
    }

    /// Build a topology from a region map (one entry per node) and an edge
    /// list of `(origin, destination)` pairs.
    pub fn from_parts(regions: Vec<usize>, edges: Vec<(usize, usize)>) -> SgeResult<Self> {
        let mut builder = TopologyBuilder::default();
        for region in regions {
            builder.add_node(RegionId::new(region));
        }
        for (a, b) in edges {
            builder.add_edge(NodeId::new(a), NodeId::new(b));
        }
        builder.build()
    }

    /// A path `0 - 1 - ... - (n-1)`, all nodes in region 0.
    pub fn line(n: usize) -> SgeResult<Self> {
        let edges = (1..n).map(|j| (j - 1, j)).collect();
        Self::from_parts(vec![0; n], edges)
    }

    /// A `width × height` lattice with 4-neighbour links, all nodes in
    /// region 0. Node `(x, y)` has index `y * width + x`.
    pub fn square_grid(width: usize, height: usize) -> SgeResult<Self> {
        let mut edges = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let j = y * width + x;
                if x + 1 < width {
                    edges.push((j, j + 1));
                }
                if y + 1 < height {
                    edges.push((j, j + width));
                }
            }
        }
        Self::from_parts(vec![0; width * height], edges)
    }

    /// Replace the region map, keeping the edges.
    pub fn with_regions(self, regions: Vec<usize>) -> SgeResult<Self> {
        if regions.len() != self.node_count() {
            return Err(SgeError::dimension(
                "region map",
                self.node_count(),
                regions.len(),
            ));
        }
        Self::from_parts(regions, self.edges)
    }

    /// Number of nodes (J).
    pub fn node_count(&self) -> usize {
        self.regions.len()
    }

    /// Number of edges (E).
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of regions (R).
    pub fn region_count(&self) -> usize {
        self.members.len()
    }

    /// `(origin, destination)` of every edge, in edge order.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn endpoints(&self, edge: usize) -> (usize, usize) {
        self.edges[edge]
    }

    /// Region index of every node, in node order.
    pub fn regions(&self) -> &[usize] {
        &self.regions
    }

    pub fn region_of(&self, node: usize) -> usize {
        self.regions[node]
    }

    /// Nodes belonging to region `r`, ascending.
    pub fn region_members(&self, region: usize) -> &[usize] {
        &self.members[region]
    }

    /// Underlying petgraph graph.
    pub fn graph(&self) -> &UnGraph<Location, Link> {
        &self.graph
    }

    /// True if every node can reach every other node.
    pub fn is_connected(&self) -> bool {
        connected_components(&self.graph) <= 1
    }

    /// Number of connected components (islands).
    pub fn component_count(&self) -> usize {
        connected_components(&self.graph)
    }

    /// Oriented incidence matrix A (J × E).
    pub fn incidence(&self) -> CsMat<f64> {
        self.incidence_with(|sign| sign)
    }

    /// Positive part of A: 1 at the origin of each edge.
    pub fn incidence_pos(&self) -> CsMat<f64> {
        self.incidence_with(|sign| sign.max(0.0))
    }

    /// Negative part of A: 1 at the destination of each edge.
    pub fn incidence_neg(&self) -> CsMat<f64> {
        self.incidence_with(|sign| (-sign).max(0.0))
    }

    fn incidence_with(&self, map: impl Fn(f64) -> f64) -> CsMat<f64> {
        let mut tri = TriMat::new((self.node_count(), self.edge_count()));
        for (e, &(origin, destination)) in self.edges.iter().enumerate() {
            for (node, sign) in [(origin, 1.0), (destination, -1.0)] {
                let value = map(sign);
                if value != 0.0 {
                    tri.add_triplet(node, e, value);
                }
            }
        }
        tri.to_csr()
    }
}

/// Incremental topology construction. Validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct TopologyBuilder {
    regions: Vec<usize>,
    edges: Vec<(usize, usize)>,
}

impl TopologyBuilder {
    pub fn add_node(&mut self, region: RegionId) -> NodeId {
        self.regions.push(region.value());
        NodeId::new(self.regions.len() - 1)
    }

    /// Add an edge oriented `origin → destination`.
    pub fn add_edge(&mut self, origin: NodeId, destination: NodeId) -> EdgeId {
        self.edges.push((origin.value(), destination.value()));
        EdgeId::new(self.edges.len() - 1)
    }

    pub fn build(self) -> SgeResult<Topology> {
        let n_nodes = self.regions.len();
        if n_nodes == 0 {
            return Err(SgeError::Topology("topology has no nodes".into()));
        }

        for (e, &(a, b)) in self.edges.iter().enumerate() {
            if a >= n_nodes || b >= n_nodes {
                return Err(SgeError::Topology(format!(
                    "edge {} references node {} but only {} nodes exist",
                    e,
                    a.max(b),
                    n_nodes
                )));
            }
            if a == b {
                return Err(SgeError::Topology(format!(
                    "edge {} is a self-loop at node {}",
                    e, a
                )));
            }
        }

        // Region ids must be 0..R with no gaps
        let n_regions = self.regions.iter().copied().max().map_or(0, |r| r + 1);
        let mut members = vec![Vec::new(); n_regions];
        for (j, &r) in self.regions.iter().enumerate() {
            members[r].push(j);
        }
        if let Some(empty) = members.iter().position(|m| m.is_empty()) {
            return Err(SgeError::Topology(format!(
                "region {} has no nodes (region ids must be contiguous from 0)",
                empty
            )));
        }

        let mut graph = UnGraph::with_capacity(n_nodes, self.edges.len());
        for (j, &r) in self.regions.iter().enumerate() {
            graph.add_node(Location {
                id: NodeId::new(j),
                region: RegionId::new(r),
            });
        }
        for (e, &(a, b)) in self.edges.iter().enumerate() {
            graph.add_edge(
                NodeIndex::new(a),
                NodeIndex::new(b),
                Link {
                    id: EdgeId::new(e),
                    origin: NodeId::new(a),
                    destination: NodeId::new(b),
                },
            );
        }

        Ok(Topology {
            graph,
            edges: self.edges,
            regions: self.regions,
            members,
        })
    }
}

/// Serializable topology description used in scenario files.
///
/// ```toml
/// [topology]
/// kind = "custom"
/// regions = [0, 1]
/// edges = [[0, 1]]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    Custom {
        regions: Vec<usize>,
        #[serde(default)]
        edges: Vec<(usize, usize)>,
    },
    Line {
        nodes: usize,
        #[serde(default)]
        regions: Option<Vec<usize>>,
    },
    Square {
        width: usize,
        height: usize,
        #[serde(default)]
        regions: Option<Vec<usize>>,
    },
}

impl TopologySpec {
    pub fn build(&self) -> SgeResult<Topology> {
        match self {
            TopologySpec::Custom { regions, edges } => {
                Topology::from_parts(regions.clone(), edges.clone())
            }
            TopologySpec::Line { nodes, regions } => {
                let topo = Topology::line(*nodes)?;
                match regions {
                    Some(r) => topo.with_regions(r.clone()),
                    None => Ok(topo),
                }
            }
            TopologySpec::Square {
                width,
                height,
                regions,
            } => {
                let topo = Topology::square_grid(*width, *height)?;
                match regions {
                    Some(r) => topo.with_regions(r.clone()),
                    None => Ok(topo),
                }
            }
        }
    }
}
