//! Decision-vector and constraint-vector layout
//!
//! ```text
//! x = [ ur (R) | Cj (J) | Djn (J·N) | Qdirect (E·N) | Qindirect (E·N) | Lj (J) ]
//!
//!   Djn      index j + n·J     (column-major by good)
//!   Q*       index e + n·E
//!
//! g = [ utility (J) | availability (J) | flow (J·N) | labor (R) ]
//!
//!   flow     row 2J + j + n·J
//! ```
//!
//! All offsets are computed once; every other module indexes through these
//! accessors so the layout lives in exactly one place.

use serde::{Deserialize, Serialize};
pub use sge_core::Floors;
use std::ops::Range;

/// Offsets of the six variable blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableLayout {
    pub n_regions: usize,
    pub n_nodes: usize,
    pub n_goods: usize,
    pub n_edges: usize,

    pub ur_offset: usize,
    pub cj_offset: usize,
    pub djn_offset: usize,
    pub q_direct_offset: usize,
    pub q_indirect_offset: usize,
    pub lj_offset: usize,
    pub n_var: usize,
}

impl VariableLayout {
    pub fn new(n_regions: usize, n_nodes: usize, n_goods: usize, n_edges: usize) -> Self {
        let ur_offset = 0;
        let cj_offset = ur_offset + n_regions;
        let djn_offset = cj_offset + n_nodes;
        let q_direct_offset = djn_offset + n_nodes * n_goods;
        let q_indirect_offset = q_direct_offset + n_edges * n_goods;
        let lj_offset = q_indirect_offset + n_edges * n_goods;
        let n_var = lj_offset + n_nodes;

        Self {
            n_regions,
            n_nodes,
            n_goods,
            n_edges,
            ur_offset,
            cj_offset,
            djn_offset,
            q_direct_offset,
            q_indirect_offset,
            lj_offset,
            n_var,
        }
    }

    #[inline]
    pub fn ur(&self, region: usize) -> usize {
        self.ur_offset + region
    }

    #[inline]
    pub fn cj(&self, node: usize) -> usize {
        self.cj_offset + node
    }

    #[inline]
    pub fn djn(&self, node: usize, good: usize) -> usize {
        self.djn_offset + node + good * self.n_nodes
    }

    #[inline]
    pub fn q_direct(&self, edge: usize, good: usize) -> usize {
        self.q_direct_offset + edge + good * self.n_edges
    }

    #[inline]
    pub fn q_indirect(&self, edge: usize, good: usize) -> usize {
        self.q_indirect_offset + edge + good * self.n_edges
    }

    #[inline]
    pub fn lj(&self, node: usize) -> usize {
        self.lj_offset + node
    }

    pub fn ur_range(&self) -> Range<usize> {
        self.ur_offset..self.cj_offset
    }

    pub fn cj_range(&self) -> Range<usize> {
        self.cj_offset..self.djn_offset
    }

    pub fn djn_range(&self) -> Range<usize> {
        self.djn_offset..self.q_direct_offset
    }

    pub fn q_direct_range(&self) -> Range<usize> {
        self.q_direct_offset..self.q_indirect_offset
    }

    pub fn q_indirect_range(&self) -> Range<usize> {
        self.q_indirect_offset..self.lj_offset
    }

    pub fn lj_range(&self) -> Range<usize> {
        self.lj_offset..self.n_var
    }

    /// Variable bounds `(lb, ub)`. Utility is free; every other block is
    /// bounded below by its floor. Nothing is bounded above.
    pub fn bounds(&self, floors: &Floors) -> (Vec<f64>, Vec<f64>) {
        let mut lb = vec![f64::NEG_INFINITY; self.n_var];
        let ub = vec![f64::INFINITY; self.n_var];

        lb[self.cj_range()].fill(floors.consumption);
        lb[self.djn_range()].fill(floors.consumption);
        lb[self.q_direct_range()].fill(floors.flow);
        lb[self.q_indirect_range()].fill(floors.flow);
        lb[self.lj_range()].fill(floors.population);

        (lb, ub)
    }

    /// Named read-only view of a trial point.
    pub fn view<'x>(&self, x: &'x [f64]) -> AllocationView<'x> {
        AllocationView {
            ur: &x[self.ur_range()],
            cj: &x[self.cj_range()],
            djn: &x[self.djn_range()],
            q_direct: &x[self.q_direct_range()],
            q_indirect: &x[self.q_indirect_range()],
            lj: &x[self.lj_range()],
            n_nodes: self.n_nodes,
            n_edges: self.n_edges,
        }
    }
}

/// Borrowed slices of one trial point, block by block.
#[derive(Debug, Clone, Copy)]
pub struct AllocationView<'x> {
    pub ur: &'x [f64],
    pub cj: &'x [f64],
    pub djn: &'x [f64],
    pub q_direct: &'x [f64],
    pub q_indirect: &'x [f64],
    pub lj: &'x [f64],
    n_nodes: usize,
    n_edges: usize,
}

impl<'x> AllocationView<'x> {
    #[inline]
    pub fn djn(&self, node: usize, good: usize) -> f64 {
        self.djn[node + good * self.n_nodes]
    }

    #[inline]
    pub fn q_direct(&self, edge: usize, good: usize) -> f64 {
        self.q_direct[edge + good * self.n_edges]
    }

    #[inline]
    pub fn q_indirect(&self, edge: usize, good: usize) -> f64 {
        self.q_indirect[edge + good * self.n_edges]
    }
}

/// Offsets of the four constraint families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintLayout {
    pub n_nodes: usize,
    pub utility_offset: usize,
    pub availability_offset: usize,
    pub flow_offset: usize,
    pub labor_offset: usize,
    pub n_con: usize,
}

impl ConstraintLayout {
    pub fn new(n_regions: usize, n_nodes: usize, n_goods: usize) -> Self {
        let utility_offset = 0;
        let availability_offset = n_nodes;
        let flow_offset = 2 * n_nodes;
        let labor_offset = flow_offset + n_nodes * n_goods;
        Self {
            n_nodes,
            utility_offset,
            availability_offset,
            flow_offset,
            labor_offset,
            n_con: labor_offset + n_regions,
        }
    }

    #[inline]
    pub fn utility(&self, node: usize) -> usize {
        self.utility_offset + node
    }

    #[inline]
    pub fn availability(&self, node: usize) -> usize {
        self.availability_offset + node
    }

    #[inline]
    pub fn flow(&self, node: usize, good: usize) -> usize {
        self.flow_offset + node + good * self.n_nodes
    }

    #[inline]
    pub fn labor(&self, region: usize) -> usize {
        self.labor_offset + region
    }

    /// Family and local index of a constraint row.
    pub fn classify(&self, row: usize) -> (ConstraintFamily, usize) {
        if row < self.availability_offset {
            (ConstraintFamily::Utility, row - self.utility_offset)
        } else if row < self.flow_offset {
            (ConstraintFamily::Availability, row - self.availability_offset)
        } else if row < self.labor_offset {
            (ConstraintFamily::Flow, row - self.flow_offset)
        } else {
            (ConstraintFamily::Labor, row - self.labor_offset)
        }
    }
}

/// The four equality families, in stacking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintFamily {
    Utility,
    Availability,
    Flow,
    Labor,
}

impl std::fmt::Display for ConstraintFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConstraintFamily::Utility => "utility",
            ConstraintFamily::Availability => "availability",
            ConstraintFamily::Flow => "flow",
            ConstraintFamily::Labor => "labor",
        };
        f.write_str(name)
    }
}
