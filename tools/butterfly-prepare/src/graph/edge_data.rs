//! Edge payloads for the preprocessing graph and the query graph

use crate::types::{EdgeWeight, NameId, TravelMode, INVALID_EDGE_WEIGHT, INVALID_NAMEID};

/// Bit-packed per-edge flags
///
/// Bit positions are fixed because the query graph snapshot stores them
/// verbatim in its edge records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EdgeFlags(u32);

impl EdgeFlags {
    pub const FORWARD: u32 = 1 << 0;
    pub const BACKWARD: u32 = 1 << 1;
    pub const SHORTCUT: u32 = 1 << 2;
    pub const ROUNDABOUT: u32 = 1 << 3;
    pub const ACCESS_RESTRICTED: u32 = 1 << 4;
    pub const IGNORE_IN_GRID: u32 = 1 << 5;
    pub const IN_TINY_COMPONENT: u32 = 1 << 6;

    pub const fn empty() -> Self {
        EdgeFlags(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        EdgeFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    pub fn set(&mut self, bit: u32, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    #[inline]
    pub fn with(mut self, bit: u32, value: bool) -> Self {
        self.set(bit, value);
        self
    }

    #[inline]
    pub fn forward(self) -> bool {
        self.contains(Self::FORWARD)
    }

    #[inline]
    pub fn backward(self) -> bool {
        self.contains(Self::BACKWARD)
    }

    #[inline]
    pub fn shortcut(self) -> bool {
        self.contains(Self::SHORTCUT)
    }

    #[inline]
    pub fn roundabout(self) -> bool {
        self.contains(Self::ROUNDABOUT)
    }

    #[inline]
    pub fn access_restricted(self) -> bool {
        self.contains(Self::ACCESS_RESTRICTED)
    }

    #[inline]
    pub fn in_tiny_component(self) -> bool {
        self.contains(Self::IN_TINY_COMPONENT)
    }

    /// Same flags with forward and backward exchanged
    pub fn reversed(self) -> Self {
        let fwd = self.forward();
        let bwd = self.backward();
        self.with(Self::FORWARD, bwd).with(Self::BACKWARD, fwd)
    }
}

/// Access to the fields the graph containers need from an edge payload
pub trait EdgeDataExt: Copy {
    fn weight(&self) -> EdgeWeight;
    fn is_forward(&self) -> bool;
}

/// Edge payload of the node-based (preprocessing) graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeBasedEdgeData {
    pub distance: EdgeWeight,
    pub name_id: NameId,
    pub travel_mode: TravelMode,
    pub flags: EdgeFlags,
}

impl Default for NodeBasedEdgeData {
    fn default() -> Self {
        Self {
            distance: INVALID_EDGE_WEIGHT,
            name_id: INVALID_NAMEID,
            travel_mode: TravelMode::INACCESSIBLE,
            flags: EdgeFlags::empty(),
        }
    }
}

impl NodeBasedEdgeData {
    /// Two segments can be merged into one when they only differ in length
    pub fn is_compatible_to(&self, other: &NodeBasedEdgeData) -> bool {
        const MERGE_RELEVANT: u32 = EdgeFlags::FORWARD
            | EdgeFlags::BACKWARD
            | EdgeFlags::ROUNDABOUT
            | EdgeFlags::ACCESS_RESTRICTED;

        self.name_id == other.name_id
            && self.travel_mode == other.travel_mode
            && (self.flags.bits() & MERGE_RELEVANT) == (other.flags.bits() & MERGE_RELEVANT)
    }
}

impl EdgeDataExt for NodeBasedEdgeData {
    #[inline]
    fn weight(&self) -> EdgeWeight {
        self.distance
    }

    #[inline]
    fn is_forward(&self) -> bool {
        self.flags.forward()
    }
}

/// Edge payload of the static query graph.
///
/// Layout (native byte order, 12 bytes, no padding):
///   distance: i32
///   id:       u32  // road name, or middle node for shortcuts
///   flags:    u32  // `EdgeFlags` bits
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryEdgeData {
    pub distance: EdgeWeight,
    pub id: u32,
    pub flags: EdgeFlags,
}

impl From<NodeBasedEdgeData> for QueryEdgeData {
    fn from(data: NodeBasedEdgeData) -> Self {
        Self {
            distance: data.distance,
            id: data.name_id,
            flags: data.flags,
        }
    }
}

impl EdgeDataExt for QueryEdgeData {
    #[inline]
    fn weight(&self) -> EdgeWeight {
        self.distance
    }

    #[inline]
    fn is_forward(&self) -> bool {
        self.flags.forward()
    }
}
