//! Identifier types and sentinels shared by every preprocessing stage
//!
//! Node and edge identifiers are dense `u32` indices. The maximum value of each
//! type is reserved as the "absent" sentinel and only ever appears inside
//! fixed-width records or dummy edge slots. Public lookups hand out `Option`.

/// Dense node identifier (index into node arrays)
pub type NodeId = u32;

/// Dense edge identifier (index into edge arrays)
pub type EdgeId = u32;

/// Edge weight in deciseconds. Always positive once ingested.
pub type EdgeWeight = i32;

/// Road name identifier
pub type NameId = u32;

/// Sentinel for "no node"
pub const SPECIAL_NODEID: NodeId = NodeId::MAX;

/// Sentinel for "no edge"
pub const SPECIAL_EDGEID: EdgeId = EdgeId::MAX;

/// Sentinel for "unreachable / invalid weight"
pub const INVALID_EDGE_WEIGHT: EdgeWeight = EdgeWeight::MAX;

/// Sentinel for "no road name"
pub const INVALID_NAMEID: NameId = NameId::MAX;

/// Convert a raw record value into an optional node id
#[inline]
pub fn node_from_raw(raw: u32) -> Option<NodeId> {
    (raw != SPECIAL_NODEID).then_some(raw)
}

/// Travel mode byte carried by every road segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TravelMode(pub u8);

impl TravelMode {
    pub const INACCESSIBLE: TravelMode = TravelMode(0);
    pub const DEFAULT: TravelMode = TravelMode(1);
}

/// Fixed-point coordinate of a node (1e-6 degrees)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coordinate {
    pub lat: i32,
    pub lon: i32,
}

/// Fixed-point precision of `Coordinate`
pub const COORDINATE_PRECISION: f64 = 1_000_000.0;

const EARTH_RADIUS_M: f64 = 6_372_797.560856;

impl Coordinate {
    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    /// Equirectangular approximation of the distance in meters.
    ///
    /// Good enough for network-length statistics; not used for routing.
    pub fn approximate_distance(&self, other: &Coordinate) -> f64 {
        let lat1 = (self.lat as f64 / COORDINATE_PRECISION).to_radians();
        let lon1 = (self.lon as f64 / COORDINATE_PRECISION).to_radians();
        let lat2 = (other.lat as f64 / COORDINATE_PRECISION).to_radians();
        let lon2 = (other.lon as f64 / COORDINATE_PRECISION).to_radians();

        let x = (lon2 - lon1) * ((lat1 + lat2) / 2.0).cos();
        let y = lat2 - lat1;
        (x * x + y * y).sqrt() * EARTH_RADIUS_M
    }
}
