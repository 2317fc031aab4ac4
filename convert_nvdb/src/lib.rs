//! Converts a feed of linearly-referenced NVDB road links and attribute records into an
//! OSM-ready road network: connected, minimally-fragmented ways with uniform tag sets.
//!
//! The pipeline runs single-threaded, in feed order: ingest links, overlay attributes (clipping
//! segments where coverage is partial), absorb degenerate stubs, simplify geometry, resolve turn
//! restrictions, then assemble ways.

#[macro_use]
extern crate log;

pub mod fixup;
pub mod ingest;
pub mod network;
pub mod osm;
pub mod overlay;
pub mod reader;
pub mod records;
pub mod restrictions;
pub mod simplify;
pub mod tags;
pub mod ways;

use geom::Distance;

pub use crate::network::RoadNetwork;
pub use crate::records::Feed;
pub use crate::restrictions::TurnRestriction;
pub use crate::ways::Way;

/// Tolerance for matching a line attribute's coverage against a segment's linear range.
pub const SEGMENT_MARGIN: Distance = Distance::const_meters(2.0);
/// Tighter tolerance for node-level matching: short-segment absorption and tunnel/bridge
/// continuation.
pub const NODE_MARGIN: Distance = Distance::const_meters(1.0);
/// How far a point attribute may snap to an existing geometry point.
pub const POINT_MARGIN: Distance = Distance::const_meters(2.0);
/// Maximum bearing change, in degrees, for two segments to still read as one road.
pub const ANGLE_MARGIN: f64 = 45.0;
/// Hop bound for the turn-restriction route search.
pub const MAX_TRAVEL_DEPTH: usize = 10;
/// Distance bound for the turn-restriction route search.
pub const MAX_TRAVEL_DISTANCE: Distance = Distance::const_meters(200.0);

/// Runs the whole pipeline over one decoded feed.
pub fn convert(
    feed: &Feed,
    simplify_epsilon: Distance,
) -> (RoadNetwork, Vec<Way>, Vec<TurnRestriction>) {
    let mut network = RoadNetwork::new();

    let mut kept = 0;
    for link in &feed.links {
        if ingest::add_link(&mut network, link) {
            kept += 1;
        }
    }
    info!("Ingested {} of {} links", kept, feed.links.len());

    for record in &feed.attributes {
        overlay::apply_attribute(&mut network, record);
    }

    fixup::fix_topology(&mut network);
    simplify::simplify_network(&mut network, simplify_epsilon);

    // Restrictions run before way assembly; their via nodes force breaks
    let restrictions = restrictions::resolve_restrictions(&mut network, &feed.restrictions);
    let ways = ways::assemble_ways(&mut network);

    (network, ways, restrictions)
}
