//! Turns raw link records into segments and endpoint nodes. Tag derivation is delegated; this
//! just records the result and the linear-reference metadata.

use geom::LonLat;

use crate::network::{polyline_length, Point, RoadNetwork, Segment};
use crate::records::LinkRecord;
use crate::tags::derive_link_tags;

/// Registers one link. Returns false (with a diagnostic) for degenerate records.
pub fn add_link(network: &mut RoadNetwork, record: &LinkRecord) -> bool {
    if record.geometry.len() < 2 {
        warn!(
            "Link {} has only {} geometry points, dropping",
            record.id,
            record.geometry.len()
        );
        return false;
    }

    let geometry: Vec<Point> = record
        .geometry
        .iter()
        .map(|(lon, lat)| Point::new(LonLat::new(*lon, *lat)))
        .collect();
    let length = polyline_length(&geometry);
    if length == geom::Distance::ZERO {
        warn!("Link {} has zero length, dropping", record.id);
        return false;
    }

    let (tags, reverse) = derive_link_tags(record);

    // Without a super-sequence, the parent reference is just the raw sequence
    let parent_id = record.parent_id.unwrap_or(record.sequence_id);
    let parent_start = record.parent_start.unwrap_or(record.sequence_start);
    let parent_end = record.parent_end.unwrap_or(record.sequence_end);

    let first = geometry[0].pt;
    let last = geometry[geometry.len() - 1].pt;

    network.insert_segment(Segment {
        id: record.id,
        geometry,
        start_node: record.start_node,
        end_node: record.end_node,
        sequence_id: record.sequence_id,
        sequence_start: record.sequence_start,
        sequence_end: record.sequence_end,
        parent_id,
        parent_start,
        parent_end,
        length,
        reverse,
        connection: record.connection,
        class: record.class,
        tags,
    });

    network.create_node(
        Some(record.start_node),
        first,
        [record.id].into_iter().collect(),
    );
    network.create_node(
        Some(record.end_node),
        last,
        [record.id].into_iter().collect(),
    );
    true
}
