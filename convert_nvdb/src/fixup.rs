//! Topology fix-up: clipping near a junction or sloppy source data can leave segments shorter
//! than the node-matching tolerance. Each one gets absorbed into a neighbor from the same
//! sequence, so way assembly never sees them.

use crate::network::{polyline_length, NodeId, RoadNetwork, SegmentId};
use crate::NODE_MARGIN;

/// Absorbs degenerate short segments until a pass finds nothing left to do.
pub fn fix_topology(network: &mut RoadNetwork) {
    let mut total = 0;
    // Each absorption removes a segment, so this terminates
    for _ in 0..network.segments.len() {
        let removed = absorb_short_segments(network);
        total += removed;
        if removed == 0 {
            break;
        }
    }
    if total > 0 {
        info!("Absorbed {} degenerate short segments", total);
    }
}

/// One absorption pass. Returns how many segments went away.
fn absorb_short_segments(network: &mut RoadNetwork) -> usize {
    let short: Vec<SegmentId> = network
        .segments
        .values()
        .filter(|s| s.length <= NODE_MARGIN && s.start_node != s.end_node)
        .map(|s| s.id)
        .collect();

    let mut removed = 0;
    for id in short {
        if !network.segments.contains_key(&id) {
            continue;
        }
        if let Some((neighbor, shared)) = find_neighbor(network, id) {
            absorb(network, id, neighbor, shared);
            removed += 1;
        }
    }
    removed
}

/// A short segment can only be absorbed at a degree-2 node whose other segment belongs to the
/// same sequence.
fn find_neighbor(network: &RoadNetwork, id: SegmentId) -> Option<(SegmentId, NodeId)> {
    let segment = &network.segments[&id];
    for node_id in [segment.start_node, segment.end_node] {
        let node = &network.nodes[&node_id];
        if node.segments.len() != 2 {
            continue;
        }
        let neighbor = *node.segments.iter().find(|s| **s != id)?;
        let other = &network.segments[&neighbor];
        if other.sequence_id == segment.sequence_id && other.parent_id == segment.parent_id {
            return Some((neighbor, node_id));
        }
    }
    None
}

/// Extends `neighbor` across `short`, then deletes `short` and the now-interior shared node.
fn absorb(network: &mut RoadNetwork, short: SegmentId, neighbor: SegmentId, shared: NodeId) {
    let short_seg = network.segments[&short].clone();
    let far = short_seg.other_endpoint(shared);

    let other = network.segments.get_mut(&neighbor).unwrap();
    // Splice the short geometry on, skipping the duplicated shared coordinate and reversing the
    // short side when its digitized direction points the other way
    if other.end_node == shared {
        if short_seg.start_node == shared {
            other.geometry.extend(short_seg.geometry[1..].iter().cloned());
        } else {
            other.geometry.extend(
                short_seg.geometry[..short_seg.geometry.len() - 1]
                    .iter()
                    .rev()
                    .cloned(),
            );
        }
        other.end_node = far;
    } else {
        let mut spliced = if short_seg.end_node == shared {
            short_seg.geometry[..short_seg.geometry.len() - 1].to_vec()
        } else {
            let mut v = short_seg.geometry[1..].to_vec();
            v.reverse();
            v
        };
        spliced.extend(other.geometry.iter().cloned());
        other.geometry = spliced;
        other.start_node = far;
    }
    other.parent_start = other.parent_start.min(short_seg.parent_start);
    other.parent_end = other.parent_end.max(short_seg.parent_end);
    other.sequence_start = other.sequence_start.min(short_seg.sequence_start);
    other.sequence_end = other.sequence_end.max(short_seg.sequence_end);
    other.length = polyline_length(&other.geometry);

    // Attach the neighbor to the far node before removal, so that node survives
    network
        .nodes
        .get_mut(&far)
        .unwrap()
        .segments
        .insert(neighbor);
    network.remove_segment(short);
    network.nodes.remove(&shared);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::tests::straight_segment;
    use crate::network::{Point, Segment};
    use crate::records::LinkClass;
    use crate::tags::Tags;
    use geom::LonLat;

    /// A stub segment short enough to be absorbed, continuing eastward from `lon0`.
    fn short_segment(
        network: &mut RoadNetwork,
        id: SegmentId,
        start_node: NodeId,
        end_node: NodeId,
        lon0: f64,
        parent_id: i64,
        parent_start: f64,
        parent_end: f64,
    ) {
        let pts = vec![
            Point::new(LonLat::new(lon0, 60.0)),
            Point::new(LonLat::new(lon0 + 0.000005, 60.0)),
        ];
        let length = polyline_length(&pts);
        let first = pts[0].pt;
        let last = pts[1].pt;
        network.insert_segment(Segment {
            id,
            geometry: pts,
            start_node,
            end_node,
            sequence_id: parent_id,
            sequence_start: parent_start,
            sequence_end: parent_end,
            parent_id,
            parent_start,
            parent_end,
            length,
            reverse: false,
            connection: false,
            class: LinkClass::Carriageway,
            tags: Tags::new(),
        });
        network.create_node(Some(start_node), first, [id].into_iter().collect());
        network.create_node(Some(end_node), last, [id].into_iter().collect());
    }

    #[test]
    fn short_segment_absorbed() {
        let mut network = RoadNetwork::new();
        // A normal segment [0, 0.9] followed by a ~0.3m stub [0.9, 1.0] in the same sequence
        straight_segment(&mut network, 1, 100, 101, 10.0, 5, 7, 0.0, 0.9);
        short_segment(&mut network, 2, 101, 102, 10.0004, 7, 0.9, 1.0);

        fix_topology(&mut network);

        assert!(!network.segments.contains_key(&2));
        assert!(!network.nodes.contains_key(&101));
        let merged = &network.segments[&1];
        assert_eq!(merged.parent_start, 0.0);
        assert_eq!(merged.parent_end, 1.0);
        assert_eq!(merged.end_node, 102);
        assert!(network.nodes[&102].segments.contains(&1));
        assert_eq!(network.segments_by_parent(7), vec![1]);
    }

    #[test]
    fn junction_stub_kept() {
        let mut network = RoadNetwork::new();
        straight_segment(&mut network, 1, 100, 101, 10.0, 5, 7, 0.0, 0.9);
        short_segment(&mut network, 2, 101, 102, 10.0004, 7, 0.9, 1.0);
        // A third segment at the shared node makes it degree 3
        straight_segment(&mut network, 3, 101, 103, 10.0004, 3, 8, 0.0, 1.0);
        // And the far node leads into a different sequence
        straight_segment(&mut network, 4, 102, 104, 10.000405, 3, 9, 0.0, 1.0);

        fix_topology(&mut network);
        assert!(network.segments.contains_key(&2));
    }

    #[test]
    fn reversed_stub_absorbed() {
        let mut network = RoadNetwork::new();
        straight_segment(&mut network, 1, 100, 101, 10.0, 5, 7, 0.0, 0.9);
        // Digitized pointing backwards: runs from the far node into the shared one
        let pts = vec![
            Point::new(LonLat::new(10.000405, 60.0)),
            Point::new(LonLat::new(10.0004, 60.0)),
        ];
        let length = polyline_length(&pts);
        let first = pts[0].pt;
        let last = pts[1].pt;
        network.insert_segment(Segment {
            id: 2,
            geometry: pts,
            start_node: 102,
            end_node: 101,
            sequence_id: 7,
            sequence_start: 0.9,
            sequence_end: 1.0,
            parent_id: 7,
            parent_start: 0.9,
            parent_end: 1.0,
            length,
            reverse: false,
            connection: false,
            class: LinkClass::Carriageway,
            tags: Tags::new(),
        });
        network.create_node(Some(102), first, [2].into_iter().collect());
        network.create_node(Some(101), last, [2].into_iter().collect());

        fix_topology(&mut network);
        assert!(!network.segments.contains_key(&2));
        let merged = &network.segments[&1];
        assert_eq!(merged.end_node, 102);
        assert_eq!(merged.parent_end, 1.0);
    }
}
