//! The linear-reference overlay engine: merges attribute records onto the sub-ranges of segments
//! they actually cover, clipping segments when a record only partially covers one.
//!
//! Iteration is always over a snapshot of a parent group; clips append new segments to the group
//! without disturbing the pass in flight.

use geom::Distance;

use crate::network::{RoadNetwork, SegmentId};
use crate::records::{AttributeLocation, AttributeRecord, Direction};
use crate::tags::{derive_attribute_tags, merge_overlay, Tags};
use crate::{NODE_MARGIN, POINT_MARGIN, SEGMENT_MARGIN};

/// Applies one attribute record to the network.
pub fn apply_attribute(network: &mut RoadNetwork, record: &AttributeRecord) {
    let tags = match derive_attribute_tags(&record.attribute) {
        Some(tags) if !tags.is_empty() => tags,
        _ => {
            return;
        }
    };
    match record.location {
        AttributeLocation::Line {
            range_start,
            range_end,
        } => {
            apply_line_overlay(
                network,
                record.reference_id,
                range_start,
                range_end,
                &tags,
                record.direction,
            );
        }
        AttributeLocation::Point { position } => {
            apply_point_overlay(network, record.reference_id, position, &tags);
        }
    }
}

/// Merges `tags` onto every segment of the parent group that the coverage range touches, clipping
/// segments the range only partly covers. An unresolvable reference skips the record silently.
pub fn apply_line_overlay(
    network: &mut RoadNetwork,
    reference_id: i64,
    mut range_start: f64,
    mut range_end: f64,
    tags: &Tags,
    direction: Option<Direction>,
) {
    if range_start > range_end {
        warn!(
            "Attribute on {} has inverted range [{}, {}], swapping",
            reference_id, range_start, range_end
        );
        std::mem::swap(&mut range_start, &mut range_end);
    }

    // Tunnel/bridge continuation tags only confirm structures that already exist; they match with
    // the tighter margin and never cause clipping.
    let continuation = tags.contains_key("tunnel") || tags.contains_key("bridge");

    for id in network.segments_by_parent(reference_id) {
        // Fetch fresh: an earlier candidate's clip may have shrunk this segment's range
        let segment = &network.segments[&id];
        if let Some(dir) = direction {
            if segment.is_oneway() && segment.travel_direction() != dir {
                continue;
            }
        }

        let margin = if continuation {
            NODE_MARGIN
        } else {
            SEGMENT_MARGIN
        };
        let m = segment.parent_margin(margin);
        let (ps, pe) = (segment.parent_start, segment.parent_end);

        if range_end <= ps + m || range_start >= pe - m {
            // No effective overlap
            continue;
        }

        if range_start <= ps + m && range_end >= pe - m {
            // Coverage contains the whole segment: no clipping
            if continuation
                && !segment.tags.contains_key("tunnel")
                && !segment.tags.contains_key("bridge")
            {
                continue;
            }
            merge_into(network, id, tags, direction);
        } else if continuation {
            continue;
        } else if range_start > ps + m && range_end < pe - m {
            // Coverage strictly inside: split into three, tag the middle
            if let Some(middle) = network.clip_segment(id, range_start) {
                network.clip_segment(middle, range_end);
                merge_into(network, middle, tags, direction);
            }
        } else if range_start > ps + m {
            // Starts inside, extends past the end
            if let Some(tail) = network.clip_segment(id, range_start) {
                merge_into(network, tail, tags, direction);
            }
        } else {
            // Ends inside, starts before the segment
            if network.clip_segment(id, range_end).is_some() {
                merge_into(network, id, tags, direction);
            }
        }
    }
}

fn merge_into(
    network: &mut RoadNetwork,
    id: SegmentId,
    tags: &Tags,
    direction: Option<Direction>,
) {
    merge_overlay(
        &mut network.segments.get_mut(&id).unwrap().tags,
        tags,
        direction,
    );
}

/// Attaches a point attribute's tags to the right spot on the segment containing `position`,
/// snapping to nearby existing points rather than inserting near-duplicates.
pub fn apply_point_overlay(network: &mut RoadNetwork, reference_id: i64, position: f64, tags: &Tags) {
    let id = match network.segments_by_parent(reference_id).into_iter().find(|id| {
        let s = &network.segments[id];
        s.parent_start <= position && position <= s.parent_end
    }) {
        Some(id) => id,
        None => {
            // Unresolvable reference: skip the record
            return;
        }
    };
    insert_node(network, id, position, tags);
}

fn insert_node(network: &mut RoadNetwork, id: SegmentId, position: f64, tags: &Tags) {
    let segment = &network.segments[&id];
    let (ps, pe) = (segment.parent_start, segment.parent_end);
    let m = segment.parent_margin(POINT_MARGIN);

    // Traffic signal positions are recorded approximately; snap to the linearly closer endpoint
    // instead of the literal position.
    if tags.is("highway", "traffic_signals") {
        let node = if position - ps <= pe - position {
            segment.start_node
        } else {
            segment.end_node
        };
        network.nodes.get_mut(&node).unwrap().tags.extend(tags);
        return;
    }

    if position <= ps + m {
        let node = segment.start_node;
        network.nodes.get_mut(&node).unwrap().tags.extend(tags);
        return;
    }
    if position >= pe - m {
        let node = segment.end_node;
        network.nodes.get_mut(&node).unwrap().tags.extend(tags);
        return;
    }

    // Walk the geometry to the target distance
    let target = segment.parent_pos_to_dist(position);
    let mut cumulative = vec![Distance::ZERO];
    for i in 1..segment.geometry.len() {
        let d = *cumulative.last().unwrap()
            + segment.geometry[i - 1].pt.dist_to(segment.geometry[i].pt);
        cumulative.push(d);
    }
    let idx = cumulative.iter().position(|d| *d >= target).unwrap_or(cumulative.len() - 1);

    // Snap to whichever neighbor is closer, preferring an already-tagged point on a tie
    let before = idx.saturating_sub(1);
    let dist_before = target - cumulative[before];
    let dist_at = cumulative[idx] - target;
    let snap = if dist_at < dist_before
        || (dist_at == dist_before && !segment.geometry[idx].tags.is_empty())
    {
        (idx, dist_at)
    } else {
        (before, dist_before)
    };

    let segment = network.segments.get_mut(&id).unwrap();
    if snap.1 <= POINT_MARGIN {
        segment.geometry[snap.0].tags.extend(tags);
    } else {
        let step = cumulative[idx] - cumulative[idx - 1];
        let fraction = if step == Distance::ZERO {
            0.0
        } else {
            (target - cumulative[idx - 1]) / step
        };
        let pt = segment.geometry[idx - 1]
            .pt
            .interpolate(segment.geometry[idx].pt, fraction);
        let mut point = crate::network::Point::new(pt);
        point.tags.extend(tags);
        segment.geometry.insert(idx, point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::tests::straight_segment;
    use crate::ways::assemble_ways;

    fn tag(k: &str, v: &str) -> Tags {
        let mut tags = Tags::new();
        tags.insert(k, v);
        tags
    }

    /// Three line overlays on one segment spanning [0, 40]: the classic clip-and-merge scenario.
    #[test]
    fn line_overlay_scenario() {
        let mut network = RoadNetwork::new();
        // Long enough that the metric margins are negligible in linear-reference units
        straight_segment(&mut network, 1, 100, 101, 10.0, 401, 7, 0.0, 40.0);

        apply_line_overlay(&mut network, 7, 0.0, 30.0, &tag("maxspeed", "60"), None);
        apply_line_overlay(&mut network, 7, 10.0, 20.0, &tag("name", "Elm Street"), None);
        apply_line_overlay(&mut network, 7, 25.0, 40.0, &tag("maxspeed", "80"), None);

        let mut pieces: Vec<(f64, f64, Option<String>, Option<String>)> = network
            .segments_by_parent(7)
            .into_iter()
            .map(|id| {
                let s = &network.segments[&id];
                (
                    s.parent_start,
                    s.parent_end,
                    s.tags.get("maxspeed").map(|v| v.to_string()),
                    s.tags.get("name").map(|v| v.to_string()),
                )
            })
            .collect();
        pieces.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        assert_eq!(pieces.len(), 5);
        assert_eq!(pieces[0], (0.0, 10.0, Some("60".to_string()), None));
        assert_eq!(
            pieces[1],
            (
                10.0,
                20.0,
                Some("60".to_string()),
                Some("Elm Street".to_string())
            )
        );
        assert_eq!(pieces[2], (20.0, 25.0, Some("60".to_string()), None));
        assert_eq!(pieces[3], (25.0, 30.0, Some("80".to_string()), None));
        assert_eq!(pieces[4], (30.0, 40.0, Some("80".to_string()), None));

        // [25, 30] and [30, 40] carry identical tags, so way assembly folds them together: four
        // output ways covering [0,10], [10,20], [20,25], [25,40]
        let ways = assemble_ways(&mut network);
        assert_eq!(ways.len(), 4);
    }

    #[test]
    fn full_coverage_merge_is_idempotent() {
        let mut network = RoadNetwork::new();
        straight_segment(&mut network, 1, 100, 101, 10.0, 5, 7, 0.0, 1.0);

        apply_line_overlay(&mut network, 7, 0.0, 1.0, &tag("maxspeed", "60"), None);
        let once = network.segments[&1].tags.clone();
        apply_line_overlay(&mut network, 7, 0.0, 1.0, &tag("maxspeed", "60"), None);
        assert_eq!(network.segments[&1].tags, once);
        assert_eq!(network.segments_by_parent(7).len(), 1);
    }

    #[test]
    fn direction_gate_skips_conflicting_oneways() {
        let mut network = RoadNetwork::new();
        straight_segment(&mut network, 1, 100, 101, 10.0, 5, 7, 0.0, 1.0);
        network
            .segments
            .get_mut(&1)
            .unwrap()
            .tags
            .insert("oneway", "yes");

        apply_line_overlay(
            &mut network,
            7,
            0.0,
            1.0,
            &tag("maxspeed", "60"),
            Some(Direction::Backward),
        );
        assert_eq!(network.segments[&1].tags.get("maxspeed"), None);

        apply_line_overlay(
            &mut network,
            7,
            0.0,
            1.0,
            &tag("maxspeed", "60"),
            Some(Direction::Forward),
        );
        assert_eq!(network.segments[&1].tags.get("maxspeed"), Some("60"));
    }

    #[test]
    fn continuation_tags_never_clip() {
        let mut network = RoadNetwork::new();
        straight_segment(&mut network, 1, 100, 101, 10.0, 401, 7, 0.0, 40.0);
        // Partial tunnel coverage on a surface segment: no clip, no tag
        apply_line_overlay(&mut network, 7, 5.0, 20.0, &tag("tunnel", "yes"), None);
        assert_eq!(network.segments_by_parent(7).len(), 1);
        assert_eq!(network.segments[&1].tags.get("tunnel"), None);

        // Full coverage over a segment already marked as tunnel merges fine
        network
            .segments
            .get_mut(&1)
            .unwrap()
            .tags
            .insert("tunnel", "yes");
        let mut tags = Tags::new();
        tags.insert("tunnel", "yes");
        tags.insert("tunnel:name", "Fjellheimtunnelen");
        apply_line_overlay(&mut network, 7, 0.0, 40.0, &tags, None);
        assert_eq!(
            network.segments[&1].tags.get("tunnel:name"),
            Some("Fjellheimtunnelen")
        );
    }

    #[test]
    fn unresolvable_reference_skipped() {
        let mut network = RoadNetwork::new();
        straight_segment(&mut network, 1, 100, 101, 10.0, 5, 7, 0.0, 1.0);
        apply_line_overlay(&mut network, 999, 0.0, 1.0, &tag("maxspeed", "60"), None);
        assert_eq!(network.segments[&1].tags.get("maxspeed"), None);
    }

    #[test]
    fn point_overlay_inserts_interior_point() {
        let mut network = RoadNetwork::new();
        straight_segment(&mut network, 1, 100, 101, 10.0, 5, 7, 0.0, 1.0);
        let points_before = network.segments[&1].geometry.len();

        apply_point_overlay(&mut network, 7, 0.5, &tag("barrier", "lift_gate"));
        let segment = &network.segments[&1];
        // The midpoint falls exactly on the middle geometry point, so we snap instead of insert
        assert_eq!(segment.geometry.len(), points_before);
        assert_eq!(segment.geometry[2].tags.get("barrier"), Some("lift_gate"));
    }

    #[test]
    fn point_overlay_snaps_to_endpoints() {
        let mut network = RoadNetwork::new();
        straight_segment(&mut network, 1, 100, 101, 10.0, 5, 7, 0.0, 1.0);

        apply_point_overlay(&mut network, 7, 0.001, &tag("highway", "crossing"));
        assert_eq!(network.nodes[&100].tags.get("highway"), Some("crossing"));

        // Traffic signals snap to the linearly closer endpoint, not the literal position
        apply_point_overlay(&mut network, 7, 0.7, &tag("highway", "traffic_signals"));
        assert_eq!(
            network.nodes[&101].tags.get("highway"),
            Some("traffic_signals")
        );
    }
}
