//! Turn-restriction resolution: find the legal driving route between a restriction record's
//! endpoints, locate the turn itself, and classify it.
//!
//! The route search is branch-and-bound over an explicit work-list, with parent pointers into an
//! arena instead of copied path lists. The distance and hop bounds keep it from wandering off
//! through degenerate data.

use std::collections::BTreeSet;

use geom::Distance;

use crate::network::{NodeId, RoadNetwork, Segment, SegmentId};
use crate::records::{LinkClass, RestrictionRecord};
use crate::{ANGLE_MARGIN, MAX_TRAVEL_DEPTH, MAX_TRAVEL_DISTANCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionKind {
    NoLeftTurn,
    NoRightTurn,
    NoUTurn,
    NoStraightOn,
}

impl RestrictionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RestrictionKind::NoLeftTurn => "no_left_turn",
            RestrictionKind::NoRightTurn => "no_right_turn",
            RestrictionKind::NoUTurn => "no_u_turn",
            RestrictionKind::NoStraightOn => "no_straight_on",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRestriction {
    pub from: SegmentId,
    pub to: SegmentId,
    pub via: NodeId,
    pub kind: RestrictionKind,
    /// Set when no bearing discontinuity was found and the type is a guess
    pub ambiguous: bool,
}

/// Resolves all restriction records, deduplicates them, and marks each via node as a forced break
/// so way assembly stops there.
pub fn resolve_restrictions(
    network: &mut RoadNetwork,
    records: &[RestrictionRecord],
) -> Vec<TurnRestriction> {
    let mut out: Vec<TurnRestriction> = Vec::new();
    for record in records {
        let resolved = match resolve(network, record) {
            Some(r) => r,
            None => {
                continue;
            }
        };
        if out.contains(&resolved) {
            continue;
        }
        if let Some(node) = network.nodes.get_mut(&resolved.via) {
            node.forced_break = true;
        }
        out.push(resolved);
    }
    info!(
        "Resolved {} of {} turn restriction records",
        out.len(),
        records.len()
    );
    out
}

fn resolve(network: &RoadNetwork, record: &RestrictionRecord) -> Option<TurnRestriction> {
    let froms = candidate_segments(network, record.from_ref);
    let targets: BTreeSet<SegmentId> = candidate_segments(network, record.to_ref)
        .into_iter()
        .filter(|t| !froms.contains(t))
        .collect();
    if froms.is_empty() || targets.is_empty() {
        // Unresolvable reference: skip this record
        return None;
    }

    // Try both endpoints of every from-candidate as the search origin; keep the shortest route.
    let mut best: Option<(Route, Distance)> = None;
    for &from in &froms {
        let segment = &network.segments[&from];
        for origin in [segment.start_node, segment.end_node] {
            let bound = best.as_ref().map(|(_, d)| *d);
            if let Some(found) = search(network, from, origin, &targets, bound) {
                best = Some(found);
            }
        }
    }
    let (route, _) = best?;
    Some(classify(network, record, route))
}

/// Restrictions reference the parent linear system, but some older records still use the raw
/// sequence ids.
fn candidate_segments(network: &RoadNetwork, reference: i64) -> Vec<SegmentId> {
    let by_parent = network.segments_by_parent(reference);
    if !by_parent.is_empty() {
        return by_parent;
    }
    network.segments_by_sequence(reference)
}

struct Route {
    segments: Vec<SegmentId>,
    /// nodes[i] joins segments[i] and segments[i+1]
    nodes: Vec<NodeId>,
}

struct Step {
    segment: SegmentId,
    entry_node: NodeId,
    parent: Option<usize>,
    distance: Distance,
    depth: usize,
}

/// Depth-first branch-and-bound from `from`, leaving through `origin`. Only routes strictly
/// shorter than `bound` are reported.
fn search(
    network: &RoadNetwork,
    from: SegmentId,
    origin: NodeId,
    targets: &BTreeSet<SegmentId>,
    bound: Option<Distance>,
) -> Option<(Route, Distance)> {
    let mut arena = vec![Step {
        segment: from,
        entry_node: network.segments[&from].other_endpoint(origin),
        parent: None,
        distance: Distance::ZERO,
        depth: 0,
    }];
    let mut stack = vec![0];
    let mut best_leaf: Option<usize> = None;
    let mut best_distance = bound;

    while let Some(i) = stack.pop() {
        let (segment, entry, distance, depth) = {
            let step = &arena[i];
            (step.segment, step.entry_node, step.distance, step.depth)
        };
        let exit = network.segments[&segment].other_endpoint(entry);
        let node = match network.nodes.get(&exit) {
            Some(n) => n,
            None => {
                continue;
            }
        };
        for &next in &node.segments {
            if next == segment || on_path(&arena, i, next) {
                continue;
            }
            let candidate = &network.segments[&next];
            if !traversable(candidate, exit) {
                continue;
            }
            let total = distance + candidate.length;
            let hops = depth + 1;
            if hops > MAX_TRAVEL_DEPTH || total > MAX_TRAVEL_DISTANCE {
                continue;
            }
            if let Some(b) = best_distance {
                if total >= b {
                    continue;
                }
            }
            let idx = arena.len();
            arena.push(Step {
                segment: next,
                entry_node: exit,
                parent: Some(i),
                distance: total,
                depth: hops,
            });
            if targets.contains(&next) {
                best_leaf = Some(idx);
                best_distance = Some(total);
            } else {
                stack.push(idx);
            }
        }
    }

    let leaf = best_leaf?;
    let mut segments = Vec::new();
    let mut nodes = Vec::new();
    let mut cursor = Some(leaf);
    while let Some(i) = cursor {
        let step = &arena[i];
        segments.push(step.segment);
        if step.parent.is_some() {
            nodes.push(step.entry_node);
        }
        cursor = step.parent;
    }
    segments.reverse();
    nodes.reverse();
    Some((Route { segments, nodes }, best_distance?))
}

fn on_path(arena: &[Step], mut i: usize, segment: SegmentId) -> bool {
    loop {
        if arena[i].segment == segment {
            return true;
        }
        match arena[i].parent {
            Some(p) => i = p,
            None => {
                return false;
            }
        }
    }
}

/// Whether a motor vehicle may enter `segment` at `entry`.
fn traversable(segment: &Segment, entry: NodeId) -> bool {
    if matches!(segment.class, LinkClass::CycleOrFootway | LinkClass::Ferry) {
        return false;
    }
    if matches!(
        segment.tags.get("highway"),
        Some("cycleway") | Some("footway") | Some("path")
    ) {
        return false;
    }
    if segment.tags.is("motor_vehicle", "no") {
        return false;
    }
    if segment.is_oneway() {
        let travel_start = if segment.reverse {
            segment.end_node
        } else {
            segment.start_node
        };
        if entry != travel_start {
            return false;
        }
    }
    let forward_entry = entry == segment.start_node;
    if forward_entry && segment.tags.is("motor_vehicle:forward", "no") {
        return false;
    }
    if !forward_entry && segment.tags.is("motor_vehicle:backward", "no") {
        return false;
    }
    true
}

/// The via node is the first bearing discontinuity along the route; the signed angle there names
/// the restriction. Negative is a left turn.
fn classify(network: &RoadNetwork, record: &RestrictionRecord, route: Route) -> TurnRestriction {
    let from = route.segments[0];
    let to = route.segments[route.segments.len() - 1];
    for (i, pair) in route.segments.windows(2).enumerate() {
        let angle = network.junction_angle(pair[0], pair[1]);
        if angle.abs() > ANGLE_MARGIN {
            let same_parent =
                network.segments[&pair[0]].parent_id == network.segments[&pair[1]].parent_id;
            // A hard reversal is always a U-turn; so is a strong leftward swing back onto the
            // same road across a median. Shallower lefts stay left turns even within one parent,
            // since dual carriageways meet their own side roads too.
            let kind = if angle < -135.0 || (same_parent && angle <= -60.0) {
                RestrictionKind::NoUTurn
            } else if angle < 0.0 {
                RestrictionKind::NoLeftTurn
            } else {
                RestrictionKind::NoRightTurn
            };
            return TurnRestriction {
                from,
                to,
                via: route.nodes[i],
                kind,
                ambiguous: false,
            };
        }
    }

    // No discontinuity anywhere: trust the record's hint, or fall back to the route's midpoint
    let via = record
        .via_node
        .filter(|n| network.nodes.contains_key(n))
        .unwrap_or(route.nodes[route.nodes.len() / 2]);
    TurnRestriction {
        from,
        to,
        via,
        kind: RestrictionKind::NoStraightOn,
        ambiguous: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{polyline_length, Point, Segment};
    use crate::tags::Tags;
    use geom::LonLat;

    fn add_segment(
        network: &mut RoadNetwork,
        id: SegmentId,
        parent: i64,
        sequence: i64,
        start_node: NodeId,
        end_node: NodeId,
        pts: Vec<(f64, f64)>,
        tags: Tags,
    ) {
        let geometry: Vec<Point> = pts
            .into_iter()
            .map(|(lon, lat)| Point::new(LonLat::new(lon, lat)))
            .collect();
        let length = polyline_length(&geometry);
        let first = geometry[0].pt;
        let last = geometry[geometry.len() - 1].pt;
        network.insert_segment(Segment {
            id,
            geometry,
            start_node,
            end_node,
            sequence_id: sequence,
            sequence_start: 0.0,
            sequence_end: 1.0,
            parent_id: parent,
            parent_start: 0.0,
            parent_end: 1.0,
            length,
            reverse: false,
            connection: false,
            class: LinkClass::Carriageway,
            tags,
        });
        network.create_node(Some(start_node), first, [id].into_iter().collect());
        network.create_node(Some(end_node), last, [id].into_iter().collect());
    }

    fn record(from_ref: i64, to_ref: i64) -> RestrictionRecord {
        RestrictionRecord {
            from_ref,
            to_ref,
            via_node: None,
        }
    }

    /// A ~100 degree rightward bearing change at the shared node.
    #[test]
    fn sharp_right_classified() {
        let mut network = RoadNetwork::new();
        add_segment(&mut network, 1, 1, 1, 10, 11, vec![(10.0, 60.0), (10.0, 60.001)], Tags::new());
        add_segment(
            &mut network,
            2,
            2,
            2,
            11,
            12,
            vec![(10.0, 60.001), (10.002, 60.0008)],
            Tags::new(),
        );

        let restrictions = resolve_restrictions(&mut network, &[record(1, 2)]);
        assert_eq!(restrictions.len(), 1);
        let r = &restrictions[0];
        assert_eq!(r.from, 1);
        assert_eq!(r.to, 2);
        assert_eq!(r.via, 11);
        assert_eq!(r.kind, RestrictionKind::NoRightTurn);
        assert!(!r.ambiguous);
        assert!(network.nodes[&11].forced_break);
    }

    #[test]
    fn hard_reversal_is_u_turn() {
        let mut network = RoadNetwork::new();
        add_segment(&mut network, 1, 1, 1, 10, 11, vec![(10.0, 60.0), (10.0, 60.001)], Tags::new());
        add_segment(
            &mut network,
            2,
            2,
            2,
            11,
            12,
            vec![(10.0, 60.001), (9.99999, 60.0)],
            Tags::new(),
        );

        let restrictions = resolve_restrictions(&mut network, &[record(1, 2)]);
        assert_eq!(restrictions[0].kind, RestrictionKind::NoUTurn);
    }

    /// Swinging back onto the other carriageway of the same road is a U-turn even short of a
    /// full reversal.
    #[test]
    fn median_crossing_is_u_turn() {
        let mut network = RoadNetwork::new();
        add_segment(&mut network, 1, 1, 11, 10, 11, vec![(10.0, 60.0005), (10.0, 60.001)], Tags::new());
        // Roughly -129 degrees back across the median, same parent
        add_segment(&mut network, 2, 1, 12, 11, 12, vec![(10.0, 60.001), (9.999, 60.0006)], Tags::new());

        let restrictions = resolve_restrictions(&mut network, &[record(11, 12)]);
        assert_eq!(restrictions.len(), 1);
        assert_eq!(restrictions[0].kind, RestrictionKind::NoUTurn);
        assert!(!restrictions[0].ambiguous);
    }

    /// A moderate left within one parent road is still just a left turn.
    #[test]
    fn shallow_left_on_same_road_is_left_turn() {
        let mut network = RoadNetwork::new();
        add_segment(&mut network, 1, 1, 11, 10, 11, vec![(10.0, 60.0005), (10.0, 60.001)], Tags::new());
        // Roughly -50 degrees, same parent
        add_segment(&mut network, 2, 1, 12, 11, 12, vec![(10.0, 60.001), (9.999, 60.00142)], Tags::new());

        let restrictions = resolve_restrictions(&mut network, &[record(11, 12)]);
        assert_eq!(restrictions.len(), 1);
        assert_eq!(restrictions[0].kind, RestrictionKind::NoLeftTurn);
        assert_eq!(restrictions[0].via, 11);
    }

    #[test]
    fn straight_route_is_ambiguous() {
        let mut network = RoadNetwork::new();
        add_segment(&mut network, 1, 1, 1, 10, 11, vec![(10.0, 60.0), (10.0, 60.001)], Tags::new());
        add_segment(&mut network, 2, 2, 2, 11, 12, vec![(10.0, 60.001), (10.0, 60.002)], Tags::new());

        let restrictions = resolve_restrictions(&mut network, &[record(1, 2)]);
        assert_eq!(restrictions.len(), 1);
        assert_eq!(restrictions[0].kind, RestrictionKind::NoStraightOn);
        assert!(restrictions[0].ambiguous);
        assert_eq!(restrictions[0].via, 11);
    }

    #[test]
    fn duplicates_deduped() {
        let mut network = RoadNetwork::new();
        add_segment(&mut network, 1, 1, 1, 10, 11, vec![(10.0, 60.0), (10.0, 60.001)], Tags::new());
        add_segment(
            &mut network,
            2,
            2,
            2,
            11,
            12,
            vec![(10.0, 60.001), (10.002, 60.0008)],
            Tags::new(),
        );

        let restrictions = resolve_restrictions(&mut network, &[record(1, 2), record(1, 2)]);
        assert_eq!(restrictions.len(), 1);
    }

    #[test]
    fn unresolvable_references_skipped() {
        let mut network = RoadNetwork::new();
        add_segment(&mut network, 1, 1, 1, 10, 11, vec![(10.0, 60.0), (10.0, 60.001)], Tags::new());
        let restrictions = resolve_restrictions(&mut network, &[record(1, 99)]);
        assert!(restrictions.is_empty());
    }

    #[test]
    fn distance_bound_prunes_long_routes() {
        let mut network = RoadNetwork::new();
        add_segment(&mut network, 1, 1, 1, 10, 11, vec![(10.0, 60.0), (10.0, 60.001)], Tags::new());
        // ~220m intermediate leg pushes any route over the travel budget
        add_segment(&mut network, 2, 2, 2, 11, 12, vec![(10.0, 60.001), (10.0, 60.003)], Tags::new());
        add_segment(&mut network, 3, 3, 3, 12, 13, vec![(10.0, 60.003), (10.001, 60.003)], Tags::new());

        let restrictions = resolve_restrictions(&mut network, &[record(1, 3)]);
        assert!(restrictions.is_empty());
    }

    #[test]
    fn oneway_entry_blocked() {
        let mut network = RoadNetwork::new();
        add_segment(&mut network, 1, 1, 1, 10, 11, vec![(10.0, 60.0), (10.0, 60.001)], Tags::new());
        // Digitized away from the junction, so it can only be entered at node 12
        let mut tags = Tags::new();
        tags.insert("oneway", "yes");
        add_segment(
            &mut network,
            2,
            2,
            2,
            12,
            11,
            vec![(10.002, 60.0008), (10.0, 60.001)],
            tags,
        );

        let restrictions = resolve_restrictions(&mut network, &[record(1, 2)]);
        assert!(restrictions.is_empty());
    }
}
