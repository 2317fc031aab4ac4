//! The in-memory road network: registries of nodes and segments, plus the sequence and parent
//! indices the overlay engine walks. All mutation of topology funnels through `RoadNetwork`, so
//! the linear-reference invariants are enforced in one place.
//!
//! Invariant: for every segment, `parent_start < parent_end` and `sequence_start < sequence_end`,
//! and the ranges of all segments sharing a parent/sequence partition that linear-reference domain
//! with no gaps or overlaps. Clipping preserves this.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use geom::{Distance, LonLat, EPSILON_DIST};

use crate::records::Direction;
use crate::tags::Tags;

pub type SegmentId = i64;
pub type NodeId = i64;

/// One vertex of a segment's polyline. Tags are usually empty; the overlay engine attaches small
/// point tags (crossings, barriers) at exact coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub pt: LonLat,
    pub tags: Tags,
}

impl Point {
    pub fn new(pt: LonLat) -> Point {
        Point {
            pt,
            tags: Tags::new(),
        }
    }
}

/// The atomic topological unit between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    /// At least 2 points; the first and last are the segment's endpoints
    pub geometry: Vec<Point>,
    pub start_node: NodeId,
    pub end_node: NodeId,

    pub sequence_id: i64,
    pub sequence_start: f64,
    pub sequence_end: f64,
    /// Equals the sequence fields when the link has no super-sequence
    pub parent_id: i64,
    pub parent_start: f64,
    pub parent_end: f64,

    pub length: Distance,
    /// The digitized direction is opposite to the direction of travel
    pub reverse: bool,
    /// Synthetic connector link at a junction; contributes no tags of its own
    pub connection: bool,
    pub class: crate::records::LinkClass,
    pub tags: Tags,
}

impl Segment {
    pub fn first_pt(&self) -> LonLat {
        self.geometry[0].pt
    }

    pub fn last_pt(&self) -> LonLat {
        self.geometry[self.geometry.len() - 1].pt
    }

    /// Meters per linear-reference unit along the parent range.
    pub fn meters_per_parent_unit(&self) -> f64 {
        self.length.inner_meters() / (self.parent_end - self.parent_start)
    }

    /// A metric margin expressed in parent linear-reference units.
    pub fn parent_margin(&self, margin: Distance) -> f64 {
        margin.inner_meters() / self.meters_per_parent_unit()
    }

    /// Distance along the geometry corresponding to a parent linear position.
    pub fn parent_pos_to_dist(&self, position: f64) -> Distance {
        self.length * ((position - self.parent_start) / (self.parent_end - self.parent_start))
    }

    pub fn is_oneway(&self) -> bool {
        self.tags.is("oneway", "yes")
    }

    /// The direction of travel expressed against the digitized direction.
    pub fn travel_direction(&self) -> Direction {
        if self.reverse {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }

    /// The node at the other end.
    pub fn other_endpoint(&self, node: NodeId) -> NodeId {
        if node == self.start_node {
            self.end_node
        } else {
            self.start_node
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub pt: LonLat,
    pub segments: BTreeSet<SegmentId>,
    pub tags: Tags,
    /// Set when this node is the via-node of a turn restriction; way assembly never merges across
    /// a forced break.
    pub forced_break: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RoadNetwork {
    pub nodes: BTreeMap<NodeId, Node>,
    pub segments: BTreeMap<SegmentId, Segment>,
    sequences: BTreeMap<i64, Vec<SegmentId>>,
    parents: BTreeMap<i64, Vec<SegmentId>>,
    /// Synthetic ids for clipped segments and minted nodes count down from here
    next_synthetic_id: i64,
}

pub fn polyline_length(pts: &[Point]) -> Distance {
    pts.windows(2).map(|pair| pair[0].pt.dist_to(pair[1].pt)).sum()
}

impl RoadNetwork {
    pub fn new() -> RoadNetwork {
        RoadNetwork {
            nodes: BTreeMap::new(),
            segments: BTreeMap::new(),
            sequences: BTreeMap::new(),
            parents: BTreeMap::new(),
            next_synthetic_id: -1,
        }
    }

    pub fn mint_id(&mut self) -> i64 {
        let id = self.next_synthetic_id;
        self.next_synthetic_id -= 1;
        id
    }

    /// Finds or creates a node. Passing an existing id merges `segments` (and keeps the original
    /// point); passing None mints a synthetic id.
    pub fn create_node(
        &mut self,
        id: Option<NodeId>,
        pt: LonLat,
        segments: BTreeSet<SegmentId>,
    ) -> NodeId {
        if let Some(id) = id {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.segments.extend(segments);
                return id;
            }
        }
        let id = id.unwrap_or_else(|| self.mint_id());
        self.nodes.insert(
            id,
            Node {
                id,
                pt,
                segments,
                tags: Tags::new(),
                forced_break: false,
            },
        );
        id
    }

    /// Registers a segment and indexes it by sequence and parent. Inverted linear ranges are
    /// auto-corrected with a diagnostic.
    pub fn insert_segment(&mut self, mut segment: Segment) {
        if segment.sequence_start > segment.sequence_end {
            warn!(
                "Segment {} has inverted sequence range [{}, {}], swapping",
                segment.id, segment.sequence_start, segment.sequence_end
            );
            std::mem::swap(&mut segment.sequence_start, &mut segment.sequence_end);
        }
        if segment.parent_start > segment.parent_end {
            warn!(
                "Segment {} has inverted parent range [{}, {}], swapping",
                segment.id, segment.parent_start, segment.parent_end
            );
            std::mem::swap(&mut segment.parent_start, &mut segment.parent_end);
        }

        self.sequences
            .entry(segment.sequence_id)
            .or_insert_with(Vec::new)
            .push(segment.id);
        self.parents
            .entry(segment.parent_id)
            .or_insert_with(Vec::new)
            .push(segment.id);
        self.segments.insert(segment.id, segment);
    }

    /// Snapshot copy, so callers can keep iterating while clips append to the group.
    pub fn segments_by_parent(&self, parent_id: i64) -> Vec<SegmentId> {
        self.parents.get(&parent_id).cloned().unwrap_or_default()
    }

    pub fn segments_by_sequence(&self, sequence_id: i64) -> Vec<SegmentId> {
        self.sequences.get(&sequence_id).cloned().unwrap_or_default()
    }

    /// Unregisters a segment, detaching it from its endpoint nodes and dropping any node left
    /// without incident segments.
    pub fn remove_segment(&mut self, id: SegmentId) {
        let segment = match self.segments.remove(&id) {
            Some(s) => s,
            None => return,
        };
        if let Some(list) = self.sequences.get_mut(&segment.sequence_id) {
            list.retain(|s| *s != id);
        }
        if let Some(list) = self.parents.get_mut(&segment.parent_id) {
            list.retain(|s| *s != id);
        }
        for node_id in [segment.start_node, segment.end_node] {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                node.segments.remove(&id);
                if node.segments.is_empty() {
                    self.nodes.remove(&node_id);
                }
            }
        }
    }

    /// Splits a segment at a parent linear position. The original keeps the head geometry and
    /// `[parent_start, position]`; a new synthetic segment gets the tail and
    /// `[position, parent_end]`. Both share a freshly minted node at the split point, and both end
    /// up indexed in the same sequence/parent groups.
    ///
    /// Returns the new tail segment's id, or None if the position lands on an existing endpoint
    /// (a data/tolerance problem the margin system should have prevented -- reported, not fatal).
    pub fn clip_segment(&mut self, id: SegmentId, position: f64) -> Option<SegmentId> {
        let segment = &self.segments[&id];
        let target = segment.parent_pos_to_dist(position);
        if target <= EPSILON_DIST || target >= segment.length - EPSILON_DIST {
            warn!(
                "Clip of segment {} at {} coincides with an endpoint, skipping",
                id, position
            );
            return None;
        }

        // Walk the polyline to the split point
        let mut so_far = Distance::ZERO;
        let mut split = None;
        for i in 1..segment.geometry.len() {
            let step = segment.geometry[i - 1].pt.dist_to(segment.geometry[i].pt);
            if so_far + step >= target {
                let fraction = if step == Distance::ZERO {
                    0.0
                } else {
                    (target - so_far) / step
                };
                split = Some((i, fraction));
                break;
            }
            so_far += step;
        }
        let (idx, fraction) = split?;

        // When the split lands exactly on an interior point, reuse it (overlay tags and all)
        // rather than inserting a duplicate coordinate.
        let reuse_existing = fraction >= 1.0 - 1e-9 && idx < segment.geometry.len() - 1;
        let boundary = if reuse_existing {
            segment.geometry[idx].clone()
        } else {
            Point::new(
                segment.geometry[idx - 1]
                    .pt
                    .interpolate(segment.geometry[idx].pt, fraction),
            )
        };
        let tail_from = if reuse_existing { idx + 1 } else { idx };

        let new_id = self.mint_id();
        let segment = self.segments.get_mut(&id).unwrap();
        let old_end_node = segment.end_node;

        // Sequence ranges split at the proportionally equivalent position, preserving the
        // partition invariant in both reference systems.
        let fraction_of_parent =
            (position - segment.parent_start) / (segment.parent_end - segment.parent_start);
        let sequence_position = segment.sequence_start
            + fraction_of_parent * (segment.sequence_end - segment.sequence_start);

        let mut tail = segment.clone();
        tail.id = new_id;
        tail.geometry = Vec::new();
        // The head half keeps any tags on the boundary point
        tail.geometry.push(Point::new(boundary.pt));
        tail.geometry
            .extend(segment.geometry[tail_from..].iter().cloned());
        tail.parent_start = position;
        tail.sequence_start = sequence_position;
        tail.length = polyline_length(&tail.geometry);
        tail.end_node = old_end_node;

        segment.geometry.truncate(idx);
        segment.geometry.push(boundary.clone());
        segment.parent_end = position;
        segment.sequence_end = sequence_position;
        segment.length = polyline_length(&segment.geometry);

        let boundary_node = self.create_node(
            None,
            boundary.pt,
            [id, new_id].into_iter().collect::<BTreeSet<_>>(),
        );
        self.segments.get_mut(&id).unwrap().end_node = boundary_node;
        tail.start_node = boundary_node;

        // The tail takes over the original's spot at the old end node
        if let Some(node) = self.nodes.get_mut(&old_end_node) {
            node.segments.remove(&id);
            node.segments.insert(new_id);
        }

        // Insertion, not replacement: callers iterate over snapshots of these lists
        self.insert_segment(tail);
        Some(new_id)
    }

    /// The signed bearing change moving from `s1` into `s2` across their shared node. Negative
    /// means a left turn.
    pub fn junction_angle(&self, s1: SegmentId, s2: SegmentId) -> f64 {
        let a = &self.segments[&s1];
        let b = &self.segments[&s2];
        let (angle1, angle2) = if a.end_node == b.start_node {
            (
                a.geometry[a.geometry.len() - 2]
                    .pt
                    .angle_to(a.last_pt()),
                b.first_pt().angle_to(b.geometry[1].pt),
            )
        } else if a.start_node == b.end_node {
            (
                a.geometry[1].pt.angle_to(a.first_pt()),
                b.last_pt().angle_to(b.geometry[b.geometry.len() - 2].pt),
            )
        } else if a.start_node == b.start_node {
            (
                a.geometry[1].pt.angle_to(a.first_pt()),
                b.first_pt().angle_to(b.geometry[1].pt),
            )
        } else {
            (
                a.geometry[a.geometry.len() - 2]
                    .pt
                    .angle_to(a.last_pt()),
                b.last_pt().angle_to(b.geometry[b.geometry.len() - 2].pt),
            )
        };
        angle1.shortest_rotation_to(angle2)
    }

    /// Reverses a segment's digitized direction in place, optionally swapping directional tag
    /// suffixes so the tags still describe the same physical reality.
    pub fn reverse_segment(&mut self, id: SegmentId, swap_tags: bool) {
        let segment = self.segments.get_mut(&id).unwrap();
        segment.geometry.reverse();
        std::mem::swap(&mut segment.start_node, &mut segment.end_node);
        segment.reverse = !segment.reverse;

        if swap_tags {
            let mut swapped = Tags::new();
            for (k, v) in segment.tags.inner() {
                if let Some(base) = k.strip_suffix(":forward") {
                    swapped.insert(format!("{}:backward", base), v.clone());
                } else if let Some(base) = k.strip_suffix(":backward") {
                    swapped.insert(format!("{}:forward", base), v.clone());
                } else {
                    swapped.insert(k.clone(), v.clone());
                }
            }
            segment.tags = swapped;
        }
    }
}
