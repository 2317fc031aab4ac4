//! Way assembly: stitches segments into maximal chains that read as one street, then re-splits
//! wherever the tag set changes. Segments digitized against the chain direction are reversed in
//! place, swapping their directional tag suffixes.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::network::{NodeId, RoadNetwork, SegmentId};
use crate::tags::Tags;
use crate::ANGLE_MARGIN;

/// An ordered run of segments with one uniform tag set, ready for serialization. After assembly
/// every stored segment appears in exactly one way, oriented head to tail.
#[derive(Debug)]
pub struct Way {
    pub segments: Vec<SegmentId>,
    pub tags: Tags,
}

pub fn assemble_ways(network: &mut RoadNetwork) -> Vec<Way> {
    // Segments digitized against the direction of travel get flipped up front, so a oneway's
    // node order always matches its driving direction in the output.
    let backwards: Vec<SegmentId> = network
        .segments
        .values()
        .filter(|s| s.reverse)
        .map(|s| s.id)
        .collect();
    for id in backwards {
        network.reverse_segment(id, true);
    }

    // Chains only form within one road: same ref, name and classification. Connectors are
    // tagless and join whatever chain reaches them.
    let mut groups: BTreeMap<(String, String, String), BTreeSet<SegmentId>> = BTreeMap::new();
    let mut connectors: BTreeSet<SegmentId> = BTreeSet::new();
    for segment in network.segments.values() {
        if segment.connection {
            connectors.insert(segment.id);
        } else {
            groups
                .entry(group_key(&segment.tags))
                .or_default()
                .insert(segment.id);
        }
    }

    let mut used: BTreeSet<SegmentId> = BTreeSet::new();
    let mut ways = Vec::new();
    for group in groups.values() {
        for &seed in group {
            if used.contains(&seed) {
                continue;
            }
            used.insert(seed);
            let mut chain: VecDeque<SegmentId> = VecDeque::new();
            chain.push_back(seed);

            loop {
                let last = *chain.back().unwrap();
                let node = network.segments[&last].end_node;
                match next_segment(network, last, node, group, &connectors, &used) {
                    Some(next) => {
                        if network.segments[&next].start_node != node {
                            network.reverse_segment(next, true);
                        }
                        used.insert(next);
                        chain.push_back(next);
                    }
                    None => break,
                }
            }
            loop {
                let first = *chain.front().unwrap();
                let node = network.segments[&first].start_node;
                match next_segment(network, first, node, group, &connectors, &used) {
                    Some(prev) => {
                        if network.segments[&prev].end_node != node {
                            network.reverse_segment(prev, true);
                        }
                        used.insert(prev);
                        chain.push_front(prev);
                    }
                    None => break,
                }
            }

            ways.extend(split_chain(network, chain.into_iter().collect()));
        }
    }

    // Connectors nobody reached still have to come out
    for &id in &connectors {
        if !used.contains(&id) {
            ways.push(Way {
                segments: vec![id],
                tags: network.segments[&id].tags.clone(),
            });
        }
    }

    info!(
        "Assembled {} ways from {} segments",
        ways.len(),
        network.segments.len()
    );
    ways
}

fn group_key(tags: &Tags) -> (String, String, String) {
    (
        tags.get("ref").unwrap_or("").to_string(),
        tags.get("name").unwrap_or("").to_string(),
        tags.get("highway").unwrap_or("").to_string(),
    )
}

/// The best continuation of `current` across `node`: unused, in the same group (or a connector),
/// bearing within the margin unless a connector is involved, and not a one-way that would have to
/// be flipped. Smallest bearing change wins.
fn next_segment(
    network: &RoadNetwork,
    current: SegmentId,
    node: NodeId,
    group: &BTreeSet<SegmentId>,
    connectors: &BTreeSet<SegmentId>,
    used: &BTreeSet<SegmentId>,
) -> Option<SegmentId> {
    let n = network.nodes.get(&node)?;
    if n.forced_break {
        return None;
    }
    let current_is_connector = connectors.contains(&current);

    let mut best: Option<(f64, SegmentId)> = None;
    for &cand in &n.segments {
        if cand == current || used.contains(&cand) {
            continue;
        }
        let is_connector = connectors.contains(&cand);
        if !is_connector && !group.contains(&cand) {
            continue;
        }
        let angle = network.junction_angle(current, cand).abs();
        if angle > ANGLE_MARGIN && !is_connector && !current_is_connector {
            continue;
        }
        let segment = &network.segments[&cand];
        let needs_reverse = segment.start_node != node;
        if needs_reverse && segment.is_oneway() {
            continue;
        }
        if best.map(|(a, _)| angle < a).unwrap_or(true) {
            best = Some((angle, cand));
        }
    }
    best.map(|(_, id)| id)
}

/// Cuts a maximal chain into ways at tag changes. Connectors inherit the surrounding way's tags
/// and never force a cut.
fn split_chain(network: &RoadNetwork, chain: Vec<SegmentId>) -> Vec<Way> {
    let mut ways = Vec::new();
    let mut current: Vec<SegmentId> = Vec::new();
    let mut tags: Option<Tags> = None;
    for id in chain {
        let segment = &network.segments[&id];
        if segment.connection {
            current.push(id);
            continue;
        }
        match &tags {
            Some(t) if *t != segment.tags => {
                ways.push(Way {
                    segments: std::mem::take(&mut current),
                    tags: tags.take().unwrap(),
                });
                tags = Some(segment.tags.clone());
            }
            Some(_) => {}
            None => {
                tags = Some(segment.tags.clone());
            }
        }
        current.push(id);
    }
    if !current.is_empty() {
        ways.push(Way {
            segments: current,
            tags: tags.unwrap_or_default(),
        });
    }
    ways
}
