//! OSM tag derivation and merging.
//!
//! `derive_link_tags` and `derive_attribute_tags` turn already-classified records into flat tag
//! sets; they're pure functions and know nothing about the graph. `merge_overlay` is the only way
//! overlay tags land on a segment, so the conflict rules live in one place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::{
    parse_lane_codes, AttributeKind, BarrierKind, Direction, LaneModifier, LinkClass, LinkRecord,
    Medium, RoadCategory,
};

/// A flat key/value tag set. Always use `get` -- there's deliberately no "missing key means empty
/// string" behavior here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Tags {
        Tags(BTreeMap::new())
    }

    pub fn get(&self, k: &str) -> Option<&str> {
        self.0.get(k).map(|v| v.as_str())
    }

    pub fn is(&self, k: &str, v: &str) -> bool {
        self.get(k) == Some(v)
    }

    pub fn contains_key(&self, k: &str) -> bool {
        self.0.contains_key(k)
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, k: K, v: V) {
        self.0.insert(k.into(), v.into());
    }

    pub fn remove(&mut self, k: &str) -> Option<String> {
        self.0.remove(k)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn inner(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Plain union; later writes win. Overlay merging goes through `merge_overlay` instead.
    pub fn extend(&mut self, other: &Tags) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

/// Base tags for a freshly ingested link, plus whether its digitized direction is opposite to the
/// direction of travel (decided by the first lane code).
pub fn derive_link_tags(record: &LinkRecord) -> (Tags, bool) {
    let mut tags = Tags::new();

    match record.class {
        LinkClass::CycleOrFootway => {
            tags.insert("highway", "cycleway");
        }
        LinkClass::Ferry => {
            tags.insert("route", "ferry");
        }
        _ => {
            let highway = match record.category {
                Some(RoadCategory::Europe) | Some(RoadCategory::National) => "trunk",
                Some(RoadCategory::County) => {
                    // County roads below 1000 kept their primary status after the reform
                    if record.road_number.map(|n| n < 1000).unwrap_or(false) {
                        "primary"
                    } else {
                        "secondary"
                    }
                }
                Some(RoadCategory::Municipal) => "residential",
                Some(RoadCategory::Private) => "service",
                Some(RoadCategory::Forest) => "track",
                Some(RoadCategory::Unknown) => {
                    warn!("Link {} has an unmapped road category", record.id);
                    "road"
                }
                None => "unclassified",
            };

            // Ramp sections of numbered roads become links
            if record.class == LinkClass::Ramp
                && matches!(highway, "trunk" | "primary" | "secondary")
            {
                tags.insert("highway", format!("{}_link", highway));
            } else {
                tags.insert("highway", highway);
            }

            if record.class == LinkClass::Roundabout {
                tags.insert("junction", "roundabout");
            }
        }
    }

    // Road number ref
    if let Some(number) = record.road_number {
        match record.category {
            Some(RoadCategory::Europe) => tags.insert("ref", format!("E {}", number)),
            Some(RoadCategory::National) | Some(RoadCategory::County) => {
                tags.insert("ref", number.to_string())
            }
            _ => {}
        }
    }

    if let Some(name) = &record.name {
        if record.class != LinkClass::Roundabout {
            tags.insert("name", name.trim());
        }
    }

    // Bridges and tunnels from the medium code
    match record.medium {
        Medium::UnderGround | Medium::UnderSeaBottom | Medium::UnderGlacier => {
            tags.insert("tunnel", "yes");
            tags.insert("layer", "-1");
        }
        Medium::InBuilding => {
            tags.insert("tunnel", "building_passage");
        }
        Medium::InAir => {
            tags.insert("bridge", "yes");
            tags.insert("layer", "1");
        }
        Medium::OnGround => {}
        Medium::Unknown => {
            warn!("Link {} has an unmapped medium code", record.id);
        }
    }

    // Lanes. Odd lane codes travel forward, even ones backward. Cycle lanes become cycleway
    // tags and stay out of the motor-lane counts.
    let mut reverse = false;
    if let Some(raw) = &record.lanes {
        let codes = parse_lane_codes(raw);
        if codes.is_empty() {
            warn!("Link {} has unparseable lane codes {:?}", record.id, raw);
        } else {
            reverse = !codes[0].forward();

            let mut cycleway = (false, false);
            // Per-lane turn and PSV markers, leftmost lane first. Left-turn lanes always sit on
            // the left edge; everything else accumulates rightward in code order.
            let mut turns: (Vec<&str>, Vec<&str>) = (Vec::new(), Vec::new());
            let mut psv: (Vec<&str>, Vec<&str>) = (Vec::new(), Vec::new());
            for code in &codes {
                let (turn, access, cycle) = if code.forward() {
                    (&mut turns.0, &mut psv.0, &mut cycleway.0)
                } else {
                    (&mut turns.1, &mut psv.1, &mut cycleway.1)
                };
                match code.modifier {
                    Some(LaneModifier::Cycle) => {
                        *cycle = true;
                    }
                    Some(LaneModifier::TurnLeft) => {
                        turn.insert(0, "left");
                        access.insert(0, "");
                    }
                    Some(LaneModifier::TurnRight) => {
                        turn.push("right");
                        access.push("");
                    }
                    Some(LaneModifier::Psv) => {
                        turn.push("");
                        access.push("designated");
                    }
                    None => {
                        turn.push("");
                        access.push("");
                    }
                }
            }

            let forward = turns.0.len();
            let backward = turns.1.len();
            let forward_turn = join_lane_markers(&turns.0);
            let backward_turn = join_lane_markers(&turns.1);
            let forward_psv = join_lane_markers(&psv.0);
            let backward_psv = join_lane_markers(&psv.1);

            if forward > 0 && backward > 0 {
                if forward > 1 && backward > 1 {
                    if !forward_turn.is_empty() {
                        tags.insert("turn:lanes:forward", forward_turn.clone());
                    }
                    if !backward_turn.is_empty() {
                        tags.insert("turn:lanes:backward", backward_turn.clone());
                    }
                }
                if forward_psv == "designated" && backward_psv == "designated" {
                    tags.insert("psv", "designated");
                    tags.insert("motorcar", "no");
                } else {
                    insert_lane_access(&mut tags, &forward_psv, ":forward");
                    insert_lane_access(&mut tags, &backward_psv, ":backward");
                }
                if forward > 1
                    || backward > 1
                    || !forward_turn.is_empty()
                    || !backward_turn.is_empty()
                    || !forward_psv.is_empty()
                    || !backward_psv.is_empty()
                {
                    tags.insert("lanes", (forward + backward).to_string());
                    if forward != backward {
                        tags.insert("lanes:forward", forward.to_string());
                        tags.insert("lanes:backward", backward.to_string());
                    }
                }
            } else if forward > 0 || backward > 0 {
                let count = forward.max(backward);
                let (turn, psv) = if forward > 0 {
                    (forward_turn, forward_psv)
                } else {
                    (backward_turn, backward_psv)
                };
                if count > 1 && !turn.is_empty() {
                    tags.insert("turn:lanes", turn);
                }
                if psv == "designated" {
                    // The whole carriageway is a PSV lane
                    tags.insert("psv", "designated");
                    tags.insert("motorcar", "no");
                } else {
                    insert_lane_access(&mut tags, &psv, "");
                }
                if count > 1 || (!psv.is_empty() && psv != "designated") {
                    tags.insert("lanes", count.to_string());
                }
                tags.insert("oneway", "yes");
            }

            match cycleway {
                (true, true) => tags.insert("cycleway", "lane"),
                (true, false) => tags.insert("cycleway:right", "lane"),
                (false, true) => tags.insert("cycleway:left", "lane"),
                (false, false) => {}
            }
        }
    }

    (tags, reverse)
}

/// Joins per-lane markers into a `turn:lanes`-style value, or empty when no lane carries one.
fn join_lane_markers(entries: &[&str]) -> String {
    if entries.iter().all(|e| e.is_empty()) {
        String::new()
    } else {
        entries.join("|")
    }
}

/// PSV lanes imply the matching per-lane motorcar restriction.
fn insert_lane_access(tags: &mut Tags, psv: &str, suffix: &str) {
    if !psv.is_empty() {
        tags.insert(format!("psv:lanes{}", suffix), psv);
        tags.insert(format!("motorcar:lanes{}", suffix), psv.replace("designated", "no"));
    }
}

/// Tags for one attribute record, or None when the record shouldn't produce any (which is
/// reported, not an error).
pub fn derive_attribute_tags(attribute: &AttributeKind) -> Option<Tags> {
    let mut tags = Tags::new();
    match attribute {
        AttributeKind::SpeedLimit { kmh } => {
            tags.insert("maxspeed", kmh.to_string());
        }
        AttributeKind::StreetName { name } => {
            tags.insert("name", name.trim());
        }
        AttributeKind::Motorway => {
            tags.insert("highway", "motorway");
        }
        AttributeKind::MotorRoad => {
            tags.insert("motorroad", "yes");
        }
        AttributeKind::Tunnel { name } => {
            tags.insert("tunnel", "yes");
            tags.insert("layer", "-1");
            if let Some(name) = name {
                tags.insert("tunnel:name", name.trim());
            }
        }
        AttributeKind::Bridge { name } => {
            tags.insert("bridge", "yes");
            tags.insert("layer", "1");
            if let Some(name) = name {
                tags.insert("bridge:name", name.trim());
            }
        }
        AttributeKind::NoMotorVehicles => {
            tags.insert("motor_vehicle", "no");
        }
        AttributeKind::Crossing { signals } => {
            tags.insert("highway", "crossing");
            if *signals {
                tags.insert("crossing", "traffic_signals");
            }
        }
        AttributeKind::TrafficSignals => {
            tags.insert("highway", "traffic_signals");
        }
        AttributeKind::Barrier { barrier } => {
            let value = match barrier {
                BarrierKind::Bollard => "bollard",
                BarrierKind::SwingGate => "swing_gate",
                BarrierKind::CycleBarrier => "cycle_barrier",
                BarrierKind::LiftGate => "lift_gate",
                BarrierKind::BusTrap => "bus_trap",
                BarrierKind::Unknown => {
                    warn!("Unmapped barrier code, tagging generically");
                    "yes"
                }
            };
            tags.insert("barrier", value);
        }
        AttributeKind::Unknown => {
            warn!("Unknown attribute kind, skipping");
            return None;
        }
    }
    Some(tags)
}

/// Merges overlay tags into a segment's tag set. Known interacting keys resolve deterministically
/// regardless of application order; everything else is last-write-wins (a source ambiguity we
/// preserve, not a deliberate general contract).
pub fn merge_overlay(existing: &mut Tags, incoming: &Tags, direction: Option<Direction>) {
    for (k, v) in incoming.inner() {
        match k.as_str() {
            // A motorway flag promotes the existing classification instead of overwriting it, so
            // ramps stay links.
            "highway" if v == "motorway" => {
                let promoted = match existing.get("highway") {
                    Some(h) if h.ends_with("_link") => "motorway_link",
                    _ => "motorway",
                };
                existing.insert("highway", promoted);
            }
            // Roundabouts don't carry the street name
            "name" if existing.is("junction", "roundabout") => {}
            "maxspeed" => {
                // Not signed on minor roads
                if matches!(
                    existing.get("highway"),
                    Some("service") | Some("track") | Some("cycleway") | Some("footway")
                ) {
                    continue;
                }
                match direction {
                    None => existing.insert("maxspeed", v.clone()),
                    // On a one-way there's only one direction of travel, and the overlay engine
                    // already dropped records that run against it, so the qualifier is redundant.
                    Some(_) if existing.is("oneway", "yes") => {
                        existing.insert("maxspeed", v.clone());
                    }
                    Some(dir) => {
                        let (this, other) = match dir {
                            Direction::Forward => ("maxspeed:forward", "maxspeed:backward"),
                            Direction::Backward => ("maxspeed:backward", "maxspeed:forward"),
                        };
                        // Collapse to a single key once both directions agree
                        if existing.get(other) == Some(v.as_str()) {
                            existing.remove(other);
                            existing.insert("maxspeed", v.clone());
                        } else {
                            existing.insert(this, v.clone());
                        }
                    }
                }
            }
            // Bridge/tunnel attributes only confirm what the base geometry's medium already said;
            // they never introduce a structure on a surface link.
            "bridge" | "tunnel" | "layer" => {
                if existing.contains_key("bridge") || existing.contains_key("tunnel") {
                    existing.insert(k.clone(), v.clone());
                }
            }
            "bridge:name" if !existing.contains_key("bridge") => {}
            "tunnel:name" if !existing.contains_key("tunnel") => {}
            _ => {
                existing.insert(k.clone(), v.clone());
            }
        }
    }
}
