//! The decoded NVDB feed. Upstream retrieval and JSON decoding are not our problem; by the time
//! records get here, they're fully materialized structs, processed strictly in arrival order.
//!
//! The source data encodes lots of things as single-letter or numeric codes. Those all become
//! enums here, so the big branch tables in tag derivation are compiler-checked.

use serde::{Deserialize, Serialize};

/// One page-worth of decoded records.
#[derive(Debug, Default, Deserialize)]
pub struct Feed {
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub attributes: Vec<AttributeRecord>,
    #[serde(default)]
    pub restrictions: Vec<RestrictionRecord>,
}

/// A raw road-link record: one piece of centerline geometry with its position in two
/// linear-reference systems.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkRecord {
    pub id: i64,
    /// The raw linear-reference system native to this physical link.
    pub sequence_id: i64,
    pub sequence_start: f64,
    pub sequence_end: f64,
    /// The coarser super-sequence some attributes are positioned against. Missing when the link
    /// has no super-sequence; the sequence fields apply then.
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub parent_start: Option<f64>,
    #[serde(default)]
    pub parent_end: Option<f64>,
    pub start_node: i64,
    pub end_node: i64,
    /// (lon, lat) pairs
    pub geometry: Vec<(f64, f64)>,
    /// Lane codes, "#"-separated, like "1#2" or "1K#2K#3V"
    #[serde(default)]
    pub lanes: Option<String>,
    #[serde(default)]
    pub medium: Medium,
    pub class: LinkClass,
    /// Synthetic connector links at junctions carry no tags of their own
    #[serde(default)]
    pub connection: bool,
    #[serde(default)]
    pub category: Option<RoadCategory>,
    #[serde(default)]
    pub road_number: Option<u32>,
    /// Section number within the road; ramps and roundabouts live in reserved ranges
    #[serde(default)]
    pub section: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Where the link physically runs. Bridges and tunnels come from this, not from any explicit tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Medium {
    OnGround,
    InBuilding,
    InAir,
    UnderGround,
    UnderSeaBottom,
    UnderGlacier,
    Unknown,
}

impl From<String> for Medium {
    fn from(code: String) -> Medium {
        match code.as_str() {
            "T" => Medium::OnGround,
            "B" => Medium::InBuilding,
            "L" => Medium::InAir,
            "U" => Medium::UnderGround,
            "W" => Medium::UnderSeaBottom,
            "J" => Medium::UnderGlacier,
            _ => Medium::Unknown,
        }
    }
}

impl Default for Medium {
    fn default() -> Medium {
        Medium::OnGround
    }
}

/// Coarse link classification, gating way-merging and restriction traversal. Stored on every
/// segment, so it serializes along with the rest of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LinkClass {
    Carriageway,
    Ramp,
    Roundabout,
    CycleOrFootway,
    Ferry,
    Unknown,
}

impl From<String> for LinkClass {
    fn from(code: String) -> LinkClass {
        match code.as_str() {
            "carriageway" => LinkClass::Carriageway,
            "ramp" => LinkClass::Ramp,
            "roundabout" => LinkClass::Roundabout,
            "cycle_or_footway" => LinkClass::CycleOrFootway,
            "ferry" => LinkClass::Ferry,
            _ => LinkClass::Unknown,
        }
    }
}

impl From<LinkClass> for String {
    fn from(class: LinkClass) -> String {
        match class {
            LinkClass::Carriageway => "carriageway",
            LinkClass::Ramp => "ramp",
            LinkClass::Roundabout => "roundabout",
            LinkClass::CycleOrFootway => "cycle_or_footway",
            LinkClass::Ferry => "ferry",
            LinkClass::Unknown => "unknown",
        }
        .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RoadCategory {
    /// European trunk route
    Europe,
    /// National road
    National,
    /// County road
    County,
    /// Municipal road
    Municipal,
    /// Private road
    Private,
    /// Forestry track
    Forest,
    Unknown,
}

impl From<String> for RoadCategory {
    fn from(code: String) -> RoadCategory {
        match code.as_str() {
            "E" => RoadCategory::Europe,
            "R" => RoadCategory::National,
            "F" => RoadCategory::County,
            "K" => RoadCategory::Municipal,
            "P" => RoadCategory::Private,
            "S" => RoadCategory::Forest,
            _ => RoadCategory::Unknown,
        }
    }
}

/// Direction of travel relative to the link's digitized direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

/// A road-attribute record, positioned on a parent (or raw sequence) linear reference.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeRecord {
    /// Parent id when the link has a super-sequence, else the raw sequence id
    pub reference_id: i64,
    #[serde(flatten)]
    pub location: AttributeLocation,
    /// Some attributes only apply travelling one way
    #[serde(default)]
    pub direction: Option<Direction>,
    pub attribute: AttributeKind,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum AttributeLocation {
    Line { range_start: f64, range_end: f64 },
    Point { position: f64 },
}

/// What the attribute record says. This is the already-classified input to tag derivation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeKind {
    SpeedLimit { kmh: u16 },
    StreetName { name: String },
    Motorway,
    MotorRoad,
    Tunnel { name: Option<String> },
    Bridge { name: Option<String> },
    NoMotorVehicles,
    Crossing { signals: bool },
    TrafficSignals,
    Barrier { barrier: BarrierKind },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum BarrierKind {
    Bollard,
    SwingGate,
    CycleBarrier,
    LiftGate,
    BusTrap,
    Unknown,
}

impl From<String> for BarrierKind {
    fn from(code: String) -> BarrierKind {
        match code.as_str() {
            "bollard" => BarrierKind::Bollard,
            "swing_gate" => BarrierKind::SwingGate,
            "cycle_barrier" => BarrierKind::CycleBarrier,
            "lift_gate" => BarrierKind::LiftGate,
            "bus_trap" => BarrierKind::BusTrap,
            _ => BarrierKind::Unknown,
        }
    }
}

/// A turn restriction, located by the linear references of its endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RestrictionRecord {
    pub from_ref: i64,
    pub to_ref: i64,
    /// Hint only; the resolver prefers the bearing discontinuity it finds itself
    #[serde(default)]
    pub via_node: Option<i64>,
}

/// One lane code from the "#"-separated lane string. Odd-numbered lanes travel in the digitized
/// direction, even-numbered lanes against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneCode {
    pub number: u32,
    pub modifier: Option<LaneModifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneModifier {
    /// "V": turn lane left
    TurnLeft,
    /// "H": turn lane right
    TurnRight,
    /// "K": public transport lane
    Psv,
    /// "S": cycle lane
    Cycle,
}

impl LaneCode {
    pub fn forward(self) -> bool {
        self.number % 2 == 1
    }
}

/// Parses a lane string like "1#2" or "3V#1#2K". Unparseable codes are dropped; the caller
/// reports on an empty result.
pub fn parse_lane_codes(raw: &str) -> Vec<LaneCode> {
    let mut codes = Vec::new();
    for code in raw.split('#') {
        let digits: String = code.chars().take_while(|c| c.is_ascii_digit()).collect();
        let rest = &code[digits.len()..];
        let number = match digits.parse::<u32>() {
            Ok(n) => n,
            Err(_) => {
                continue;
            }
        };
        let modifier = match rest.to_uppercase().as_str() {
            "" => None,
            "V" => Some(LaneModifier::TurnLeft),
            "H" => Some(LaneModifier::TurnRight),
            "K" => Some(LaneModifier::Psv),
            "S" => Some(LaneModifier::Cycle),
            _ => None,
        };
        codes.push(LaneCode { number, modifier });
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_codes() {
        assert_eq!(
            parse_lane_codes("1#2"),
            vec![
                LaneCode {
                    number: 1,
                    modifier: None
                },
                LaneCode {
                    number: 2,
                    modifier: None
                }
            ]
        );
        let codes = parse_lane_codes("3V#1#2K");
        assert_eq!(codes.len(), 3);
        assert_eq!(codes[0].modifier, Some(LaneModifier::TurnLeft));
        assert!(codes[0].forward());
        assert!(!codes[2].forward());
        assert_eq!(codes[2].modifier, Some(LaneModifier::Psv));
    }

    #[test]
    fn lane_codes_garbage() {
        assert!(parse_lane_codes("x#y").is_empty());
    }

    #[test]
    fn attribute_location_untagged() {
        let line: AttributeRecord = serde_json::from_str(
            r#"{"reference_id": 7, "range_start": 0.1, "range_end": 0.5,
                "attribute": {"kind": "motorway"}}"#,
        )
        .unwrap();
        assert!(matches!(line.location, AttributeLocation::Line { .. }));

        let pt: AttributeRecord = serde_json::from_str(
            r#"{"reference_id": 7, "position": 0.3,
                "attribute": {"kind": "traffic_signals"}}"#,
        )
        .unwrap();
        assert!(matches!(pt.location, AttributeLocation::Point { .. }));
    }

    #[test]
    fn unknown_codes_fall_back() {
        let medium: Medium = serde_json::from_str("\"Q\"").unwrap();
        assert_eq!(medium, Medium::Unknown);
        let cat: RoadCategory = serde_json::from_str("\"Z\"").unwrap();
        assert_eq!(cat, RoadCategory::Unknown);
    }
}
