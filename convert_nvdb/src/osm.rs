//! OSM XML serialization of the finished network. All output elements get fresh negative,
//! decreasing ids: junction nodes first, then interior way nodes, then ways, then restriction
//! relations.

use std::collections::BTreeMap;
use std::io::{BufWriter, Write};

use anyhow::Result;

use geom::LonLat;

use crate::network::{NodeId, RoadNetwork, SegmentId};
use crate::restrictions::TurnRestriction;
use crate::tags::Tags;
use crate::ways::Way;

struct IdGen(i64);

impl IdGen {
    fn next(&mut self) -> i64 {
        let id = self.0;
        self.0 -= 1;
        id
    }
}

pub fn write_osm(
    path: &str,
    network: &RoadNetwork,
    ways: &[Way],
    restrictions: &[TurnRestriction],
) -> Result<()> {
    let mut ids = IdGen(-1);
    let mut junction_ids: BTreeMap<NodeId, i64> = BTreeMap::new();
    let mut junction_nodes: Vec<(i64, LonLat, Tags)> = Vec::new();
    let mut interior_nodes: Vec<(i64, LonLat, Tags)> = Vec::new();
    let mut way_elements: Vec<(i64, Vec<i64>, &Tags)> = Vec::new();
    let mut segment_way: BTreeMap<SegmentId, i64> = BTreeMap::new();

    for way in ways {
        let way_id = ids.next();
        let first = &network.segments[&way.segments[0]];
        let mut refs = vec![junction_id(
            network,
            &mut ids,
            &mut junction_ids,
            &mut junction_nodes,
            first.start_node,
        )];
        for &sid in &way.segments {
            let segment = &network.segments[&sid];
            for point in &segment.geometry[1..segment.geometry.len() - 1] {
                let id = ids.next();
                interior_nodes.push((id, point.pt, point.tags.clone()));
                refs.push(id);
            }
            refs.push(junction_id(
                network,
                &mut ids,
                &mut junction_ids,
                &mut junction_nodes,
                segment.end_node,
            ));
            segment_way.insert(sid, way_id);
        }
        way_elements.push((way_id, refs, &way.tags));
    }

    let mut out = BufWriter::new(fs_err::File::create(path)?);
    writeln!(out, "<?xml version='1.0' encoding='UTF-8'?>")?;
    writeln!(
        out,
        "<osm version=\"0.6\" generator=\"convert_nvdb\" upload=\"false\">"
    )?;

    for (id, pt, tags) in junction_nodes.iter().chain(interior_nodes.iter()) {
        if tags.is_empty() {
            writeln!(
                out,
                "  <node id=\"{}\" action=\"modify\" visible=\"true\" lat=\"{:.7}\" lon=\"{:.7}\" />",
                id, pt.latitude, pt.longitude
            )?;
        } else {
            writeln!(
                out,
                "  <node id=\"{}\" action=\"modify\" visible=\"true\" lat=\"{:.7}\" lon=\"{:.7}\">",
                id, pt.latitude, pt.longitude
            )?;
            write_tags(&mut out, tags)?;
            writeln!(out, "  </node>")?;
        }
    }

    for (id, refs, tags) in &way_elements {
        writeln!(
            out,
            "  <way id=\"{}\" action=\"modify\" visible=\"true\">",
            id
        )?;
        for r in refs {
            writeln!(out, "    <nd ref=\"{}\" />", r)?;
        }
        write_tags(&mut out, tags)?;
        writeln!(out, "  </way>")?;
    }

    let mut relations = 0;
    for restriction in restrictions {
        let (from, to, via) = match (
            segment_way.get(&restriction.from),
            segment_way.get(&restriction.to),
            junction_ids.get(&restriction.via),
        ) {
            (Some(f), Some(t), Some(v)) => (*f, *t, *v),
            _ => {
                warn!(
                    "Restriction {:?} references elements missing from the output, skipping",
                    restriction
                );
                continue;
            }
        };
        writeln!(
            out,
            "  <relation id=\"{}\" action=\"modify\" visible=\"true\">",
            ids.next()
        )?;
        writeln!(out, "    <member type=\"way\" ref=\"{}\" role=\"from\" />", from)?;
        writeln!(out, "    <member type=\"way\" ref=\"{}\" role=\"to\" />", to)?;
        writeln!(out, "    <member type=\"node\" ref=\"{}\" role=\"via\" />", via)?;
        writeln!(out, "    <tag k=\"type\" v=\"restriction\" />")?;
        writeln!(
            out,
            "    <tag k=\"restriction\" v=\"{}\" />",
            restriction.kind.as_str()
        )?;
        if restriction.ambiguous {
            writeln!(out, "    <tag k=\"fixme\" v=\"Verify restriction type\" />")?;
        }
        writeln!(out, "  </relation>")?;
        relations += 1;
    }

    writeln!(out, "</osm>")?;
    out.flush()?;
    info!(
        "Wrote {} nodes, {} ways, {} relations to {}",
        junction_nodes.len() + interior_nodes.len(),
        way_elements.len(),
        relations,
        path
    );
    Ok(())
}

fn junction_id(
    network: &RoadNetwork,
    ids: &mut IdGen,
    assigned: &mut BTreeMap<NodeId, i64>,
    out: &mut Vec<(i64, LonLat, Tags)>,
    node: NodeId,
) -> i64 {
    if let Some(id) = assigned.get(&node) {
        return *id;
    }
    let id = ids.next();
    assigned.insert(node, id);
    let n = &network.nodes[&node];
    out.push((id, n.pt, n.tags.clone()));
    id
}

fn write_tags<W: Write>(out: &mut W, tags: &Tags) -> Result<()> {
    for (k, v) in tags.inner() {
        writeln!(out, "    <tag k=\"{}\" v=\"{}\" />", escape(k), escape(v))?;
    }
    Ok(())
}

fn escape(v: &str) -> String {
    v.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
