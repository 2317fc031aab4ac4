//! Ramer-Douglas-Peucker pass over segment geometry. Points carrying overlay tags (crossings,
//! barriers) must survive, so each segment is simplified one tag-delimited run at a time.

use geom::{Distance, LonLat};

use crate::network::{polyline_length, Point, RoadNetwork};

pub fn simplify_network(network: &mut RoadNetwork, epsilon: Distance) {
    if epsilon <= Distance::ZERO {
        return;
    }
    let mut before = 0;
    let mut after = 0;
    for segment in network.segments.values_mut() {
        before += segment.geometry.len();
        segment.geometry = simplify_points(std::mem::take(&mut segment.geometry), epsilon);
        after += segment.geometry.len();
        segment.length = polyline_length(&segment.geometry);
    }
    info!("Simplified geometry from {} points to {}", before, after);
}

fn simplify_points(points: Vec<Point>, epsilon: Distance) -> Vec<Point> {
    if points.len() <= 2 {
        return points;
    }

    let mut result: Vec<Point> = Vec::new();
    let mut run_start = 0;
    for i in 1..points.len() {
        // Runs end at tagged points and at the final endpoint
        if i < points.len() - 1 && points[i].tags.is_empty() {
            continue;
        }
        if polyline_length(&points[run_start..=i]) == Distance::ZERO {
            warn!("Zero-length geometry run, leaving it unsimplified");
            if result.is_empty() {
                result.push(points[run_start].clone());
            }
            result.extend(points[run_start + 1..=i].iter().cloned());
            run_start = i;
            continue;
        }
        let run: Vec<LonLat> = points[run_start..=i].iter().map(|p| p.pt).collect();
        let kept = geom::simplify(&run, epsilon);
        if result.is_empty() {
            result.push(points[run_start].clone());
        }
        // Interior survivors never carry tags, so plain points suffice
        for pt in &kept[1..kept.len() - 1] {
            result.push(Point::new(*pt));
        }
        result.push(points[i].clone());
        run_start = i;
    }
    result
}
