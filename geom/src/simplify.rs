use crate::{line_distance, Distance, LonLat};

/// Ramer-Douglas-Peucker simplification. Keeps the endpoints; interior points survive only if they
/// deviate at least `epsilon` from the simplified line.
///
/// Callers must split their polyline into runs strictly between tag-bearing points and simplify
/// each run independently -- this function has no idea which points carry tags.
pub fn simplify(pts: &[LonLat], epsilon: Distance) -> Vec<LonLat> {
    if epsilon <= Distance::ZERO || pts.len() <= 2 {
        return pts.to_vec();
    }

    let mut dmax = Distance::ZERO;
    let mut index = 0;
    for i in 1..pts.len() - 1 {
        let d = line_distance(pts[0], pts[pts.len() - 1], pts[i]);
        if d > dmax {
            index = i;
            dmax = d;
        }
    }

    if dmax >= epsilon {
        let mut result = simplify(&pts[..=index], epsilon);
        result.pop();
        result.extend(simplify(&pts[index..], epsilon));
        result
    } else {
        vec![pts[0], pts[pts.len() - 1]]
    }
}
