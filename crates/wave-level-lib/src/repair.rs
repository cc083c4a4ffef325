//! Geometry repair
//!
//! Turns self-intersecting or otherwise invalid polygons into valid ones with the same
//! covered area. Each ring is noded at its own crossings and cut into simple loops; the
//! loops are then dissolved through a boolean union (the zero-width-buffer trick) and the
//! holes subtracted. Valid input is returned untouched, so repairing twice is the same as
//! repairing once.
//!
//! Repair is best-effort: when the rebuild cannot produce a valid, non-empty result, or the
//! result covers less than the largest simple loop of the input, the original geometry is
//! kept and downstream operations work on it as-is.

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{
    Area, BooleanOps, Coord, Line, LineString, MultiPolygon, Polygon, RemoveRepeatedPoints,
    Validation, unary_union,
};
use std::collections::HashMap;

/// Relative slack allowed when comparing the repaired area to its lower bound
const AREA_TOLERANCE: f64 = 1e-9;

/// Repair a polygonal geometry if it is invalid
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn repair(geometry: MultiPolygon<f64>) -> MultiPolygon<f64> {
    if geometry.is_valid() {
        return geometry;
    }

    // Degenerate zero-length edges are the cheapest fix
    let deduped = geometry.remove_repeated_points();
    if deduped.is_valid() {
        return deduped;
    }

    match rebuild(&deduped) {
        Some(repaired) => repaired,
        None => geometry,
    }
}

/// Rebuild every polygon from the simple loops of its rings
fn rebuild(geometry: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    let mut parts: Vec<Polygon<f64>> = Vec::new();
    // Any correct repair covers at least this much
    let mut min_area = 0.0_f64;

    for polygon in geometry {
        let shells = simple_loops(polygon.exterior());
        if shells.is_empty() {
            continue;
        }
        let holes: Vec<Polygon<f64>> = polygon.interiors().iter().flat_map(simple_loops).collect();

        let largest_shell = shells.iter().map(Area::unsigned_area).fold(0.0, f64::max);
        let hole_area: f64 = holes.iter().map(Area::unsigned_area).sum();
        min_area = min_area.max(largest_shell - hole_area);

        let shell = dissolve(shells);
        let part = if holes.is_empty() {
            shell
        } else {
            shell.difference(&dissolve(holes))
        };
        parts.extend(part.0);
    }

    let repaired = dissolve(parts);
    if repaired.0.is_empty() {
        tracing::debug!("Repair dissolved geometry to nothing, keeping original");
        return None;
    }
    if !repaired.is_valid() {
        tracing::debug!("Repair could not produce a valid geometry, keeping original");
        return None;
    }
    let area = repaired.unsigned_area();
    if area < min_area * (1.0 - AREA_TOLERANCE) {
        tracing::debug!(area, min_area, "Repair lost area, keeping original");
        return None;
    }

    Some(repaired)
}

/// Polygons as-is when they already form a valid multipolygon, their union otherwise
fn dissolve(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let candidate = MultiPolygon::new(polygons);
    if candidate.is_valid() {
        candidate
    } else {
        unary_union(candidate.0.iter())
    }
}

/// Node a ring at its self-crossings and cut it into simple closed loops
fn simple_loops(ring: &LineString<f64>) -> Vec<Polygon<f64>> {
    let mut coords = ring.0.clone();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    let n = coords.len();
    if n < 3 {
        return Vec::new();
    }

    let segments: Vec<Line<f64>> = (0..n)
        .map(|i| Line::new(coords[i], coords[(i + 1) % n]))
        .collect();

    // Crossing points per segment; both segments get the very same coordinate
    let mut splits: Vec<Vec<Coord<f64>>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue; // adjacent through the closing vertex
            }
            match line_intersection(segments[i], segments[j]) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    splits[i].push(intersection);
                    splits[j].push(intersection);
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    for end in [intersection.start, intersection.end] {
                        splits[i].push(end);
                        splits[j].push(end);
                    }
                }
                None => {}
            }
        }
    }

    let mut noded = Vec::with_capacity(n);
    for (segment, mut extra) in segments.iter().zip(splits) {
        noded.push(segment.start);
        extra.retain(|c| *c != segment.start && *c != segment.end);
        extra.sort_by(|a, b| {
            squared_distance(segment.start, *a).total_cmp(&squared_distance(segment.start, *b))
        });
        extra.dedup();
        noded.extend(extra);
    }

    // Every revisited vertex closes a loop
    let mut loops = Vec::new();
    let mut stack: Vec<Coord<f64>> = Vec::with_capacity(noded.len());
    let mut seen: HashMap<(u64, u64), usize> = HashMap::new();
    for coord in noded {
        match seen.get(&coord_key(coord)) {
            Some(&start) => {
                let mut cycle: Vec<Coord<f64>> = stack.drain(start + 1..).collect();
                for c in &cycle {
                    seen.remove(&coord_key(*c));
                }
                cycle.insert(0, coord);
                push_loop(&mut loops, cycle);
            }
            None => {
                seen.insert(coord_key(coord), stack.len());
                stack.push(coord);
            }
        }
    }
    push_loop(&mut loops, stack);

    loops
}

fn push_loop(loops: &mut Vec<Polygon<f64>>, cycle: Vec<Coord<f64>>) {
    if cycle.len() < 3 {
        return;
    }
    let polygon = Polygon::new(LineString::from(cycle), vec![]);
    if polygon.unsigned_area() > 0.0 {
        loops.push(polygon);
    }
}

#[inline]
fn coord_key(coord: Coord<f64>) -> (u64, u64) {
    // +0.0 folds negative zero into positive zero
    ((coord.x + 0.0).to_bits(), (coord.y + 0.0).to_bits())
}

#[inline]
fn squared_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let d = b - a;
    d.x * d.x + d.y * d.y
}
