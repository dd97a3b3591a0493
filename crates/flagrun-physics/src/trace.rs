//! Segment traces against body outlines, used for hitscan shots.

use glam::Vec2;

use crate::body::Body;

/// A body crossed by a traced segment and the points where it was crossed.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceHit {
    /// Id of the crossed body.
    pub id: i32,
    /// Crossing points on the body outline, in edge order (left, bottom, right, top).
    pub points: Vec<Vec2>,
}

/// Intersection point of segments `a0..a1` and `b0..b1`.
///
/// Parallel segments never intersect, and a crossing exactly at either end of
/// `a0..a1` is ignored.
pub fn segment_intersection(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> Option<Vec2> {
    let r = a1 - a0;
    let s = b1 - b0;
    let denom = r.perp_dot(s);
    if denom == 0.0 {
        return None;
    }

    let offset = b0 - a0;
    let t = offset.perp_dot(s) / denom;
    let u = offset.perp_dot(r) / denom;

    if t <= 0.0 || t >= 1.0 || !(0.0..=1.0).contains(&u) {
        return None;
    }

    Some(a0 + r * t)
}

/// Every solid body crossed by the segment from `origin` to `origin + direction`.
///
/// The body with id `ignore` (usually the shooter) is skipped.
pub fn trace_segment(origin: Vec2, direction: Vec2, bodies: &[Body], ignore: i32) -> Vec<TraceHit> {
    let end = origin + direction;
    let mut hits = Vec::new();

    for body in bodies {
        if body.id == ignore || !body.solid {
            continue;
        }

        let min = body.position - body.size / 2.0;
        let max = body.position + body.size / 2.0;
        let edges = [
            (Vec2::new(min.x, min.y), Vec2::new(min.x, max.y)),
            (Vec2::new(min.x, min.y), Vec2::new(max.x, min.y)),
            (Vec2::new(max.x, min.y), Vec2::new(max.x, max.y)),
            (Vec2::new(min.x, max.y), Vec2::new(max.x, max.y)),
        ];

        let points: Vec<Vec2> = edges
            .iter()
            .filter_map(|&(e0, e1)| segment_intersection(origin, end, e0, e1))
            .collect();

        if !points.is_empty() {
            hits.push(TraceHit {
                id: body.id,
                points,
            });
        }
    }

    hits
}
