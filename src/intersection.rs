use nalgebra::Vector2;

use crate::geometry::{BearingRay, GeoPoint};

// Relative tolerance below which two rays are treated as parallel
const PARALLEL_TOLERANCE: f64 = 1e-12;

fn to_plane(point: GeoPoint) -> Vector2<f64> {
    Vector2::new(point.lon, point.lat)
}

fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Crossing point of two bearing rays, treated as straight segments in the
/// (lon, lat) plane. Rays are a few kilometers long, so the planar
/// approximation is well below the accuracy of a field bearing.
pub fn intersect(ray_a: Option<&BearingRay>, ray_b: Option<&BearingRay>) -> Option<GeoPoint> {
    let (a, b) = (ray_a?, ray_b?);

    let p = to_plane(a.origin);
    let r = to_plane(a.end) - p;
    let q = to_plane(b.origin);
    let s = to_plane(b.end) - q;

    let denom = cross(&r, &s);
    // Also catches zero-length rays
    if denom.abs() <= PARALLEL_TOLERANCE * r.norm() * s.norm() {
        return None;
    }

    let qp = q - p;
    let t = cross(&qp, &s) / denom;
    let u = cross(&qp, &r) / denom;
    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }

    let hit = p + r * t;
    Some(GeoPoint::new(hit.y, hit.x))
}

/// Mean of several crossing points, used as the estimate for groups of more
/// than two simultaneous bearings.
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector2::zeros(), |acc: Vector2<f64>, p| acc + to_plane(*p));
    let mean = sum / points.len() as f64;
    Some(GeoPoint::new(mean.y, mean.x))
}
