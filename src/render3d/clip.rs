//! Sutherland–Hodgman polygon clipping against an axis-aligned box, used by
//! [`SubCube`](super::subcube::SubCube) to compute view-aligned slice
//! polygons through a 3D texture (spec §4.4 "clips the sub-cube against the
//! view frustum using a polygon-clipping step").

use glam::Vec3;

/// Clips a convex polygon (vertices in order, coplanar) against the
/// half-space `dot(n, p - plane_point) <= 0`.
fn clip_against_plane(poly: &[Vec3], plane_point: Vec3, n: Vec3) -> Vec<Vec3> {
    if poly.is_empty() {
        return Vec::new();
    }
    let side = |p: Vec3| n.dot(p - plane_point);
    let mut out = Vec::with_capacity(poly.len() + 1);
    for i in 0..poly.len() {
        let cur = poly[i];
        let next = poly[(i + 1) % poly.len()];
        let cur_in = side(cur) <= 0.0;
        let next_in = side(next) <= 0.0;
        if cur_in {
            out.push(cur);
        }
        if cur_in != next_in {
            let d = next - cur;
            let denom = n.dot(d);
            if denom.abs() > f32::EPSILON {
                let t = -side(cur) / denom;
                out.push(cur + d * t.clamp(0.0, 1.0));
            }
        }
    }
    out
}

/// The polygon `box_min..=box_max ∩ plane(plane_point, plane_normal)`, or an
/// empty vec if the plane misses the box. `plane_normal` need not be
/// normalized for the half-space test but is normalized internally when
/// building the seed polygon.
#[must_use]
pub fn box_plane_cross_section(box_min: Vec3, box_max: Vec3, plane_point: Vec3, plane_normal: Vec3) -> Vec<Vec3> {
    let n = plane_normal.normalize_or_zero();
    if n == Vec3::ZERO {
        return Vec::new();
    }
    let helper = if n.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    let u = helper.cross(n).normalize();
    let v = n.cross(u);
    // A quad in the cutting plane large enough to cover the whole box,
    // regardless of orientation: the box's space diagonal bounds it.
    let radius = (box_max - box_min).length().max(1.0);
    let mut poly = vec![
        plane_point + (u + v) * radius,
        plane_point + (v - u) * radius,
        plane_point - (u + v) * radius,
        plane_point + (u - v) * radius,
    ];

    let planes: [(Vec3, Vec3); 6] = [
        (box_min, Vec3::NEG_X),
        (box_max, Vec3::X),
        (box_min, Vec3::NEG_Y),
        (box_max, Vec3::Y),
        (box_min, Vec3::NEG_Z),
        (box_max, Vec3::Z),
    ];
    for (p, face_n) in planes {
        poly = clip_against_plane(&poly, p, face_n);
        if poly.is_empty() {
            break;
        }
    }
    poly
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_section_through_unit_cube_center_is_square() {
        let poly = box_plane_cross_section(Vec3::ZERO, Vec3::ONE, Vec3::splat(0.5), Vec3::Z);
        assert_eq!(poly.len(), 4);
        for p in &poly {
            assert!((p.z - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn plane_outside_box_yields_empty_polygon() {
        let poly = box_plane_cross_section(Vec3::ZERO, Vec3::ONE, Vec3::splat(5.0), Vec3::Z);
        assert!(poly.is_empty());
    }

    #[test]
    fn diagonal_plane_through_corner_yields_triangle() {
        let poly = box_plane_cross_section(Vec3::ZERO, Vec3::ONE, Vec3::splat(0.01), Vec3::ONE);
        assert_eq!(poly.len(), 3);
    }
}
