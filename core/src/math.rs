//! Math type aliases and small vector helpers shared by the engine and the
//! materializer.

pub use nalgebra;

/// 2D vector (f32).
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// Build a [`Vec3`] from the first three floats of a sample record.
#[inline]
pub fn vec3_from_slice(data: &[f32]) -> Vec3 {
    Vec3::new(data[0], data[1], data[2])
}

/// Normalize `v` in place, leaving zero-length vectors untouched.
///
/// Returns the original length.
pub fn normalize_or_zero(v: &mut Vec3) -> f32 {
    let len = v.norm();
    if len > f32::EPSILON {
        *v /= len;
    }
    len
}

/// Quad normal from the two diagonals, `cross(d - b, c - a)`, normalized.
///
/// Corners are in `a, b, c, d` order around the quad.
pub fn quad_normal(a: &Vec3, b: &Vec3, c: &Vec3, d: &Vec3) -> Vec3 {
    let mut n = (d - b).cross(&(c - a));
    normalize_or_zero(&mut n);
    n
}

/// Convert a unit normal into the packed signed-short representation.
#[inline]
pub fn normal_float_to_short(n: &Vec3) -> [i16; 3] {
    [
        (n.x * 32767.0) as i16,
        (n.y * 32767.0) as i16,
        (n.z * 32767.0) as i16,
    ]
}

/// Convert a packed signed-short normal back to floats.
#[inline]
pub fn normal_short_to_float(n: [i16; 3]) -> Vec3 {
    Vec3::new(
        n[0] as f32 / 32767.0,
        n[1] as f32 / 32767.0,
        n[2] as f32 / 32767.0,
    )
}

/// Grow the `(min, max)` bounds to include `p`.
pub fn minmax_v3(p: &Vec3, min: &mut Vec3, max: &mut Vec3) {
    for i in 0..3 {
        min[i] = min[i].min(p[i]);
        max[i] = max[i].max(p[i]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_normal_diagonal_order() {
        // a, b, c, d counter-clockwise in XY reads as a clockwise a, d, c, b face.
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        let c = Vec3::new(1.0, 1.0, 0.0);
        let d = Vec3::new(0.0, 1.0, 0.0);
        let n = quad_normal(&a, &b, &c, &d);
        assert!((n - Vec3::new(0.0, 0.0, -1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_normal_short_roundtrip() {
        let n = Vec3::new(0.0, 0.6, 0.8);
        let back = normal_short_to_float(normal_float_to_short(&n));
        assert!((back - n).norm() < 1e-3);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = Vec3::zeros();
        assert_eq!(normalize_or_zero(&mut v), 0.0);
        assert_eq!(v, Vec3::zeros());
    }
}
