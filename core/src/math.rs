//! Math type aliases and helper functions for editor transforms.
//!
//! All types are f32, matching what the rest of the editor stores.

pub use nalgebra;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Quaternion (f32). Stored as `[x, y, z, w]` in memory;
/// `Quaternion::new` takes `(w, x, y, z)`.
pub type Quat = nalgebra::Quaternion<f32>;

/// The identity rotation.
pub fn quat_identity() -> Quat {
    Quat::new(1.0, 0.0, 0.0, 0.0)
}

/// Rotation of `angle` radians around the Y (up) axis.
pub fn quat_from_rotation_y(angle: f32) -> Quat {
    *nalgebra::UnitQuaternion::from_axis_angle(&nalgebra::Vector3::y_axis(), angle).quaternion()
}

/// Build a 4x4 TRS matrix from scale, rotation (quaternion), and translation.
pub fn mat4_from_scale_rotation_translation(
    scale: Vec3,
    rotation: Quat,
    translation: Vec3,
) -> Mat4 {
    let r = nalgebra::UnitQuaternion::new_unchecked(rotation);
    let m = r.to_rotation_matrix();
    let rm = m.matrix();
    #[rustfmt::skip]
    let result = Mat4::new(
        rm[(0, 0)] * scale.x, rm[(0, 1)] * scale.y, rm[(0, 2)] * scale.z, translation.x,
        rm[(1, 0)] * scale.x, rm[(1, 1)] * scale.y, rm[(1, 2)] * scale.z, translation.y,
        rm[(2, 0)] * scale.x, rm[(2, 1)] * scale.y, rm[(2, 2)] * scale.z, translation.z,
        0.0,                  0.0,                  0.0,                  1.0,
    );
    result
}

/// Distance from `point` to the segment `a..b`.
///
/// Degenerate segments (`a == b`) measure the distance to `a`.
pub fn distance_to_segment(point: Vec3, a: Vec3, b: Vec3) -> f32 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq <= f32::EPSILON {
        return (point - a).norm();
    }
    let t = ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (point - (a + ab * t)).norm()
}

/// Midpoint of the segment `a..b`.
pub fn midpoint(a: Vec3, b: Vec3) -> Vec3 {
    (a + b) * 0.5
}
