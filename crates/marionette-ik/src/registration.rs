//! Closed-form rigid rotation registration (FA3R).
//!
//! Finds the rotation best aligning two ordered sets of corresponding
//! vectors in the least-squares sense. Instead of an SVD-based Procrustes
//! solve, the rotation is extracted from the cross-covariance matrix with a
//! fixed number of damped cross-product iterations, branch-free and cheap
//! enough to run once per solver frame.

use nalgebra::{Matrix3, Rotation3, Unit, UnitQuaternion, Vector3};

use marionette_core::math;

/// Fixed-point iteration count. Convergence is quadratic; ten steps land
/// well below f32 resolution for non-degenerate inputs.
const ITERATIONS: usize = 10;

/// Best-fit rotation taking each `sources[i]` onto `targets[i]`.
///
/// Both sets are expected to be centroid-subtracted already. `weights`, if
/// given, must be the same length as the point sets; missing weights mean
/// uniform weighting. Mismatched lengths are truncated to the shorter set.
///
/// Special cases: zero correspondences yield the identity; a single
/// correspondence yields the shortest-arc rotation between the pair.
#[must_use]
pub fn fit_rotation(
    sources: &[Vector3<f32>],
    targets: &[Vector3<f32>],
    weights: Option<&[f32]>,
) -> UnitQuaternion<f32> {
    let n = sources.len().min(targets.len());
    match n {
        0 => UnitQuaternion::identity(),
        1 => math::shortest_arc(&sources[0], &targets[0]),
        _ => {
            // Weighted cross-covariance of the correspondence set.
            let mut covariance = Matrix3::zeros();
            for i in 0..n {
                let w = weights.map_or(1.0, |ws| ws.get(i).copied().unwrap_or(1.0));
                covariance += targets[i] * sources[i].transpose() * w;
            }
            orthogonalize(&covariance)
        }
    }
}

/// Weighted sum of per-pair residual magnitudes raised to `power`.
///
/// `power` 2.0 gives the classic sum of squared residuals; the tree solver
/// uses this to reject fits that do not actually improve alignment.
#[must_use]
pub fn residual(
    sources: &[Vector3<f32>],
    targets: &[Vector3<f32>],
    rotation: &UnitQuaternion<f32>,
    weights: Option<&[f32]>,
    power: f32,
) -> f32 {
    let n = sources.len().min(targets.len());
    (0..n)
        .map(|i| {
            let w = weights.map_or(1.0, |ws| ws.get(i).copied().unwrap_or(1.0));
            w * (targets[i] - rotation * sources[i]).norm().powf(power)
        })
        .sum()
}

/// Extract the orthogonal polar factor of `m` as a rotation.
///
/// Damped fixed-point iteration over the matrix rows: each step replaces a
/// row with the damped sum of itself and the cross product of the other
/// two, pulling the row basis toward orthogonality while the damping factor
/// `k = 2 / (sum of squared row norms + 1)` keeps the scale bounded.
fn orthogonalize(m: &Matrix3<f32>) -> UnitQuaternion<f32> {
    let mut r1: Vector3<f32> = m.row(0).transpose();
    let mut r2: Vector3<f32> = m.row(1).transpose();
    let mut r3: Vector3<f32> = m.row(2).transpose();

    for _ in 0..ITERATIONS {
        let k = 2.0 / (r1.norm_squared() + r2.norm_squared() + r3.norm_squared() + 1.0);
        let n1 = (r1 + r2.cross(&r3)) * k;
        let n2 = (r2 + r3.cross(&r1)) * k;
        let n3 = (r3 + r1.cross(&r2)) * k;
        r1 = n1;
        r2 = n2;
        r3 = n3;
    }

    // Renormalize into a right-handed orthonormal basis. Degenerate inputs
    // (rank-deficient covariance) fall back to the identity.
    let Some(b1) = Unit::try_new(r1, math::EPSILON) else {
        return UnitQuaternion::identity();
    };
    let r2 = r2 - b1.into_inner() * r2.dot(&b1.into_inner());
    let Some(b2) = Unit::try_new(r2, math::EPSILON) else {
        return UnitQuaternion::identity();
    };
    let b3 = b1.cross(&b2.into_inner());

    let basis = Matrix3::from_rows(&[b1.transpose(), b2.transpose(), b3.transpose()]);
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
