use crate::tensor::*;
use crate::{FrameStyle, Multipole, MultipoleSite};

/// Builds the local → global rotation matrix of a site from the coordinates of one
/// symmetry image.
///
/// Columns are the local x, y, z basis vectors expressed in the global frame, so a
/// local vector transforms as `g = R·l`. For [`FrameStyle::None`] the identity is
/// returned.
pub fn frame_rotation(site: &MultipoleSite, coords: &[[f64; 3]]) -> [[f64; 3]; 3] {
    let ri = coords[site.index];

    let (z, x) = match site.frame {
        FrameStyle::None => {
            return [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        }
        FrameStyle::ZThenX => {
            let z = unit(&sub(&coords[site.axis[0]], &ri));
            let x = reject(&sub(&coords[site.axis[1]], &ri), &z);
            (z, x)
        }
        FrameStyle::Bisector => {
            let u = unit(&sub(&coords[site.axis[0]], &ri));
            let v = unit(&sub(&coords[site.axis[1]], &ri));
            let z = unit(&add(&u, &v));
            let x = reject(&v, &z);
            (z, x)
        }
        FrameStyle::ZThenBisector => {
            let z = unit(&sub(&coords[site.axis[0]], &ri));
            let u = unit(&sub(&coords[site.axis[1]], &ri));
            let v = unit(&sub(&coords[site.axis[2]], &ri));
            let bisector = unit(&add(&u, &v));
            let x = reject(&bisector, &z);
            (z, x)
        }
        FrameStyle::ThreeFold => {
            let u = unit(&sub(&coords[site.axis[0]], &ri));
            let v = unit(&sub(&coords[site.axis[1]], &ri));
            let w = unit(&sub(&coords[site.axis[2]], &ri));
            let z = unit(&add(&add(&u, &v), &w));
            let x = reject(&u, &z);
            (z, x)
        }
    };
    let y = cross(&z, &x);

    [
        [x[0], y[0], z[0]],
        [x[1], y[1], z[1]],
        [x[2], y[2], z[2]],
    ]
}

/// Rotates a site's local multipole into the global frame of one symmetry image.
///
/// For the Z-then-X style with a third referenced atom, the handedness of the frame is
/// checked against the current geometry and the y-odd local components are flipped when
/// the configuration is mirrored.
pub fn rotate_site(site: &MultipoleSite, coords: &[[f64; 3]]) -> Multipole {
    if site.frame.is_none() {
        let mut out = [0.0; 10];
        out[T000] = site.multipole[T000];
        return out;
    }

    let mut local = site.multipole;
    if site.frame.is_z_then_x() && site.axis.len() == 3 {
        let origin = coords[site.axis[2]];
        let ad = sub(&coords[site.index], &origin);
        let bd = sub(&coords[site.axis[0]], &origin);
        let cd = sub(&coords[site.axis[1]], &origin);
        if dot(&ad, &cross(&bd, &cd)) < 0.0 {
            local[T010] = -local[T010];
            local[T110] = -local[T110];
            local[T011] = -local[T011];
        }
    }

    let r = frame_rotation(site, coords);
    let mut out = [0.0; 10];
    out[T000] = local[T000];

    // Dipole: g = R·l.
    for i in 0..3 {
        out[T100 + i] =
            r[i][0] * local[T100] + r[i][1] * local[T010] + r[i][2] * local[T001];
    }

    // Quadrupole: G = R·Q·Rᵀ, unpacked through the full symmetric matrix.
    let q = [
        [local[T200], local[T110], local[T101]],
        [local[T110], local[T020], local[T011]],
        [local[T101], local[T011], local[T002]],
    ];
    let mut rq = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            rq[i][j] = r[i][0] * q[0][j] + r[i][1] * q[1][j] + r[i][2] * q[2][j];
        }
    }
    let mut g = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            g[i][j] = rq[i][0] * r[j][0] + rq[i][1] * r[j][1] + rq[i][2] * r[j][2];
        }
    }
    out[T200] = g[0][0];
    out[T020] = g[1][1];
    out[T002] = g[2][2];
    out[T110] = g[0][1];
    out[T101] = g[0][2];
    out[T011] = g[1][2];

    out
}

fn sub(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn unit(a: &[f64; 3]) -> [f64; 3] {
    let n = dot(a, a).sqrt();
    [a[0] / n, a[1] / n, a[2] / n]
}

/// The unit component of `a` orthogonal to the unit vector `z`.
fn reject(a: &[f64; 3], z: &[f64; 3]) -> [f64; 3] {
    let p = dot(a, z);
    unit(&[a[0] - p * z[0], a[1] - p * z[1], a[2] - p * z[2]])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tensor::quadrupole_trace;

    fn water_coords() -> Vec<[f64; 3]> {
        // O at origin, hydrogens in the xz plane.
        vec![
            [0.0, 0.0, 0.0],
            [0.7586, 0.0, 0.5043],
            [-0.7586, 0.0, 0.5043],
        ]
    }

    fn orthonormal(r: &[[f64; 3]; 3]) -> bool {
        let mut max = 0.0f64;
        for i in 0..3 {
            for j in 0..3 {
                let mut s = 0.0;
                for k in 0..3 {
                    s += r[k][i] * r[k][j];
                }
                let expected = if i == j { 1.0 } else { 0.0 };
                max = max.max((s - expected).abs());
            }
        }
        max < 1e-12
    }

    fn det(r: &[[f64; 3]; 3]) -> f64 {
        r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1])
            - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
            + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0])
    }

    #[test]
    fn test_bisector_frame_orthonormal() {
        let coords = water_coords();
        let site = MultipoleSite::new(0, [0.0; 10], FrameStyle::Bisector, &[1, 2]);

        let r = frame_rotation(&site, &coords);
        assert!(orthonormal(&r));
        assert!((det(&r) - 1.0).abs() < 1e-12);
        // z must point along the bisector, here +z.
        assert!((r[2][2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_z_then_x_frame_orthonormal() {
        let coords = water_coords();
        let site = MultipoleSite::new(1, [0.0; 10], FrameStyle::ZThenX, &[0, 2]);

        let r = frame_rotation(&site, &coords);
        assert!(orthonormal(&r));
        assert!((det(&r) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotated_quadrupole_stays_traceless() {
        let coords = water_coords();
        let mut m = [0.0; 10];
        m[T000] = -0.51966;
        m[T001] = 0.14279;
        m[T200] = 0.37928;
        m[T020] = -0.41809;
        m[T002] = 0.03881;
        let site = MultipoleSite::new(0, m, FrameStyle::Bisector, &[1, 2]);

        let global = rotate_site(&site, &coords);
        assert!(quadrupole_trace(&global).abs() < 1e-10);
    }

    #[test]
    fn test_none_frame_keeps_only_charge() {
        let coords = water_coords();
        let mut m = [0.0; 10];
        m[T000] = 1.0;
        m[T100] = 0.3;
        m[T200] = 0.2;
        m[T020] = -0.2;
        let site = MultipoleSite::new(0, m, FrameStyle::None, &[]);

        let global = rotate_site(&site, &coords);
        assert_eq!(global[T000], 1.0);
        for t in 1..10 {
            assert_eq!(global[t], 0.0);
        }
    }

    #[test]
    fn test_chirality_flip() {
        // A chiral four-site arrangement and its mirror image through the xz plane.
        let coords = vec![
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, -0.3],
            [-0.4, 0.9, -0.3],
        ];
        let mut mirrored = coords.clone();
        for c in mirrored.iter_mut() {
            c[1] = -c[1];
        }

        let mut m = [0.0; 10];
        m[T010] = 0.2;
        m[T110] = 0.05;
        m[T011] = -0.03;
        m[T200] = 0.1;
        m[T020] = -0.1;
        let site = MultipoleSite::new(0, m, FrameStyle::ZThenX, &[1, 2, 3]);

        let g = rotate_site(&site, &coords);
        let gm = rotate_site(&site, &mirrored);
        // The mirrored geometry must produce the mirrored global dipole.
        assert!((g[T010] + gm[T010]).abs() < 1e-12);
        assert!((g[T100] - gm[T100]).abs() < 1e-12);
        assert!((g[T001] - gm[T001]).abs() < 1e-12);
    }
}
