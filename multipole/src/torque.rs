use crate::{FrameStyle, MultipoleSite};

/// Distributes the torque on a site's multipole as forces on the atoms defining its
/// local frame, accumulating into `grad`.
///
/// The projections `dφ/du = -τ·û` etc. are resolved along the frame legs; the central
/// atom picks up minus the sum so the projected forces carry no net translation.
/// Frames with fewer than two axis atoms (ions) contribute nothing.
pub fn project_torque(
    site: &MultipoleSite,
    coords: &[[f64; 3]],
    torque: &[f64; 3],
    grad: &mut [[f64; 3]],
) {
    if site.axis.len() < 2 {
        return;
    }

    let ib = site.index;
    let ia = site.axis[0];
    let ic = site.axis[1];

    let (u, usiz) = leg(&coords[ia], &coords[ib]);
    let (v, vsiz) = leg(&coords[ic], &coords[ib]);
    let (w, wsiz) = match site.frame {
        FrameStyle::ZThenBisector | FrameStyle::ThreeFold => {
            leg(&coords[site.axis[2]], &coords[ib])
        }
        _ => {
            let c = cross(&u, &v);
            (unit(&c), 1.0)
        }
    };

    let uvsin = sin_between(&u, &v);
    let uwsin = sin_between(&u, &w);
    let vwsin = sin_between(&v, &w);

    // Normals of each leg pair, the directions a rotation about one leg moves the
    // others along.
    let uv = unit(&cross(&v, &u));
    let uw = unit(&cross(&w, &u));
    let vw = unit(&cross(&w, &v));

    let dphidu = -dot(torque, &u);
    let dphidv = -dot(torque, &v);
    let dphidw = -dot(torque, &w);

    match site.frame {
        FrameStyle::ZThenX => {
            for j in 0..3 {
                let du = uv[j] * dphidv / (usiz * uvsin) + uw[j] * dphidw / usiz;
                let dv = -uv[j] * dphidu / (vsiz * uvsin);
                grad[ia][j] += du;
                grad[ic][j] += dv;
                grad[ib][j] -= du + dv;
            }
        }
        FrameStyle::Bisector => {
            for j in 0..3 {
                let du = uv[j] * dphidv / (usiz * uvsin) + 0.5 * uw[j] * dphidw / usiz;
                let dv = -uv[j] * dphidu / (vsiz * uvsin) + 0.5 * vw[j] * dphidw / vsiz;
                grad[ia][j] += du;
                grad[ic][j] += dv;
                grad[ib][j] -= du + dv;
            }
        }
        FrameStyle::ZThenBisector => {
            let id = site.axis[2];

            // Auxiliary frame: r bisects the v/w pair, s completes it.
            let r = unit(&[v[0] + w[0], v[1] + w[1], v[2] + w[2]]);
            let s = unit(&cross(&u, &r));

            let ur = unit(&cross(&r, &u));
            let us = unit(&cross(&s, &u));
            let ursin = sin_between(&u, &r);

            let vscos = dot(&v, &s);
            let wscos = dot(&w, &s);
            let vssin = (1.0 - vscos * vscos).sqrt();
            let wssin = (1.0 - wscos * wscos).sqrt();

            let t1 = unit(&[
                v[0] - s[0] * vscos,
                v[1] - s[1] * vscos,
                v[2] - s[2] * vscos,
            ]);
            let t2 = unit(&[
                w[0] - s[0] * wscos,
                w[1] - s[1] * wscos,
                w[2] - s[2] * wscos,
            ]);
            let ut1sin = sin_between(&u, &t1);
            let ut2sin = sin_between(&u, &t2);

            let dphidr = -dot(torque, &r);
            let dphids = -dot(torque, &s);

            for j in 0..3 {
                let du = ur[j] * dphidr / (usiz * ursin) + us[j] * dphids / usiz;
                let dv =
                    (vssin * s[j] - vscos * t1[j]) * dphidu / (vsiz * (ut1sin + ut2sin));
                let dw =
                    (wssin * s[j] - wscos * t2[j]) * dphidu / (wsiz * (ut1sin + ut2sin));
                grad[ia][j] += du;
                grad[ic][j] += dv;
                grad[id][j] += dw;
                grad[ib][j] -= du + dv + dw;
            }
        }
        FrameStyle::ThreeFold => {
            let id = site.axis[2];
            for j in 0..3 {
                let du = (uw[j] * (dphidw - dphidu) / (usiz * uwsin)
                    + uv[j] * (dphidv - dphidu) / (usiz * uvsin))
                    / 3.0;
                let dv = (vw[j] * (dphidw - dphidv) / (vsiz * vwsin)
                    - uv[j] * (dphidu - dphidv) / (vsiz * uvsin))
                    / 3.0;
                let dw = (-uw[j] * (dphidu - dphidw) / (wsiz * uwsin)
                    - vw[j] * (dphidv - dphidw) / (wsiz * vwsin))
                    / 3.0;
                grad[ia][j] += du;
                grad[ic][j] += dv;
                grad[id][j] += dw;
                grad[ib][j] -= du + dv + dw;
            }
        }
        FrameStyle::None => {}
    }
}

/// Unit vector and length of the leg from the central atom to an axis atom.
fn leg(a: &[f64; 3], b: &[f64; 3]) -> ([f64; 3], f64) {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    let siz = dot(&d, &d).sqrt();
    ([d[0] / siz, d[1] / siz, d[2] / siz], siz)
}

fn sin_between(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let c = dot(a, b);
    (1.0 - c * c).sqrt()
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::FrameStyle;

    fn water() -> (Vec<[f64; 3]>, MultipoleSite) {
        let coords = vec![
            [0.0, 0.0, 0.0],
            [0.7586, 0.0, 0.5043],
            [-0.7586, 0.0, 0.5043],
        ];
        let site = MultipoleSite::new(0, [0.0; 10], FrameStyle::Bisector, &[1, 2]);
        (coords, site)
    }

    #[test]
    fn test_projected_forces_balance() {
        let (coords, site) = water();
        let mut grad = vec![[0.0; 3]; 3];

        project_torque(&site, &coords, &[0.3, -0.2, 0.7], &mut grad);

        for j in 0..3 {
            let sum: f64 = grad.iter().map(|g| g[j]).sum();
            assert!(sum.abs() < 1e-12);
        }
    }

    #[test]
    fn test_projected_moment_matches_torque() {
        let (coords, site) = water();
        let torque = [0.1, 0.25, -0.4];
        let mut grad = vec![[0.0; 3]; 3];

        project_torque(&site, &coords, &torque, &mut grad);

        // The moment of the projected forces about the site reproduces the torque, up
        // to the dE/dθ sign convention.
        let mut moment = [0.0; 3];
        for (a, g) in coords.iter().zip(grad.iter()) {
            let arm = [
                a[0] - coords[0][0],
                a[1] - coords[0][1],
                a[2] - coords[0][2],
            ];
            let m = cross(&arm, g);
            for j in 0..3 {
                moment[j] += m[j];
            }
        }
        for j in 0..3 {
            assert!((moment[j] + torque[j]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_torque_about_bisector_pushes_hydrogens_out_of_plane() {
        let (coords, site) = water();
        let mut grad = vec![[0.0; 3]; 3];

        // Unit torque about z, the bisector axis; hydrogens sit in the xz plane.
        project_torque(&site, &coords, &[0.0, 0.0, 1.0], &mut grad);

        // Equal magnitude, opposite sign, perpendicular to the HOH plane.
        assert!((grad[1][1] + grad[2][1]).abs() < 1e-12);
        assert!(grad[1][1].abs() > 1e-3);
        assert!(grad[1][0].abs() < 1e-12 && grad[1][2].abs() < 1e-12);
        assert!(grad[2][0].abs() < 1e-12 && grad[2][2].abs() < 1e-12);
        // Oxygen takes the reaction force.
        for j in 0..3 {
            assert!((grad[0][j] + grad[1][j] + grad[2][j]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ion_frame_is_inert() {
        let coords = vec![[0.0, 0.0, 0.0]];
        let site = MultipoleSite::new(0, [0.0; 10], FrameStyle::None, &[]);
        let mut grad = vec![[0.0; 3]; 3];

        project_torque(&site, &coords, &[1.0, 1.0, 1.0], &mut grad);
        assert_eq!(grad, vec![[0.0; 3]; 3]);
    }
}
