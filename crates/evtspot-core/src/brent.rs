#![forbid(unsafe_code)]

//! Brent's bracketed root finder.
//!
//! Combines inverse quadratic interpolation, the secant step and bisection.
//! Three points are tracked: `b` is the best estimate, `a` the previous
//! one, and `c` keeps `f(b)` and `f(c)` of opposite signs so the root stays
//! bracketed by `[b, c]`.
//!
//! ```text
//! tol1 = 2 * EPSILON * |b| + tol / 2
//! stop when |c - b| / 2 <= tol1 or f(b) = 0
//! ```
//!
//! An interpolated step is accepted only when `2p < min(3 xm q - |tol1 q|, |e q|)`;
//! otherwise the iteration bisects. The thresholds must not be relaxed:
//! doing so lets the iterate oscillate without shrinking the bracket.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | `f(a)` and `f(b)` share a sign | `None` immediately |
//! | More than [`BRENT_ITMAX`] iterations | `None` |

/// Relative precision used by the convergence test.
pub const BRENT_DEFAULT_EPSILON: f64 = 2.0e-8;

/// Hard iteration cap.
pub const BRENT_ITMAX: usize = 200;

/// Search a root of `f` in the bracket `[x1, x2]`.
///
/// Returns `None` when the bracket does not change sign or the iteration
/// cap is reached.
pub fn find_root<F>(x1: f64, x2: f64, mut f: F, tol: f64) -> Option<f64>
where
    F: FnMut(f64) -> f64,
{
    let mut a = x1;
    let mut b = x2;
    let mut c = x2;
    let mut d = 0.0_f64;
    let mut e = 0.0_f64;

    let mut fa = f(a);
    let mut fb = f(b);

    if (fa > 0.0 && fb > 0.0) || (fa < 0.0 && fb < 0.0) {
        return None;
    }

    let mut fc = fb;
    for _ in 0..BRENT_ITMAX {
        if (fb > 0.0 && fc > 0.0) || (fb < 0.0 && fc < 0.0) {
            // Re-bracket with the previous point.
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol1 = 2.0 * BRENT_DEFAULT_EPSILON * b.abs() + 0.5 * tol;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            return Some(b);
        }

        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                // Secant.
                (2.0 * xm * s, 1.0 - s)
            } else {
                // Inverse quadratic interpolation.
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            // Bracket shrinking too slowly.
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        if d.abs() > tol1 {
            b += d;
        } else {
            b += if xm >= 0.0 { tol1.abs() } else { -tol1.abs() };
        }
        fb = f(b);
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(x1, x2, last = b, "brent iteration cap reached");
    None
}
