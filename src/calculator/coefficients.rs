//! Geometric coefficients of the C2 continuity relation of cubic splines, and the elimination
//! sweeps that turn them into interface relations.
//!
//! For a point with a cell of length `L` on its left and `R` on its right, the continuity of the
//! second derivative of a cubic spline reads
//!
//! ```text
//! s_i = alpha * s_{i+1} + beta * s_{i-1} + gamma_minus * f_{i-1} + gamma_zero * f_i + gamma_plus * f_{i+1}
//! ```
//!
//! where `s` are the derivatives and `f` the function values.
use nalgebra::DVector;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ContinuityCoefficients {
    /// Coefficient on the derivative at the right neighbour.
    pub alpha: f64,
    /// Coefficient on the derivative at the left neighbour.
    pub beta: f64,
    pub gamma_minus: f64,
    pub gamma_zero: f64,
    pub gamma_plus: f64,
}

impl ContinuityCoefficients {
    pub fn new(left: f64, right: f64) -> Self {
        let sum = left + right;
        let factor = 3.0 / (2.0 * sum);
        Self {
            alpha: -0.5 * left / sum,
            beta: -0.5 * right / sum,
            gamma_minus: -factor * right / left,
            gamma_zero: factor * (right / left - left / right),
            gamma_plus: factor * left / right,
        }
    }
}

/// Hermite blending weights `(H0, H1, K0, K1)` at normalized position `x` of a cell.
pub(crate) fn hermite_basis(x: f64) -> [f64; 4] {
    let h0 = (1.0 - x) * (1.0 - x) * (1.0 + 2.0 * x);
    let h1 = x * x * (3.0 - 2.0 * x);
    let k0 = (1.0 - x) * (1.0 - x) * x;
    let k1 = x * x * (x - 1.0);
    [h0, h1, k0, k1]
}

/// Relation `s_1 = u * s_0 + v * s_far + w . f` on one side of an interface.
///
/// Derivatives are taken along the outward coordinate (pointing away from the interface), and
/// `w` is indexed by the outward point index, 0 being the interface.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SideRelation {
    pub u: f64,
    pub v: f64,
    pub w: DVector<f64>,
}

impl SideRelation {
    /// Eliminates the continuity equation at outward point `j`, given the relation at `j + 1`.
    fn eliminate(&mut self, outward: &[f64], j: usize) {
        let coeffs = ContinuityCoefficients::new(outward[j] - outward[j - 1], outward[j + 1] - outward[j]);
        let d = 1.0 - coeffs.alpha * self.u;
        self.u = coeffs.beta / d;
        self.v = coeffs.alpha * self.v / d;
        self.w *= coeffs.alpha;
        self.w[j - 1] += coeffs.gamma_minus;
        self.w[j] += coeffs.gamma_zero;
        self.w[j + 1] += coeffs.gamma_plus;
        self.w /= d;
    }
}

/// Recursive elimination from the far end of a side towards the interface.
///
/// `outward` holds the outward coordinates of the interpolation points, starting with the
/// interface at 0. With `closure`, the second to last point is a closure point inside the last
/// cell and no far derivative is involved (`v = 0`). Needs at least three breakpoints.
pub(crate) fn recursive_side(outward: &[f64], closure: bool) -> SideRelation {
    let n = outward.len() - 1;
    let (mut side, last) = if closure {
        // Points: ..., n-3, n-2 (last breakpoint before the closure point), n-1 (closure), n (end)
        let last = n - 2;
        let cell = outward[n] - outward[last];
        let coeffs = ContinuityCoefficients::new(outward[last] - outward[last - 1], cell);
        let [h0, h1, k0, k1] = hermite_basis((outward[n - 1] - outward[last]) / cell);
        let dg = 1.0 / (1.0 + coeffs.alpha * k0 / k1);
        let scale = coeffs.alpha / (cell * k1);
        let mut w = DVector::zeros(n + 1);
        w[last - 1] = coeffs.gamma_minus * dg;
        w[last] = (coeffs.gamma_zero - scale * h0) * dg;
        w[n - 1] = scale * dg;
        w[n] = (coeffs.gamma_plus - scale * h1) * dg;
        let side = SideRelation {
            u: coeffs.beta * dg,
            v: 0.0,
            w,
        };
        (side, last)
    } else {
        let last = n - 1;
        let coeffs = ContinuityCoefficients::new(outward[last] - outward[last - 1], outward[n] - outward[last]);
        let mut w = DVector::zeros(n + 1);
        w[last - 1] = coeffs.gamma_minus;
        w[last] = coeffs.gamma_zero;
        w[n] = coeffs.gamma_plus;
        let side = SideRelation {
            u: coeffs.beta,
            v: coeffs.alpha,
            w,
        };
        (side, last)
    };

    for j in (1..last).rev() {
        side.eliminate(outward, j);
    }
    side
}

const MU: f64 = 2.0 - 1.732_050_807_568_877_2;

/// Ratio `U_n / U_m` of the solutions of `U_k = 4 U_{k-1} - U_{k-2}`, `U_{-1} = 0`, `U_0 = 1`.
///
/// Evaluated through the characteristic roots `2 +- sqrt(3)` as
/// `mu^(m - n) (1 - mu^(2(n + 1))) / (1 - mu^(2(m + 1)))`, with `mu = 2 - sqrt(3)`, which stays
/// accurate for any number of cells.
fn chebyshev_ratio(n: i32, m: i32) -> f64 {
    debug_assert!(n >= -1 && m >= n);
    MU.powi(m - n) * (1.0 - MU.powi(2 * (n + 1))) / (1.0 - MU.powi(2 * (m + 1)))
}

/// Closed form of [`recursive_side`] for `n_cells` uniform cells of length `h` without closure.
pub(crate) fn uniform_side(n_cells: usize, h: f64) -> SideRelation {
    debug_assert!(n_cells >= 2);
    let m = n_cells as i32 - 1;
    let sign = |k: i32| if k % 2 == 0 { 1.0 } else { -1.0 };
    let c = |k: i32| sign(k + 1) * chebyshev_ratio(m - k, m) * 3.0 / h;

    let w = DVector::from_fn(n_cells + 1, |j, _| {
        let j = j as i32;
        let mut w_j = 0.0;
        if (1..=m).contains(&(j - 1)) {
            w_j += c(j - 1);
        }
        if (1..=m).contains(&(j + 1)) {
            w_j -= c(j + 1);
        }
        w_j
    });
    SideRelation {
        u: -chebyshev_ratio(m - 1, m),
        v: sign(m) * chebyshev_ratio(0, m),
        w,
    }
}

/// Interface relation `s_0 = coeff_1 * s_far_1 + coeff_2 * s_far_2 + w_1 . f_1 + w_2 . f_2`.
///
/// Derivatives are oriented from patch 1 towards patch 2. The weight at the shared point is
/// stored in full in both `weights_1[0]` and `weights_2[0]`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InterfaceRelation {
    pub coeff_1: f64,
    pub coeff_2: f64,
    pub weights_1: DVector<f64>,
    pub weights_2: DVector<f64>,
}

/// Combines the relations of both sides with the continuity equation at the interface.
///
/// `first_cell_1` and `first_cell_2` are the lengths of the cells touching the interface.
pub(crate) fn combine(
    side_1: &SideRelation,
    side_2: &SideRelation,
    first_cell_1: f64,
    first_cell_2: f64,
) -> InterfaceRelation {
    // Along the orientation from patch 1 to patch 2 the outward derivatives of patch 1 change sign
    let coeffs = ContinuityCoefficients::new(first_cell_1, first_cell_2);
    let d = 1.0 - coeffs.alpha * side_2.u - coeffs.beta * side_1.u;

    let mut weights_1 = &side_1.w * (-coeffs.beta / d);
    weights_1[0] += coeffs.gamma_zero / d;
    weights_1[1] += coeffs.gamma_minus / d;

    let mut weights_2 = &side_2.w * (coeffs.alpha / d);
    weights_2[1] += coeffs.gamma_plus / d;

    let shared = weights_1[0] + weights_2[0];
    weights_1[0] = shared;
    weights_2[0] = shared;

    InterfaceRelation {
        coeff_1: coeffs.beta * side_1.v / d,
        coeff_2: coeffs.alpha * side_2.v / d,
        weights_1,
        weights_2,
    }
}
