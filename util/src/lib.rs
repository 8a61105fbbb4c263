use nalgebra::{DMatrix, DVector};

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

/// Scalar counterpart of [`assert_approx_matrix_eq`].
#[macro_export]
macro_rules! assert_approx_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let (x, y): (f64, f64) = ($x, $y);
        let tol: f64 = $tol;
        if !((x - y).abs() <= tol) {
            panic!(
                "assert_approx_eq!({}, {}) failed: left = {:e}, right = {:e}, diff = {:e}, abstol = {:e}",
                stringify!($x),
                stringify!($y),
                x,
                y,
                (x - y).abs(),
                tol
            );
        }
    }};
}

/// End condition of a reference spline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplineEnd {
    /// The derivative at the end breakpoint is known.
    Hermite(f64),
    /// An additional interpolation point `point` with value `value` lies inside the end cell.
    Greville { point: f64, value: f64 },
}

/// Hermite basis (H0, H1, K0, K1) at the normalized position `x` of a cell.
pub fn hermite_basis(x: f64) -> [f64; 4] {
    let h0 = (1.0 - x) * (1.0 - x) * (1.0 + 2.0 * x);
    let h1 = x * x * (3.0 - 2.0 * x);
    let k0 = (1.0 - x) * (1.0 - x) * x;
    let k1 = x * x * (x - 1.0);
    [h0, h1, k0, k1]
}

/// Adds the C2 continuity equation at breakpoint `i` to `row` of the system, given the
/// neighbouring breakpoint indices and cell lengths.
fn push_continuity_row(
    matrix: &mut DMatrix<f64>,
    rhs: &mut DVector<f64>,
    row: usize,
    (left, centre, right): (usize, usize, usize),
    (l, r): (f64, f64),
    (f_left, f_centre, f_right): (f64, f64, f64),
) {
    matrix[(row, left)] += 1.0 / l;
    matrix[(row, centre)] += 2.0 * (1.0 / l + 1.0 / r);
    matrix[(row, right)] += 1.0 / r;
    rhs[row] = 3.0 * ((f_centre - f_left) / (l * l) + (f_right - f_centre) / (r * r));
}

/// Slopes of the cubic spline through `values` at `breakpoints` with the given end conditions.
///
/// This solves the global (dense) system on the whole domain and serves as the reference
/// against which patch-wise reconciliation is checked.
pub fn spline_slopes(breakpoints: &[f64], values: &[f64], left: SplineEnd, right: SplineEnd) -> DVector<f64> {
    let n = breakpoints.len();
    assert!(n >= 2);
    assert_eq!(values.len(), n);
    let mut matrix = DMatrix::zeros(n, n);
    let mut rhs = DVector::zeros(n);

    for i in 1..n - 1 {
        let l = breakpoints[i] - breakpoints[i - 1];
        let r = breakpoints[i + 1] - breakpoints[i];
        push_continuity_row(
            &mut matrix,
            &mut rhs,
            i,
            (i - 1, i, i + 1),
            (l, r),
            (values[i - 1], values[i], values[i + 1]),
        );
    }

    for (row, end, cell) in [(0, left, (0, 1)), (n - 1, right, (n - 2, n - 1))] {
        match end {
            SplineEnd::Hermite(derivative) => {
                matrix[(row, row)] = 1.0;
                rhs[row] = derivative;
            }
            SplineEnd::Greville { point, value } => {
                let (a, b) = cell;
                let h = breakpoints[b] - breakpoints[a];
                let [h0, h1, k0, k1] = hermite_basis((point - breakpoints[a]) / h);
                matrix[(row, a)] = h * k0;
                matrix[(row, b)] = h * k1;
                rhs[row] = value - h0 * values[a] - h1 * values[b];
            }
        }
    }

    matrix
        .lu()
        .solve(&rhs)
        .expect("Reference spline system must be solvable")
}

/// Slopes of the periodic cubic spline with period `breakpoints[n] - breakpoints[0]`.
///
/// `breakpoints` has `n + 1` entries (the last one closes the period) and `values` has `n`.
pub fn periodic_spline_slopes(breakpoints: &[f64], values: &[f64]) -> DVector<f64> {
    let n = values.len();
    assert_eq!(breakpoints.len(), n + 1);
    assert!(n >= 3);
    let mut matrix = DMatrix::zeros(n, n);
    let mut rhs = DVector::zeros(n);
    for i in 0..n {
        let prev = (i + n - 1) % n;
        let next = (i + 1) % n;
        let l = if i == 0 {
            breakpoints[n] - breakpoints[n - 1]
        } else {
            breakpoints[i] - breakpoints[i - 1]
        };
        let r = breakpoints[i + 1] - breakpoints[i];
        push_continuity_row(
            &mut matrix,
            &mut rhs,
            i,
            (prev, i, next),
            (l, r),
            (values[prev], values[i], values[next]),
        );
    }
    matrix
        .lu()
        .solve(&rhs)
        .expect("Periodic reference spline system must be solvable")
}

/// Evaluates the piecewise cubic Hermite interpolant defined by values and slopes at breakpoints.
pub fn evaluate_hermite(breakpoints: &[f64], values: &[f64], slopes: &[f64], x: f64) -> f64 {
    assert!(breakpoints.len() >= 2);
    let cell = breakpoints
        .partition_point(|b| *b <= x)
        .clamp(1, breakpoints.len() - 1)
        - 1;
    let h = breakpoints[cell + 1] - breakpoints[cell];
    let [h0, h1, k0, k1] = hermite_basis((x - breakpoints[cell]) / h);
    h0 * values[cell] + h1 * values[cell + 1] + h * (k0 * slopes[cell] + k1 * slopes[cell + 1])
}

/// Breakpoints on `[min, max]` with `n_cells` cells, displaced by a smooth, deterministic
/// perturbation so that no two cells have the same length.
pub fn perturbed_breakpoints(min: f64, max: f64, n_cells: usize, amplitude: f64) -> Vec<f64> {
    let h = (max - min) / n_cells as f64;
    (0..=n_cells)
        .map(|i| {
            if i == 0 {
                min
            } else if i == n_cells {
                max
            } else {
                let t = i as f64 / n_cells as f64;
                min + h * (i as f64 + amplitude * (7.0 * t).sin() * (3.0 * t + 0.5).cos())
            }
        })
        .collect()
}
