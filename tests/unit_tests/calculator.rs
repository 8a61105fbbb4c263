use crate::perturbed_axis;
use matrixcompare::assert_scalar_eq;
use multipatch::calculator::{
    CalculatorBuilder, CoefficientScheme, DerivativesCalculator, SingleInterfaceDerivativesCalculator,
};
use multipatch::connectivity::{BoundCond, Extremity};
use multipatch::grid::PatchAxis;
use multipatch::MultipatchError;
use nalgebra::DVector;
use proptest::prelude::*;
use util::{assert_approx_eq, assert_approx_matrix_eq, spline_slopes, SplineEnd};

fn cubic(x: f64) -> f64 {
    0.7 * x * x * x - 2.0 * x * x + 0.5 * x + 1.0
}

fn cubic_deriv(x: f64) -> f64 {
    2.1 * x * x - 4.0 * x + 0.5
}

fn sample(axis: &PatchAxis, f: impl Fn(f64) -> f64) -> DVector<f64> {
    DVector::from_iterator(axis.n_points(), axis.points().iter().map(|&x| f(x)))
}

/// Interface derivative given the derivatives at both far edges, oriented from patch 1 to patch 2.
fn interface_deriv(
    calculator: &impl DerivativesCalculator,
    values_1: &DVector<f64>,
    values_2: &DVector<f64>,
    far_1: f64,
    far_2: f64,
) -> f64 {
    let c = calculator
        .get_function_coefficients(values_1.into(), values_2.into())
        .unwrap();
    calculator.coeff_deriv_patch_1() * far_1 + calculator.coeff_deriv_patch_2() * far_2 + c
}

#[test]
fn cubic_derivative_is_exact_at_interface() {
    let axis_1 = perturbed_axis(0.0, 1.0, 8, 0.2);
    let axis_2 = perturbed_axis(1.0, 2.5, 6, 0.2);
    let calculator =
        SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front).unwrap();
    assert!(!calculator.uses_closed_form());

    let derivative = interface_deriv(
        &calculator,
        &sample(&axis_1, cubic),
        &sample(&axis_2, cubic),
        cubic_deriv(0.0),
        cubic_deriv(2.5),
    );
    assert_approx_eq!(derivative, cubic_deriv(1.0), abstol = 2e-14);
}

#[test]
fn quadratic_derivative_is_exact_on_uniform_grids() {
    let f = |x: f64| x * x;
    let axis_1 = PatchAxis::uniform(0.0, 1.0, 10).unwrap();
    let axis_2 = PatchAxis::uniform(1.0, 2.0, 10).unwrap();
    let calculator =
        SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front).unwrap();
    assert!(calculator.uses_closed_form());

    let derivative = interface_deriv(&calculator, &sample(&axis_1, f), &sample(&axis_2, f), 0.0, 4.0);
    assert_approx_eq!(derivative, 2.0, abstol = 1e-14);
}

#[test]
fn interface_at_front_of_patch_1_orients_derivatives_towards_patch_2() {
    // Patch 1 lies to the right of patch 2, so derivatives run towards decreasing x
    let axis_1 = perturbed_axis(1.0, 2.5, 7, 0.2);
    let axis_2 = perturbed_axis(0.0, 1.0, 5, 0.2);
    let calculator =
        SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Front, &axis_2, Extremity::Back).unwrap();

    let derivative = interface_deriv(
        &calculator,
        &sample(&axis_1, cubic),
        &sample(&axis_2, cubic),
        -cubic_deriv(2.5),
        -cubic_deriv(0.0),
    );
    assert_approx_eq!(derivative, -cubic_deriv(1.0), abstol = 2e-14);
}

#[test]
fn greville_closure_removes_far_derivative() {
    let axis_1 = perturbed_axis(0.0, 1.0, 6, 0.2);
    let axis_2 = perturbed_axis(1.0, 2.0, 9, 0.2)
        .with_greville_closure(Extremity::Back)
        .unwrap();
    let calculator =
        SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front).unwrap();
    assert_eq!(calculator.coeff_deriv_patch_2(), 0.0);
    assert_eq!(calculator.weights_patch_2().len(), axis_2.n_points());

    // The far derivative of patch 2 is irrelevant
    let derivative = interface_deriv(
        &calculator,
        &sample(&axis_1, cubic),
        &sample(&axis_2, cubic),
        cubic_deriv(0.0),
        1e6,
    );
    assert_approx_eq!(derivative, cubic_deriv(1.0), abstol = 2e-14);
}

#[test]
fn interface_derivative_matches_global_spline() {
    let f = |x: f64| (3.0 * x).sin() + x * x;
    let df = |x: f64| 3.0 * (3.0 * x).cos() + 2.0 * x;
    let axis_1 = perturbed_axis(0.0, 1.0, 10, 0.25);
    let axis_2 = perturbed_axis(1.0, 2.0, 10, 0.25);
    let calculator =
        SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front).unwrap();

    let derivative = interface_deriv(&calculator, &sample(&axis_1, f), &sample(&axis_2, f), df(0.0), df(2.0));

    let breakpoints = crate::concat_breakpoints([&axis_1, &axis_2]);
    let values: Vec<_> = breakpoints.iter().map(|&x| f(x)).collect();
    let slopes = spline_slopes(
        &breakpoints,
        &values,
        SplineEnd::Hermite(df(0.0)),
        SplineEnd::Hermite(df(2.0)),
    );
    assert_approx_eq!(derivative, slopes[10], abstol = 5e-14);
}

#[test]
fn interface_derivative_with_closure_matches_global_spline() {
    let f = |x: f64| (2.0 * x).cos() * x;
    let df = |x: f64| (2.0 * x).cos() - 2.0 * x * (2.0 * x).sin();
    let axis_1 = perturbed_axis(-1.0, 0.0, 7, 0.25);
    let axis_2 = perturbed_axis(0.0, 1.5, 12, 0.25)
        .with_greville_closure(Extremity::Back)
        .unwrap();
    let calculator =
        SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front).unwrap();

    let derivative = interface_deriv(&calculator, &sample(&axis_1, f), &sample(&axis_2, f), df(-1.0), 0.0);

    let breakpoints = crate::concat_breakpoints([&axis_1, &axis_2]);
    let values: Vec<_> = breakpoints.iter().map(|&x| f(x)).collect();
    let closure = axis_2.points()[axis_2.n_points() - 2];
    let slopes = spline_slopes(
        &breakpoints,
        &values,
        SplineEnd::Hermite(df(-1.0)),
        SplineEnd::Greville {
            point: closure,
            value: f(closure),
        },
    );
    assert_approx_eq!(derivative, slopes[7], abstol = 5e-14);
}

#[test]
fn mismatched_interface_values_are_rejected() {
    let axis_1 = PatchAxis::uniform(0.0, 1.0, 4).unwrap();
    let axis_2 = PatchAxis::uniform(1.0, 2.0, 4).unwrap();
    let calculator =
        SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front).unwrap();
    let values_1 = sample(&axis_1, cubic);

    let mut values_2 = sample(&axis_2, cubic);
    values_2[0] += 1e-12;
    let result = calculator.get_function_coefficients((&values_1).into(), (&values_2).into());
    assert!(matches!(result, Err(MultipatchError::Consistency(_))));

    let mut values_2 = sample(&axis_2, cubic);
    values_2[0] += 1e-14;
    assert!(calculator
        .get_function_coefficients((&values_1).into(), (&values_2).into())
        .is_ok());
}

#[test]
fn wrong_number_of_values_is_rejected() {
    let axis_1 = PatchAxis::uniform(0.0, 1.0, 4).unwrap();
    let axis_2 = PatchAxis::uniform(1.0, 2.0, 4).unwrap();
    let calculator =
        SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front).unwrap();
    let values_1 = DVector::zeros(5);
    let values_2 = DVector::zeros(4);
    let result = calculator.get_function_coefficients((&values_1).into(), (&values_2).into());
    assert!(matches!(result, Err(MultipatchError::Cardinality(_))));
}

#[test]
fn closed_form_agrees_with_recursion_on_uniform_grids() {
    for n_cells_1 in 2..=30 {
        for n_cells_2 in [2, 3, 7, n_cells_1] {
            let axis_1 = PatchAxis::uniform(-1.0, 0.0, n_cells_1).unwrap();
            let axis_2 = PatchAxis::uniform(0.0, 0.5, n_cells_2).unwrap();
            let builder = CalculatorBuilder::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front);
            let closed_form = builder.clone().build().unwrap();
            let recursive = builder
                .with_scheme(CoefficientScheme::Recursive)
                .build()
                .unwrap();
            assert!(closed_form.uses_closed_form());
            assert!(!recursive.uses_closed_form());

            assert_approx_eq!(
                closed_form.coeff_deriv_patch_1(),
                recursive.coeff_deriv_patch_1(),
                abstol = 1e-12
            );
            assert_approx_eq!(
                closed_form.coeff_deriv_patch_2(),
                recursive.coeff_deriv_patch_2(),
                abstol = 1e-12
            );
            assert_approx_matrix_eq!(closed_form.weights_patch_1(), recursive.weights_patch_1(), abstol = 1e-12);
            assert_approx_matrix_eq!(closed_form.weights_patch_2(), recursive.weights_patch_2(), abstol = 1e-12);
        }
    }
}

#[test]
fn coefficients_do_not_depend_on_translation() {
    let axis_1 = perturbed_axis(0.0, 1.0, 8, 0.2);
    let axis_2 = perturbed_axis(1.0, 2.0, 5, 0.2);
    let shifted_1 = PatchAxis::non_uniform(axis_1.breakpoints().iter().map(|x| x + 10.0).collect()).unwrap();
    let shifted_2 = PatchAxis::non_uniform(axis_2.breakpoints().iter().map(|x| x + 10.0).collect()).unwrap();
    let calculator =
        SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front).unwrap();
    let shifted =
        SingleInterfaceDerivativesCalculator::new(&shifted_1, Extremity::Back, &shifted_2, Extremity::Front).unwrap();

    assert_scalar_eq!(
        calculator.coeff_deriv_patch_1(),
        shifted.coeff_deriv_patch_1(),
        comp = abs,
        tol = 1e-13
    );
    assert_scalar_eq!(
        calculator.coeff_deriv_patch_2(),
        shifted.coeff_deriv_patch_2(),
        comp = abs,
        tol = 1e-13
    );
    assert_approx_matrix_eq!(calculator.weights_patch_1(), shifted.weights_patch_1(), abstol = 1e-11);
}

#[test]
fn construction_errors() {
    let single_cell = PatchAxis::uniform(0.0, 1.0, 1).unwrap();
    let axis = PatchAxis::uniform(1.0, 2.0, 4).unwrap();
    let result = SingleInterfaceDerivativesCalculator::new(&single_cell, Extremity::Back, &axis, Extremity::Front);
    assert!(matches!(result, Err(MultipatchError::Cardinality(_))));

    // Closure point next to the interface
    let closure_at_interface = PatchAxis::uniform(0.0, 1.0, 4)
        .unwrap()
        .with_greville_closure(Extremity::Back)
        .unwrap();
    let result =
        SingleInterfaceDerivativesCalculator::new(&closure_at_interface, Extremity::Back, &axis, Extremity::Front);
    assert!(matches!(result, Err(MultipatchError::Configuration(_))));

    let left = PatchAxis::uniform(0.0, 1.0, 4).unwrap();
    let result = CalculatorBuilder::new(&left, Extremity::Back, &axis, Extremity::Front)
        .with_opposite_bounds(BoundCond::Periodic, BoundCond::Hermite)
        .build();
    assert!(matches!(result, Err(MultipatchError::Configuration(_))));

    // Greville requested on a grid without closure point
    let result = CalculatorBuilder::new(&left, Extremity::Back, &axis, Extremity::Front)
        .with_opposite_bounds(BoundCond::Hermite, BoundCond::Greville)
        .build();
    assert!(matches!(result, Err(MultipatchError::Configuration(_))));

    let result = CalculatorBuilder::new(&left, Extremity::Back, &axis, Extremity::Front)
        .with_opposite_bounds(BoundCond::Hermite, BoundCond::Hermite)
        .build();
    assert!(result.is_ok());
}

#[test]
fn truncated_sides_approximate_the_full_relation() {
    let f = |x: f64| (2.0 * x).sin();
    let df = |x: f64| 2.0 * (2.0 * x).cos();
    let axis_1 = perturbed_axis(0.0, 1.0, 20, 0.2);
    let axis_2 = perturbed_axis(1.0, 2.0, 20, 0.2);
    let full = SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front).unwrap();
    let truncated = CalculatorBuilder::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front)
        .with_taken_cells(4)
        .build()
        .unwrap();
    assert_eq!(full.is_truncated(), [false, false]);
    assert_eq!(truncated.is_truncated(), [true, true]);
    assert_eq!(truncated.weights_patch_1().len(), 5);

    let values_1 = sample(&axis_1, f);
    let values_2 = sample(&axis_2, f);

    // With the exact derivatives at the truncation points the relation is exact for cubics
    let x_1 = axis_1.points()[20 - 4];
    let x_2 = axis_2.points()[4];
    let exact = interface_deriv(
        &truncated,
        &sample(&axis_1, cubic),
        &sample(&axis_2, cubic),
        cubic_deriv(x_1),
        cubic_deriv(x_2),
    );
    assert_approx_eq!(exact, cubic_deriv(1.0), abstol = 2e-14);

    // Dropping the far derivatives leaves a small error
    let reference = interface_deriv(&full, &values_1, &values_2, df(0.0), df(2.0));
    let approximate = truncated
        .get_function_coefficients((&values_1).into(), (&values_2).into())
        .unwrap();
    assert!((approximate - reference).abs() < 2e-2);

    let untruncated = CalculatorBuilder::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front)
        .with_taken_cells(20)
        .build()
        .unwrap();
    assert_eq!(untruncated, full);
}

proptest! {
    #[test]
    fn cubic_is_reproduced_on_arbitrary_grids(
        axis_1 in multipatch::proptest::non_uniform_axis(0.0, 1.0, 2usize..12),
        axis_2 in multipatch::proptest::non_uniform_axis(1.0, 2.0, 2usize..12),
    ) {
        let calculator =
            SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front).unwrap();
        let derivative = interface_deriv(
            &calculator,
            &sample(&axis_1, cubic),
            &sample(&axis_2, cubic),
            cubic_deriv(0.0),
            cubic_deriv(2.0),
        );
        prop_assert!((derivative - cubic_deriv(1.0)).abs() <= 1e-13);
    }

    #[test]
    fn coefficients_are_contractive(
        axis_1 in multipatch::proptest::patch_axis(0.0, 1.0, 2usize..10, Extremity::Back),
        axis_2 in multipatch::proptest::patch_axis(1.0, 3.0, 2usize..10, Extremity::Front),
    ) {
        let calculator =
            SingleInterfaceDerivativesCalculator::new(&axis_1, Extremity::Back, &axis_2, Extremity::Front).unwrap();
        let a = calculator.coeff_deriv_patch_1();
        let b = calculator.coeff_deriv_patch_2();
        prop_assert!(a.abs() + b.abs() < 0.5);
        prop_assert_eq!(b == 0.0, axis_2.has_closure(Extremity::Back));
    }
}
