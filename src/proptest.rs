//! Strategies for generating grids in property tests.
use crate::connectivity::Extremity;
use crate::grid::PatchAxis;
use ::proptest::prelude::*;

/// Breakpoints on `[min, max]` with `n_cells` cells, each interior breakpoint displaced by at
/// most `amplitude` times the uniform cell length.
pub fn perturbed_breakpoints(min: f64, max: f64, n_cells: usize, amplitude: f64) -> impl Strategy<Value = Vec<f64>> {
    let h = (max - min) / n_cells as f64;
    let perturbation = -amplitude..=amplitude;
    proptest::collection::vec(perturbation, n_cells.saturating_sub(1)).prop_map(move |offsets| {
        let mut breakpoints = Vec::with_capacity(n_cells + 1);
        breakpoints.push(min);
        breakpoints.extend(
            offsets
                .iter()
                .enumerate()
                .map(|(i, offset)| min + h * ((i + 1) as f64 + offset)),
        );
        breakpoints.push(max);
        breakpoints
    })
}

/// Non-uniform axis on `[min, max]` with a number of cells drawn from `cells`.
pub fn non_uniform_axis(
    min: f64,
    max: f64,
    cells: impl Strategy<Value = usize>,
) -> impl Strategy<Value = PatchAxis> {
    cells
        .prop_flat_map(move |n_cells| perturbed_breakpoints(min, max, n_cells, 0.3))
        .prop_filter_map("invalid breakpoints", |breakpoints| {
            PatchAxis::non_uniform(breakpoints).ok()
        })
}

/// Axis on `[min, max]`, either uniform or not, optionally with a Greville closure at either end
/// opposite to `interface`.
pub fn patch_axis(
    min: f64,
    max: f64,
    cells: impl Strategy<Value = usize> + Clone,
    interface: Extremity,
) -> impl Strategy<Value = PatchAxis> {
    let uniform = cells
        .clone()
        .prop_filter_map("invalid cell count", move |n_cells| {
            PatchAxis::uniform(min, max, n_cells).ok()
        });
    let non_uniform = non_uniform_axis(min, max, cells);
    (prop_oneof![uniform, non_uniform], any::<bool>()).prop_filter_map(
        "invalid closure",
        move |(axis, closure)| {
            if closure {
                axis.with_greville_closure(interface.opposite()).ok()
            } else {
                Some(axis)
            }
        },
    )
}
