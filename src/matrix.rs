//! Reconciliation of interface derivatives along a chain of patches.
//!
//! An [`InterfaceDerivativeMatrix`] couples, for every interface of a [`Chain`], the derivative
//! shared by the two patches to the derivatives at the neighbouring interfaces. The system only
//! depends on the grids, so it is assembled once and then solved for every slice of the chain:
//! each interpolation line across the chain for [`solve_deriv`](InterfaceDerivativeSolver::solve_deriv),
//! and each pair of chain corners for [`solve_cross_deriv`](InterfaceDerivativeSolver::solve_cross_deriv).
//!
//! Slices are solved in parallel. The results are written back to the storage once all slices
//! have been solved, so the storage is only borrowed immutably while solving.
use crate::calculator::{DerivativesCalculator, SingleInterfaceDerivativesCalculator};
use crate::chain::{Chain, ChainKind, ChainLink};
use crate::collection::DerivativesCalculatorCollection;
use crate::connectivity::{BoundCond, Connectivity, Extremity, LocalDim, Orientation};
use crate::edge_transformation::EdgeTransformation;
use crate::error::MultipatchError;
use crate::field::DerivativeStorage;
use log::debug;
use multipatch_sparse::bicgstab::BiCgStabWorkspace;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::cell::RefCell;
use thread_local::ThreadLocal;

mod system;

use system::ChainSystem;
pub use system::SolverSettings;

/// Summary of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolveReport {
    /// Number of independent systems solved.
    pub slices: usize,
    /// Largest number of iterative solver iterations over all slices. Zero for direct solves.
    pub max_iterations: usize,
}

/// Reconciles the first and cross derivatives at the interfaces of a chain.
pub trait InterfaceDerivativeSolver {
    /// Computes the derivative perpendicular to every interface of the chain, for every line
    /// across the chain, and writes it to both edges of each interface.
    ///
    /// Derivatives on Hermite ends of an open chain are read from the storage.
    fn solve_deriv<S>(&self, storage: &mut S) -> Result<SolveReport, MultipatchError>
    where
        S: DerivativeStorage + Sync;

    /// Computes the cross derivative at the interface corners on both sides of the chain.
    ///
    /// The first derivatives along the parallel direction must be known on the edges bounding
    /// the chain on either side; the cross derivatives at Hermite ends are read from the storage.
    fn solve_cross_deriv<S>(&self, storage: &mut S) -> Result<SolveReport, MultipatchError>
    where
        S: DerivativeStorage + Sync;
}

/// Maps a slice of the chain to the index along every link's edges.
trait SliceLayout: Sync {
    fn num_slices(&self) -> usize;

    fn index(&self, slice: usize, link: usize) -> usize;
}

/// Slice indices found by matching interpolation points across each interface.
#[derive(Debug, Clone)]
struct MatchedSlices {
    /// `indices[slice][link]`
    indices: Vec<Vec<usize>>,
}

impl SliceLayout for MatchedSlices {
    fn num_slices(&self) -> usize {
        self.indices.len()
    }

    fn index(&self, slice: usize, link: usize) -> usize {
        self.indices[slice][link]
    }
}

/// Slices of a chain whose patches all share their parallel indexing.
#[derive(Debug, Clone, Copy)]
struct IdentitySlices {
    n_slices: usize,
}

impl SliceLayout for IdentitySlices {
    fn num_slices(&self) -> usize {
        self.n_slices
    }

    fn index(&self, slice: usize, _link: usize) -> usize {
        slice
    }
}

fn parallel_n_points(connectivity: &Connectivity, link: &ChainLink) -> Result<usize, MultipatchError> {
    Ok(connectivity
        .patch(link.patch)?
        .axis(link.dim.other())
        .n_points())
}

fn common_parallel_n_points(connectivity: &Connectivity, chain: &Chain) -> Result<usize, MultipatchError> {
    let links = chain.links();
    let first = links
        .first()
        .ok_or_else(|| MultipatchError::configuration("cannot reconcile derivatives along an empty chain"))?;
    let n_points = parallel_n_points(connectivity, first)?;
    for link in links {
        if parallel_n_points(connectivity, link)? != n_points {
            return Err(MultipatchError::configuration(format!(
                "patch {:?} has a different number of points across the chain than patch {:?}",
                link.patch, first.patch
            )));
        }
    }
    Ok(n_points)
}

impl MatchedSlices {
    fn new(connectivity: &Connectivity, chain: &Chain) -> Result<Self, MultipatchError> {
        let n_slices = common_parallel_n_points(connectivity, chain)?;
        let n_links = chain.len();
        let mut indices: Vec<Vec<usize>> = (0..n_slices)
            .map(|slice| {
                let mut slice_indices = vec![0; n_links];
                slice_indices[0] = slice;
                slice_indices
            })
            .collect();
        for (i, chain_interface) in chain.interfaces().iter().enumerate() {
            let interface = connectivity.interface(chain_interface.id)?;
            let (before, after) = chain.interface_links(i);
            let axis_before = connectivity.patch(before.patch)?.axis(before.dim.other());
            let axis_after = connectivity.patch(after.patch)?.axis(after.dim.other());
            let transformation = EdgeTransformation::new(axis_before, axis_after, interface.orientation);
            let target = (i + 1) % n_links;
            for (slice, slice_indices) in indices.iter_mut().enumerate() {
                let mapped = transformation
                    .transform_index(slice_indices[i])
                    .ok_or_else(|| {
                        MultipatchError::configuration(format!(
                            "interpolation points do not match across interface {:?}",
                            chain_interface.id
                        ))
                    })?;
                if target == 0 {
                    if mapped != slice {
                        return Err(MultipatchError::configuration(
                            "interpolation lines do not close around the periodic chain",
                        ));
                    }
                } else {
                    slice_indices[target] = mapped;
                }
            }
        }
        Ok(Self { indices })
    }
}

/// Corner of a patch given the extremities along the chain direction and the parallel direction.
fn corner(dim: LocalDim, along: Extremity, parallel: Extremity) -> (Extremity, Extremity) {
    match dim {
        LocalDim::Dim1 => (along, parallel),
        LocalDim::Dim2 => (parallel, along),
    }
}

/// Orientation of the cross derivative of a link relative to the chain frame.
fn cross_sign(link: &ChainLink) -> f64 {
    link.orientation.compose(link.parallel_orientation).sign()
}

#[derive(Debug)]
struct ChainEngine<'c, C, L> {
    chain: Chain,
    calculators: &'c DerivativesCalculatorCollection<C>,
    system: ChainSystem,
    layout: L,
    workspace: ThreadLocal<RefCell<BiCgStabWorkspace<f64>>>,
}

impl<'c, C, L> ChainEngine<'c, C, L>
where
    C: DerivativesCalculator + Sync,
    L: SliceLayout,
{
    fn new(
        chain: Chain,
        calculators: &'c DerivativesCalculatorCollection<C>,
        layout: L,
        settings: &SolverSettings,
    ) -> Result<Self, MultipatchError> {
        let system = ChainSystem::assemble(&chain, calculators, settings)?;
        debug!(
            "Assembled interface derivative system with {} unknowns for a {} chain of {} patches ({} slices)",
            system.n(),
            if chain.is_periodic() { "periodic" } else { "open" },
            chain.len(),
            layout.num_slices()
        );
        Ok(Self {
            chain,
            calculators,
            system,
            layout,
            workspace: ThreadLocal::new(),
        })
    }

    /// Adds the contributions of known derivatives at Hermite ends of an open chain.
    ///
    /// `known_front` and `known_back` give the derivative in the chain frame at the entry of the
    /// first link and the exit of the last link.
    fn add_known_ends(
        &self,
        rhs: &mut DVector<f64>,
        known_front: impl FnOnce() -> f64,
        known_back: impl FnOnce() -> f64,
    ) {
        let n = self.system.n();
        if n == 0 {
            return;
        }
        if let ChainKind::Open { front, back } = self.chain.kind() {
            let rows = self.system.rows();
            if front == BoundCond::Hermite {
                rhs[0] += rows[0].b * known_front();
            }
            if back == BoundCond::Hermite {
                rhs[n - 1] += rows[n - 1].a * known_back();
            }
        }
    }

    /// Assembles the right-hand side from lines of values, one per link, in the chain frame.
    fn interface_rhs(&self, lines: &[DVector<f64>]) -> Result<DVector<f64>, MultipatchError> {
        let mut rhs = DVector::zeros(self.system.n());
        for (i, (chain_interface, row)) in self
            .chain
            .interfaces()
            .iter()
            .zip(self.system.rows())
            .enumerate()
        {
            let before = &lines[i];
            let after = &lines[(i + 1) % lines.len()];
            let calculator = self.calculators.get(chain_interface.id)?;
            let c = if chain_interface.aligned {
                calculator.get_function_coefficients(before.into(), after.into())?
            } else {
                calculator.get_function_coefficients(after.into(), before.into())?
            };
            rhs[i] = row.rhs_sign * c;
        }
        Ok(rhs)
    }

    fn deriv_rhs<S: DerivativeStorage>(&self, storage: &S, slice: usize) -> Result<DVector<f64>, MultipatchError> {
        let links = self.chain.links();
        let lines: Vec<_> = links
            .iter()
            .enumerate()
            .map(|(j, link)| storage.value_line(link.patch, link.dim, self.layout.index(slice, j)))
            .collect();
        let mut rhs = self.interface_rhs(&lines)?;
        let last = links.len() - 1;
        self.add_known_ends(
            &mut rhs,
            || {
                let link = &links[0];
                let idx = self.layout.index(slice, 0);
                link.orientation.sign() * storage.deriv(link.patch, link.dim, link.entry_extremity(), idx)
            },
            || {
                let link = &links[last];
                let idx = self.layout.index(slice, last);
                link.orientation.sign() * storage.deriv(link.patch, link.dim, link.exit_extremity(), idx)
            },
        );
        Ok(rhs)
    }

    /// Right-hand side of the cross derivative system on the side `extremity` of the first patch.
    fn cross_rhs<S: DerivativeStorage>(
        &self,
        storage: &S,
        extremity: Extremity,
    ) -> Result<DVector<f64>, MultipatchError> {
        let links = self.chain.links();
        let lines: Vec<_> = links
            .iter()
            .map(|link| {
                let parallel = link.dim.other();
                link.parallel_orientation.sign()
                    * storage.deriv_line(link.patch, parallel, link.parallel_extremity(extremity))
            })
            .collect();
        let mut rhs = self.interface_rhs(&lines)?;
        let last = links.len() - 1;
        let known_cross = |link: &ChainLink, along: Extremity| {
            let (e1, e2) = corner(link.dim, along, link.parallel_extremity(extremity));
            cross_sign(link) * storage.cross_deriv(link.patch, e1, e2)
        };
        self.add_known_ends(
            &mut rhs,
            || known_cross(&links[0], links[0].entry_extremity()),
            || known_cross(&links[last], links[last].exit_extremity()),
        );
        Ok(rhs)
    }

    fn solve_all<F>(&self, n_slices: usize, rhs: F) -> Result<(Vec<DVector<f64>>, usize), MultipatchError>
    where
        F: Fn(usize) -> Result<DVector<f64>, MultipatchError> + Sync + Send,
    {
        let solutions = (0..n_slices)
            .into_par_iter()
            .map(|slice| {
                let rhs = rhs(slice)?;
                let mut workspace = self.workspace.get_or_default().borrow_mut();
                self.system.solve(&rhs, &mut workspace)
            })
            .collect::<Result<Vec<_>, MultipatchError>>()?;
        let max_iterations = solutions
            .iter()
            .map(|(_, iterations)| *iterations)
            .max()
            .unwrap_or(0);
        let solutions = solutions.into_iter().map(|(x, _)| x).collect();
        Ok((solutions, max_iterations))
    }

    fn solve_deriv<S>(&self, storage: &mut S) -> Result<SolveReport, MultipatchError>
    where
        S: DerivativeStorage + Sync,
    {
        let n_slices = self.layout.num_slices();
        if self.system.n() == 0 {
            return Ok(SolveReport::default());
        }
        let (solutions, max_iterations) = {
            let storage: &S = storage;
            self.solve_all(n_slices, |slice| self.deriv_rhs(storage, slice))?
        };

        let n_links = self.chain.len();
        for (slice, x) in solutions.iter().enumerate() {
            for (i, &derivative) in x.iter().enumerate() {
                let (before, after) = self.chain.interface_links(i);
                let idx_before = self.layout.index(slice, i);
                let idx_after = self.layout.index(slice, (i + 1) % n_links);
                storage.set_deriv(
                    before.patch,
                    before.dim,
                    before.exit_extremity(),
                    idx_before,
                    before.orientation.sign() * derivative,
                );
                storage.set_deriv(
                    after.patch,
                    after.dim,
                    after.entry_extremity(),
                    idx_after,
                    after.orientation.sign() * derivative,
                );
            }
        }

        debug!(
            "Reconciled interface derivatives on {} slices ({} unknowns, at most {} iterations)",
            n_slices,
            self.system.n(),
            max_iterations
        );
        Ok(SolveReport {
            slices: n_slices,
            max_iterations,
        })
    }

    fn solve_cross_deriv<S>(&self, storage: &mut S) -> Result<SolveReport, MultipatchError>
    where
        S: DerivativeStorage + Sync,
    {
        const SIDES: [Extremity; 2] = [Extremity::Front, Extremity::Back];
        if self.system.n() == 0 {
            return Ok(SolveReport::default());
        }
        let (solutions, max_iterations) = {
            let storage: &S = storage;
            self.solve_all(SIDES.len(), |side| self.cross_rhs(storage, SIDES[side]))?
        };

        for (&extremity, x) in SIDES.iter().zip(&solutions) {
            for (i, &derivative) in x.iter().enumerate() {
                let (before, after) = self.chain.interface_links(i);
                let (e1, e2) = corner(before.dim, before.exit_extremity(), before.parallel_extremity(extremity));
                storage.set_cross_deriv(before.patch, e1, e2, cross_sign(before) * derivative);
                let (e1, e2) = corner(after.dim, after.entry_extremity(), after.parallel_extremity(extremity));
                storage.set_cross_deriv(after.patch, e1, e2, cross_sign(after) * derivative);
            }
        }

        debug!(
            "Reconciled interface cross derivatives ({} unknowns, at most {} iterations)",
            self.system.n(),
            max_iterations
        );
        Ok(SolveReport {
            slices: SIDES.len(),
            max_iterations,
        })
    }
}

/// Interface derivative engine for a chain with arbitrary orientations and matching points.
///
/// Interpolation lines are followed across each interface by matching point coordinates, so
/// patches may be oriented differently as long as their points coincide on every interface.
#[derive(Debug)]
pub struct InterfaceDerivativeMatrix<'c, C = SingleInterfaceDerivativesCalculator> {
    engine: ChainEngine<'c, C, MatchedSlices>,
}

impl<'c, C> InterfaceDerivativeMatrix<'c, C>
where
    C: DerivativesCalculator + Sync,
{
    pub fn new(
        connectivity: &Connectivity,
        chain: Chain,
        calculators: &'c DerivativesCalculatorCollection<C>,
    ) -> Result<Self, MultipatchError> {
        Self::with_settings(connectivity, chain, calculators, SolverSettings::default())
    }

    pub fn with_settings(
        connectivity: &Connectivity,
        chain: Chain,
        calculators: &'c DerivativesCalculatorCollection<C>,
        settings: SolverSettings,
    ) -> Result<Self, MultipatchError> {
        let layout = MatchedSlices::new(connectivity, &chain)?;
        Ok(Self {
            engine: ChainEngine::new(chain, calculators, layout, &settings)?,
        })
    }

    pub fn chain(&self) -> &Chain {
        &self.engine.chain
    }

    /// Number of unknown interface derivatives per slice.
    pub fn n_unknowns(&self) -> usize {
        self.engine.system.n()
    }

    /// The system matrix coupling the interface derivatives, in the chain frame.
    pub fn system_matrix(&self) -> DMatrix<f64> {
        self.engine.system.to_dense()
    }
}

impl<'c, C> InterfaceDerivativeSolver for InterfaceDerivativeMatrix<'c, C>
where
    C: DerivativesCalculator + Sync,
{
    fn solve_deriv<S>(&self, storage: &mut S) -> Result<SolveReport, MultipatchError>
    where
        S: DerivativeStorage + Sync,
    {
        self.engine.solve_deriv(storage)
    }

    fn solve_cross_deriv<S>(&self, storage: &mut S) -> Result<SolveReport, MultipatchError>
    where
        S: DerivativeStorage + Sync,
    {
        self.engine.solve_cross_deriv(storage)
    }
}

/// Interface derivative engine for chains whose patches all share the orientation of the chain.
///
/// Every patch must run along the chain in increasing local coordinates, with the same parallel
/// orientation and number of points as the first patch. Slice `k` is then index `k` on every
/// patch.
#[derive(Debug)]
pub struct AlignedInterfaceDerivativeMatrix<'c, C = SingleInterfaceDerivativesCalculator> {
    engine: ChainEngine<'c, C, IdentitySlices>,
}

impl<'c, C> AlignedInterfaceDerivativeMatrix<'c, C>
where
    C: DerivativesCalculator + Sync,
{
    pub fn new(
        connectivity: &Connectivity,
        chain: Chain,
        calculators: &'c DerivativesCalculatorCollection<C>,
    ) -> Result<Self, MultipatchError> {
        Self::with_settings(connectivity, chain, calculators, SolverSettings::default())
    }

    pub fn with_settings(
        connectivity: &Connectivity,
        chain: Chain,
        calculators: &'c DerivativesCalculatorCollection<C>,
        settings: SolverSettings,
    ) -> Result<Self, MultipatchError> {
        let misaligned = chain
            .links()
            .iter()
            .any(|link| link.orientation != Orientation::Same || link.parallel_orientation != Orientation::Same);
        if misaligned || chain.interfaces().iter().any(|interface| !interface.aligned) {
            return Err(MultipatchError::configuration(
                "all patches of an aligned chain must share the orientation of the chain",
            ));
        }
        let n_slices = common_parallel_n_points(connectivity, &chain)?;
        Ok(Self {
            engine: ChainEngine::new(chain, calculators, IdentitySlices { n_slices }, &settings)?,
        })
    }

    pub fn chain(&self) -> &Chain {
        &self.engine.chain
    }

    pub fn n_unknowns(&self) -> usize {
        self.engine.system.n()
    }

    pub fn system_matrix(&self) -> DMatrix<f64> {
        self.engine.system.to_dense()
    }
}

impl<'c, C> InterfaceDerivativeSolver for AlignedInterfaceDerivativeMatrix<'c, C>
where
    C: DerivativesCalculator + Sync,
{
    fn solve_deriv<S>(&self, storage: &mut S) -> Result<SolveReport, MultipatchError>
    where
        S: DerivativeStorage + Sync,
    {
        self.engine.solve_deriv(storage)
    }

    fn solve_cross_deriv<S>(&self, storage: &mut S) -> Result<SolveReport, MultipatchError>
    where
        S: DerivativeStorage + Sync,
    {
        self.engine.solve_cross_deriv(storage)
    }
}
