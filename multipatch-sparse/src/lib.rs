//! Sparse linear solvers for the interface systems arising in `multipatch`.
//!
//! The systems are small (one unknown per interface of a chain of patches) but not symmetric,
//! so the workhorse is a preconditioned BiCGSTAB.
pub mod bicgstab;
pub mod operator;
