//! Reconciliation of cubic-spline derivatives across the interfaces of multipatch domains.
//!
//! A domain is covered by logically rectangular patches, each carrying a tensor-product grid of
//! interpolation points. Per-patch cubic splines are only C1 across patch boundaries if the
//! derivatives on either side of each interface agree with the spline of the whole chain of
//! patches. This crate computes those derivatives:
//!
//! - [`calculator`] reduces one interface to a relation between its derivative, the derivatives
//!   at the neighbouring interfaces and the function values around it;
//! - [`collection`] gathers the calculators of many interfaces;
//! - [`matrix`] couples the relations along a [`chain`] of patches and solves for all interface
//!   derivatives and corner cross derivatives.
pub mod calculator;
pub mod chain;
pub mod collection;
pub mod connectivity;
pub mod edge_transformation;
pub mod error;
pub mod field;
pub mod grid;
pub mod matrix;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;

pub use error::MultipatchError;
