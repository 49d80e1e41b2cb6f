//! The `phaseport_core` crate is the computational engine behind the phase-portrait
//! and bifurcation explorer. It locates and classifies equilibria of 1D/2D
//! autonomous systems, samples vector fields and nullcline grids, integrates
//! trajectories with an adaptive embedded Runge-Kutta pair, and sweeps a scalar
//! parameter to assemble bifurcation diagrams.
//!
//! Key components:
//! - **Field**: `SystemField`, a closed set of system kinds (1D/2D custom, 2D linear,
//!   named 3D) behind one evaluation capability, with guarded evaluation so an
//!   undefined point never aborts a batch.
//! - **Newton**: damped Newton root solve used by the multi-seed equilibrium search.
//! - **Equilibrium**: seed scan, validation, deduplication, and eigenvalue-based
//!   stability classification.
//! - **Solvers/Trajectory**: Dormand-Prince 5(4) stepper with adaptive step control
//!   and dense output.
//! - **Bifurcation**: parameter sweep, greedy branch tracking, and count-based
//!   event classification.
//! - **System**: owning objects that cache the last computed equilibrium set.
pub mod bifurcation;
pub mod equilibrium;
pub mod error;
pub mod field;
pub mod jacobian;
pub mod newton;
pub mod sampler;
pub mod solvers;
pub mod system;
pub mod trajectory;

/// Fire-and-forget progress notification supplied alongside long-running calls.
/// Messages are informational only; they are not part of any return contract.
pub type LogCallback<'a> = &'a dyn Fn(&str);
