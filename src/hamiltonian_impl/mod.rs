//! Effective Hamiltonian construction
//!
//! [`EffectiveHamiltonianBuilder`] turns density tensors and an on-top
//! kernel into AO operators (`veff`, `feff`); [`EffectiveTwoBody`] exposes a
//! two-body AO tensor through the MO-basis views consumed by the gradient
//! and contraction code.

mod builder;
mod eris;
mod tests;

pub use builder::{build, AoEffectiveHamiltonian, EffectiveHamiltonianBuilder, KernelVariables};
pub use eris::{EffectiveTwoBody, ViewOptions};
