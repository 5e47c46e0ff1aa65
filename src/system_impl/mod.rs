//! Model molecular systems and their restricted Hartree-Fock reference
//!
//! Systems are synthetic: integrals and quadrature grids are generated from a
//! seed, sized by the element list and the basis-set name.
//!
//! # Usage
//!
//! ```rust,ignore
//! use feff_check::{ModelScf, ModelSystem, ScfSettings};
//! use periodic_table_on_an_enum::Element;
//!
//! let lih = ModelSystem::from_atoms("LiH", &[Element::Lithium, Element::Hydrogen], "sto-3g", 7, 32)?;
//! let scf = ModelScf::new(ScfSettings::default()).run(&lih)?;
//! ```

mod model;
mod scf;

pub use model::{basis_size, ModelSystem};
pub use scf::{align_eigenvectors, sorted_symmetric_eigen, Diis, ModelScf, ScfResult, ScfSettings};
