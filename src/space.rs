//! Core/active/virtual partitioning of the orbital space

use crate::error::{FeffError, Result};
use std::ops::Range;

/// Orbital partition: `ncore` doubly occupied orbitals followed by `ncas`
/// active orbitals; everything above `ncore + ncas` is virtual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveSpace {
    pub ncore: usize,
    pub ncas: usize,
}

impl ActiveSpace {
    pub fn new(ncore: usize, ncas: usize) -> Self {
        ActiveSpace { ncore, ncas }
    }

    pub fn nocc(&self) -> usize {
        self.ncore + self.ncas
    }

    pub fn nvir(&self, nmo: usize) -> usize {
        nmo.saturating_sub(self.nocc())
    }

    pub fn core(&self) -> Range<usize> {
        0..self.ncore
    }

    pub fn active(&self) -> Range<usize> {
        self.ncore..self.nocc()
    }

    /// Fails when the partition selects more orbitals than `nmo`.
    pub fn check(&self, nmo: usize) -> Result<()> {
        if self.ncas == 0 {
            return Err(FeffError::InvalidActiveSpace(
                "active space must contain at least one orbital".to_string(),
            ));
        }
        if self.nocc() > nmo {
            return Err(FeffError::DimensionMismatch {
                context: "active orbitals (ncore + ncas) vs available orbitals",
                expected: nmo,
                found: self.nocc(),
            });
        }
        Ok(())
    }

    /// Number of non-redundant orbital rotations:
    /// core-active, core-virtual and active-virtual pairs.
    pub fn ngorb(&self, nmo: usize) -> usize {
        self.ncore * self.ncas + self.nocc() * self.nvir(nmo)
    }

    /// Non-redundant rotation pairs `(p, q)` with `p > q`, in row-major order
    /// of the lower triangle. This fixes the layout of the orbital block of
    /// every gradient and perturbation vector.
    pub fn rotation_pairs(&self, nmo: usize) -> Vec<(usize, usize)> {
        let (ncore, nocc) = (self.ncore, self.nocc());
        let mut pairs = Vec::with_capacity(self.ngorb(nmo));
        for p in 0..nmo {
            for q in 0..p {
                let core_column = p >= ncore && q < ncore;
                let active_virtual = p >= nocc && q >= ncore && q < nocc;
                if core_column || active_virtual {
                    pairs.push((p, q));
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_pair_count_matches_ngorb() {
        for &(ncore, ncas, nmo) in &[(1, 2, 6), (0, 3, 6), (2, 2, 7), (0, 2, 2)] {
            let space = ActiveSpace::new(ncore, ncas);
            assert_eq!(space.rotation_pairs(nmo).len(), space.ngorb(nmo));
        }
    }

    #[test]
    fn test_rotation_pairs_exclude_internal_rotations() {
        let space = ActiveSpace::new(1, 2);
        let pairs = space.rotation_pairs(5);
        assert!(!pairs.contains(&(2, 1)));
        assert!(!pairs.contains(&(4, 3)));
        assert_eq!(pairs[0], (1, 0));
        assert!(pairs.contains(&(3, 0)));
        assert!(pairs.contains(&(4, 2)));
    }

    #[test]
    fn test_check_rejects_oversized_active_space() {
        let space = ActiveSpace::new(2, 5);
        assert!(matches!(
            space.check(6),
            Err(FeffError::DimensionMismatch { expected: 6, found: 7, .. })
        ));
        assert!(ActiveSpace::new(1, 2).check(6).is_ok());
    }
}
