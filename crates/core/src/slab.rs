//! Default structure transform: turn a bulk cell into a relaxation slab.

use crate::collaborators::StructureTransform;
use crate::error::CoreError;
use crate::structure::Structure;

/// Pads, opens and perturbs a bulk structure.
///
/// 1. Repeat along the c axis until at least `min_atoms` atoms exist.
/// 2. Lengthen the c axis by `vacuum` Å.
/// 3. Wrap atoms back into the cell.
/// 4. Rattle every coordinate with Gaussian noise of `rattle_stdev` Å,
///    from a generator seeded with `seed` on every call.
#[derive(Debug, Clone)]
pub struct SlabBuilder {
    pub min_atoms: usize,
    pub vacuum: f64,
    pub rattle_stdev: f64,
    pub seed: u64,
}

impl Default for SlabBuilder {
    fn default() -> Self {
        Self {
            min_atoms: 30,
            vacuum: 20.0,
            rattle_stdev: 0.05,
            seed: 42,
        }
    }
}

impl SlabBuilder {
    pub fn build(&self, bulk: &Structure) -> Result<Structure, CoreError> {
        bulk.validate()?;
        if bulk.is_empty() {
            return Err(CoreError::Validation(
                "cannot build a slab from an empty structure".to_string(),
            ));
        }

        let mut slab = bulk.clone();
        while slab.len() < self.min_atoms {
            slab = slab.repeat([1, 1, 2]);
        }

        slab.cell[2][2] += self.vacuum;
        slab.wrap()?;
        slab.rattle(self.rattle_stdev, self.seed);

        Ok(slab)
    }
}

impl StructureTransform for SlabBuilder {
    fn derive_relaxation_structure(&self, bulk: &Structure) -> Result<Structure, CoreError> {
        self.build(bulk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silicon() -> Structure {
        Structure::new(
            vec!["Si".into(), "Si".into()],
            vec![[0.0, 0.0, 0.0], [1.3575, 1.3575, 1.3575]],
            [[0.0, 2.715, 2.715], [2.715, 0.0, 2.715], [2.715, 2.715, 0.0]],
            [true, true, true],
        )
    }

    #[test]
    fn pads_to_minimum_atom_count() {
        let slab = SlabBuilder::default().build(&silicon()).unwrap();
        // 2 -> 4 -> 8 -> 16 -> 32
        assert_eq!(slab.len(), 32);
        assert_eq!(slab.symbols.len(), 32);
    }

    #[test]
    fn large_structures_are_not_repeated() {
        let builder = SlabBuilder {
            min_atoms: 2,
            ..Default::default()
        };
        let slab = builder.build(&silicon()).unwrap();
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn adds_vacuum_along_c() {
        let builder = SlabBuilder {
            min_atoms: 1,
            rattle_stdev: 0.0,
            ..Default::default()
        };
        let slab = builder.build(&silicon()).unwrap();
        assert_eq!(slab.cell[2][2], 20.0);
        assert_eq!(slab.cell[0], silicon().cell[0]);
    }

    #[test]
    fn same_input_gives_same_slab() {
        let builder = SlabBuilder::default();
        let a = builder.build(&silicon()).unwrap();
        let b = builder.build(&silicon()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_structure_rejected() {
        let empty = Structure::new(vec![], vec![], silicon().cell, [true; 3]);
        assert!(SlabBuilder::default().build(&empty).is_err());
    }
}
