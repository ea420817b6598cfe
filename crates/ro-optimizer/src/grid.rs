//! Exhaustive cut-grid enumeration.
//!
//! A [`CutGrid`] walks the Cartesian product of every dimension's pivot
//! tuples lazily, one [`CutAssignment`] at a time. Pivot values are computed
//! from the cursor, never materialised. Dimensions are taken in their
//! declared order and the last dimension varies fastest.

use ro_types::{CutAssignment, CutPoint, SupercutError, Supercuts};

/// The finite, restartable space of cut combinations for one supercut set.
#[derive(Debug, Clone)]
pub struct CutGrid<'s> {
    supercuts: &'s Supercuts,
    /// Per dimension, how many pivot tuples it can take.
    cardinalities: Vec<usize>,
    size: usize,
}

impl<'s> CutGrid<'s> {
    pub fn new(supercuts: &'s Supercuts) -> Result<Self, SupercutError> {
        if supercuts.is_empty() {
            return Err(SupercutError::EmptyGrid);
        }
        let size = supercuts.grid_size().ok_or(SupercutError::GridOverflow)?;
        if size == 0 {
            return Err(SupercutError::EmptyGrid);
        }

        let cardinalities = supercuts
            .dimensions()
            .iter()
            .map(|dim| dim.cardinality().ok_or(SupercutError::GridOverflow))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            supercuts,
            cardinalities,
            size,
        })
    }

    /// Total number of combinations.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn supercuts(&self) -> &'s Supercuts {
        self.supercuts
    }

    /// Start a fresh pass over the grid. Every pass yields the same
    /// sequence.
    pub fn iter(&self) -> CutIter<'_, 's> {
        CutIter {
            grid: self,
            cursor: vec![0; self.cardinalities.len()],
            remaining: self.size,
        }
    }
}

impl<'g, 's> IntoIterator for &'g CutGrid<'s> {
    type Item = CutAssignment<'s>;
    type IntoIter = CutIter<'g, 's>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Odometer over the grid's axes.
#[derive(Debug, Clone)]
pub struct CutIter<'g, 's> {
    grid: &'g CutGrid<'s>,
    cursor: Vec<usize>,
    remaining: usize,
}

impl<'s> CutIter<'_, 's> {
    fn advance(&mut self) {
        for dim in (0..self.cursor.len()).rev() {
            self.cursor[dim] += 1;
            if self.cursor[dim] < self.grid.cardinalities[dim] {
                return;
            }
            self.cursor[dim] = 0;
        }
    }
}

impl<'s> Iterator for CutIter<'_, 's> {
    type Item = CutAssignment<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let supercuts: &'s Supercuts = self.grid.supercuts;
        let points = supercuts
            .dimensions()
            .iter()
            .zip(&self.cursor)
            .map(|(definition, &i)| CutPoint {
                template: &definition.template,
                pivot: definition.pivot_tuple(i),
                fixed: definition.is_fixed(),
            })
            .collect();

        self.remaining -= 1;
        if self.remaining > 0 {
            self.advance();
        }
        Some(CutAssignment::new(points))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for CutIter<'_, '_> {}
