//! Supercut specification: the declarative description of every selection
//! axis searched by the optimizer.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::SupercutError;
use crate::template::SelectionTemplate;

/// One half-open `[start, stop)` axis sampled every `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 3]", from = "[f64; 3]")]
pub struct GridAxis {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl GridAxis {
    /// Longest axis a supercut may declare.
    pub const MAX_LEN: usize = u32::MAX as usize;

    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    /// Number of values, `ceil((stop - start) / step)`; zero when
    /// `step <= 0`, `stop <= start` or any bound is not finite, `None` when
    /// the count exceeds [`GridAxis::MAX_LEN`].
    pub fn checked_len(&self) -> Option<usize> {
        let finite = self.start.is_finite() && self.stop.is_finite() && self.step.is_finite();
        if !finite || self.step <= 0.0 || self.stop <= self.start {
            return Some(0);
        }
        let count = ((self.stop - self.start) / self.step).ceil();
        if count > Self::MAX_LEN as f64 {
            None
        } else {
            Some(count as usize)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.checked_len() == Some(0)
    }

    /// The `index`-th value, `start + index * step`.
    pub fn value(&self, index: usize) -> f64 {
        self.start + index as f64 * self.step
    }

    /// `start, start + step, ...` strictly below `stop`.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.checked_len().unwrap_or(0)).map(|i| self.value(i))
    }
}

impl From<GridAxis> for [f64; 3] {
    fn from(axis: GridAxis) -> Self {
        [axis.start, axis.stop, axis.step]
    }
}

impl From<[f64; 3]> for GridAxis {
    fn from(triple: [f64; 3]) -> Self {
        Self::new(triple[0], triple[1], triple[2])
    }
}

/// How a dimension contributes pivot values.
#[derive(Debug, Clone, PartialEq)]
pub enum Pivots {
    /// A single fixed pivot tuple.
    Fixed(Vec<f64>),
    /// One grid axis per placeholder; the dimension contributes their
    /// Cartesian product.
    Grid(Vec<GridAxis>),
}

/// One selection axis of the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDimension", into = "RawDimension")]
pub struct CutDimension {
    pub template: SelectionTemplate,
    pub pivots: Pivots,
}

impl CutDimension {
    pub fn fixed(selections: &str, pivot: Vec<f64>) -> Result<Self, SupercutError> {
        Self::validated(selections, Pivots::Fixed(pivot))
    }

    pub fn grid(selections: &str, axes: Vec<GridAxis>) -> Result<Self, SupercutError> {
        Self::validated(selections, Pivots::Grid(axes))
    }

    fn validated(selections: &str, pivots: Pivots) -> Result<Self, SupercutError> {
        let template = SelectionTemplate::parse(selections).map_err(|message| {
            SupercutError::MalformedTemplate {
                selections: selections.to_string(),
                message,
            }
        })?;

        let arity = match &pivots {
            Pivots::Fixed(values) => values.len(),
            Pivots::Grid(axes) => {
                for (i, axis) in axes.iter().enumerate() {
                    match axis.checked_len() {
                        Some(0) => {
                            return Err(SupercutError::EmptyAxis {
                                selections: selections.to_string(),
                                axis: i,
                                start: axis.start,
                                stop: axis.stop,
                                step: axis.step,
                            })
                        }
                        None => {
                            return Err(SupercutError::AxisTooLong {
                                selections: selections.to_string(),
                                axis: i,
                                start: axis.start,
                                stop: axis.stop,
                                step: axis.step,
                                max: GridAxis::MAX_LEN,
                            })
                        }
                        Some(_) => {}
                    }
                }
                axes.len()
            }
        };

        if template.arity() > arity {
            return Err(SupercutError::PlaceholderOutOfRange {
                selections: selections.to_string(),
                index: template.arity() - 1,
                arity,
            });
        }

        Ok(Self { template, pivots })
    }

    pub fn selections(&self) -> &str {
        self.template.as_str()
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self.pivots, Pivots::Fixed(_))
    }

    /// Number of pivot tuples this dimension contributes, `None` on
    /// overflow or an over-long axis.
    pub fn cardinality(&self) -> Option<usize> {
        match &self.pivots {
            Pivots::Fixed(_) => Some(1),
            Pivots::Grid(axes) => axes
                .iter()
                .try_fold(1usize, |acc, axis| acc.checked_mul(axis.checked_len()?)),
        }
    }

    /// The `index`-th pivot tuple of this dimension, later axes varying
    /// fastest. `index` must be below [`CutDimension::cardinality`].
    pub fn pivot_tuple(&self, index: usize) -> Vec<f64> {
        match &self.pivots {
            Pivots::Fixed(values) => values.clone(),
            Pivots::Grid(axes) => {
                let mut tuple = vec![0.0; axes.len()];
                let mut rest = index;
                for (slot, axis) in tuple.iter_mut().zip(axes).rev() {
                    let len = axis.checked_len().unwrap_or(0).max(1);
                    *slot = axis.value(rest % len);
                    rest /= len;
                }
                tuple
            }
        }
    }
}

/// Fixed pivots may be written as a bare number or as a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum PivotValues {
    Scalar(f64),
    List(Vec<f64>),
}

/// On-disk shape of a dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDimension {
    #[serde(alias = "selection_template")]
    selections: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pivot: Option<PivotValues>,
    #[serde(default, alias = "st3", skip_serializing_if = "Option::is_none")]
    grid: Option<Vec<Vec<f64>>>,
}

impl TryFrom<RawDimension> for CutDimension {
    type Error = SupercutError;

    fn try_from(raw: RawDimension) -> Result<Self, Self::Error> {
        match (raw.pivot, raw.grid) {
            (Some(pivot), None) => {
                let values = match pivot {
                    PivotValues::Scalar(v) => vec![v],
                    PivotValues::List(vs) => vs,
                };
                CutDimension::fixed(&raw.selections, values)
            }
            (None, Some(grid)) => {
                let mut axes = Vec::with_capacity(grid.len());
                for (i, triple) in grid.iter().enumerate() {
                    match triple.as_slice() {
                        [start, stop, step] => axes.push(GridAxis::new(*start, *stop, *step)),
                        _ => {
                            return Err(SupercutError::MalformedAxis {
                                selections: raw.selections.clone(),
                                axis: i,
                                len: triple.len(),
                            })
                        }
                    }
                }
                CutDimension::grid(&raw.selections, axes)
            }
            _ => Err(SupercutError::AmbiguousKind {
                selections: raw.selections,
            }),
        }
    }
}

impl From<CutDimension> for RawDimension {
    fn from(dim: CutDimension) -> Self {
        let selections = String::from(dim.template);
        match dim.pivots {
            Pivots::Fixed(values) => RawDimension {
                selections,
                pivot: Some(PivotValues::List(values)),
                grid: None,
            },
            Pivots::Grid(axes) => RawDimension {
                selections,
                pivot: None,
                grid: Some(
                    axes.into_iter()
                        .map(|a| vec![a.start, a.stop, a.step])
                        .collect(),
                ),
            },
        }
    }
}

/// An ordered, duplicate-free sequence of dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CutDimension>", into = "Vec<CutDimension>")]
pub struct Supercuts {
    dimensions: Vec<CutDimension>,
}

impl Supercuts {
    pub fn new(dimensions: Vec<CutDimension>) -> Result<Self, SupercutError> {
        let mut seen = HashSet::new();
        for dim in &dimensions {
            if !seen.insert(dim.selections()) {
                return Err(SupercutError::DuplicateSelection {
                    selections: dim.selections().to_string(),
                });
            }
        }
        Ok(Self { dimensions })
    }

    pub fn dimensions(&self) -> &[CutDimension] {
        &self.dimensions
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Total number of combinations, `None` on overflow.
    pub fn grid_size(&self) -> Option<usize> {
        self.dimensions
            .iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(dim.cardinality()?))
    }

    /// Union of the column names referenced by every template.
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for dim in &self.dimensions {
            for name in dim.template.variables() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

impl TryFrom<Vec<CutDimension>> for Supercuts {
    type Error = SupercutError;

    fn try_from(dimensions: Vec<CutDimension>) -> Result<Self, Self::Error> {
        Self::new(dimensions)
    }
}

impl From<Supercuts> for Vec<CutDimension> {
    fn from(supercuts: Supercuts) -> Self {
        supercuts.dimensions
    }
}
