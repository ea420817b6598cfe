//! Applying cut combinations to an event source.

use tracing::{debug, info};

use ro_types::{CountRecord, CountTable, CutAssignment, EvaluationError, EventSource, Supercuts};

use crate::grid::CutGrid;
use crate::hash::cut_hash;

/// Conjunction of every rendered selection, each parenthesized:
/// `(s1)*(s2)*...`.
pub fn selection_expression(cut: &CutAssignment<'_>) -> String {
    cut.points()
        .iter()
        .map(|p| format!("({})", p.selection()))
        .collect::<Vec<_>>()
        .join("*")
}

/// Evaluates cuts against event sources with a fixed per-event weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEvaluator {
    weight_expression: String,
}

impl SelectionEvaluator {
    pub fn new(weight_expression: impl Into<String>) -> Self {
        Self {
            weight_expression: weight_expression.into(),
        }
    }

    pub fn weight_expression(&self) -> &str {
        &self.weight_expression
    }

    /// Columns a source must carry to evaluate every cut of `supercuts`.
    pub fn required_columns(&self, supercuts: &Supercuts) -> Vec<String> {
        let mut columns = ro_types::expression_variables(&self.weight_expression);
        for name in supercuts.variables() {
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
        columns
    }

    /// Fails with every missing column at once rather than the first one
    /// an expression happens to hit.
    pub fn check_columns(
        &self,
        supercuts: &Supercuts,
        source: &dyn EventSource,
    ) -> Result<(), EvaluationError> {
        let missing: Vec<String> = self
            .required_columns(supercuts)
            .into_iter()
            .filter(|c| !source.has_column(c))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EvaluationError::MissingColumns {
                source_name: source.name().to_string(),
                columns: missing,
            })
        }
    }

    /// Raw and weighted counts for one cut.
    ///
    /// Raw counts events whose weighted selection is nonzero, so events
    /// with zero weight do not count even when they pass.
    pub fn evaluate(
        &self,
        cut: &CutAssignment<'_>,
        source: &dyn EventSource,
    ) -> Result<(f64, f64), EvaluationError> {
        let expression = format!("({})*{}", self.weight_expression, selection_expression(cut));
        let values = source.evaluate(&expression)?;
        let raw = values.iter().filter(|v| **v != 0.0).count() as f64;
        let weighted: f64 = values.iter().sum();
        Ok((raw, weighted))
    }

    /// Add the counts of every cut in `grid` for `source` into `table`.
    pub fn accumulate(
        &self,
        grid: &CutGrid<'_>,
        source: &dyn EventSource,
        scale_factor: f64,
        table: &mut CountTable,
    ) -> Result<(), EvaluationError> {
        self.check_columns(grid.supercuts(), source)?;
        debug!(
            source = source.name(),
            events = source.num_events(),
            cuts = grid.len(),
            "Applying cuts"
        );

        for cut in grid.iter() {
            let (raw, weighted) = self.evaluate(&cut, source)?;
            *table.entry(cut_hash(&cut)).or_default() += CountRecord::new(raw, weighted, scale_factor);
        }

        info!(source = source.name(), cuts = grid.len(), "Applied cuts");
        Ok(())
    }

    /// Counts for one sample made of several sources.
    pub fn count_sources<'a, I>(
        &self,
        grid: &CutGrid<'_>,
        sources: I,
        scale_factor: f64,
    ) -> Result<CountTable, EvaluationError>
    where
        I: IntoIterator<Item = &'a dyn EventSource>,
    {
        let mut table = CountTable::new();
        for source in sources {
            self.accumulate(grid, source, scale_factor, &mut table)?;
        }
        Ok(table)
    }
}

impl Default for SelectionEvaluator {
    fn default() -> Self {
        Self::new("event_weight")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ro_types::{CutDimension, CutPoint, GridAxis, SelectionTemplate};
    use std::cell::RefCell;

    struct CannedSource {
        columns: Vec<&'static str>,
        values: Vec<f64>,
        seen: RefCell<Vec<String>>,
    }

    impl CannedSource {
        fn new(columns: Vec<&'static str>, values: Vec<f64>) -> Self {
            Self { columns, values, seen: RefCell::new(Vec::new()) }
        }
    }

    impl EventSource for CannedSource {
        fn name(&self) -> &str {
            "canned"
        }

        fn num_events(&self) -> usize {
            self.values.len()
        }

        fn has_column(&self, column: &str) -> bool {
            self.columns.contains(&column)
        }

        fn column_names(&self) -> Vec<String> {
            self.columns.iter().map(|c| c.to_string()).collect()
        }

        fn evaluate(&self, expression: &str) -> Result<Vec<f64>, EvaluationError> {
            self.seen.borrow_mut().push(expression.to_string());
            Ok(self.values.clone())
        }
    }

    #[test]
    fn conjunction_wraps_each_selection() {
        let a = SelectionTemplate::parse("met > {0}").unwrap();
        let b = SelectionTemplate::parse("nJets >= {0}").unwrap();
        let cut = CutAssignment::new(vec![
            CutPoint { template: &a, pivot: vec![150.0], fixed: false },
            CutPoint { template: &b, pivot: vec![4.0], fixed: true },
        ]);
        assert_eq!(selection_expression(&cut), "(met > 150)*(nJets >= 4)");
    }

    #[test]
    fn raw_counts_nonzero_and_weighted_sums() {
        let t = SelectionTemplate::parse("met > {0}").unwrap();
        let cut = CutAssignment::new(vec![CutPoint { template: &t, pivot: vec![1.0], fixed: false }]);
        let source = CannedSource::new(vec!["met", "w"], vec![0.0, 1.5, 0.0, 2.0, -0.5]);
        let evaluator = SelectionEvaluator::new("w");

        let (raw, weighted) = evaluator.evaluate(&cut, &source).unwrap();
        assert_eq!(raw, 3.0);
        assert_eq!(weighted, 3.0);
        assert_eq!(source.seen.borrow()[0], "(w)*(met > 1)");
    }

    #[test]
    fn missing_columns_reported_together() {
        let sc = Supercuts::new(vec![
            CutDimension::grid("met > {0}", vec![GridAxis::new(0.0, 2.0, 1.0)]).unwrap(),
            CutDimension::fixed("ht > {0} && nJets > 2", vec![100.0]).unwrap(),
        ])
        .unwrap();
        let source = CannedSource::new(vec!["met"], vec![1.0]);
        let evaluator = SelectionEvaluator::new("weight_mc * weight_pu");

        let err = evaluator.check_columns(&sc, &source).unwrap_err();
        match err {
            EvaluationError::MissingColumns { source_name, columns } => {
                assert_eq!(source_name, "canned");
                assert_eq!(columns, vec!["weight_mc", "weight_pu", "ht", "nJets"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn sources_accumulate_into_one_table() {
        let sc = Supercuts::new(vec![
            CutDimension::grid("met > {0}", vec![GridAxis::new(0.0, 3.0, 1.0)]).unwrap(),
        ])
        .unwrap();
        let grid = CutGrid::new(&sc).unwrap();
        let first = CannedSource::new(vec!["met", "event_weight"], vec![1.0, 0.0, 2.0]);
        let second = CannedSource::new(vec!["met", "event_weight"], vec![0.5]);
        let evaluator = SelectionEvaluator::default();

        let sources: Vec<&dyn EventSource> = vec![&first, &second];
        let table = evaluator.count_sources(&grid, sources, 2.0).unwrap();

        assert_eq!(table.len(), 3);
        for record in table.values() {
            assert_eq!(record.raw, 3.0);
            assert_eq!(record.weighted, 3.5);
            assert_eq!(record.scaled, 7.0);
        }
        assert_eq!(first.seen.borrow().len(), 3);
    }
}
