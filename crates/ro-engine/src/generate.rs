//! The `generate` pipeline: a starting supercut file from one event file.

use tracing::{debug, info};

use ro_data::{ensure_absent, load_table, matches_any, write_supercuts};
use ro_types::{expression_variables, CutDimension, EventSource, GridAxis, RoResult, Supercuts};

use crate::config::GenerateConfig;

/// Grid every generated dimension starts from.
const DEFAULT_AXIS: (f64, f64, f64) = (0.0, 10.0, 1.0);

/// Run `generate`, returning the supercuts that were written.
pub fn run_generate(config: &GenerateConfig) -> RoResult<Supercuts> {
    ensure_absent(&config.output, config.overwrite)?;

    let table = load_table(&config.file, &config.tree_name)?;
    let weight_columns = expression_variables(&config.event_weight);

    let mut dimensions = Vec::new();
    for column in table.column_names() {
        if weight_columns.contains(&column) || matches_any(&column, &config.skip)? {
            debug!(column = %column, "Skipping column");
            continue;
        }
        let selections = format!("{column} > {{0}}");
        let dimension = if matches_any(&column, &config.fixed)? {
            CutDimension::fixed(&selections, vec![0.0])?
        } else {
            let (start, stop, step) = DEFAULT_AXIS;
            CutDimension::grid(&selections, vec![GridAxis::new(start, stop, step)])?
        };
        dimensions.push(dimension);
    }
    dimensions.sort_by(|a, b| a.selections().cmp(b.selections()));

    let supercuts = Supercuts::new(dimensions)?;
    write_supercuts(&config.output, &supercuts)?;
    info!(
        dimensions = supercuts.len(),
        output = %config.output.display(),
        "Wrote supercut template"
    );
    Ok(supercuts)
}
