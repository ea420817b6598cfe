//! Per-sample normalization factors.

use std::collections::BTreeMap;
use tracing::{info, warn};

use ro_types::{DataError, MetadataTable, RoResult, SampleMetadata};

fn required(sample: &str, field: &str, value: Option<f64>) -> Result<f64, DataError> {
    value.ok_or_else(|| DataError::MissingMetadataField {
        sample: sample.to_string(),
        field: field.to_string(),
    })
}

/// `cross_section * filter_efficiency * k_factor / num_processed_events`.
///
/// Samples absent from the table scale by 1.0 with a warning. A present
/// sample must carry all four fields and a positive event count.
pub fn scale_factor(table: &MetadataTable, sample: &str) -> RoResult<f64> {
    let Some(metadata) = table.get(sample) else {
        warn!(sample, "Could not find sample in metadata, using scale factor 1.0");
        return Ok(1.0);
    };
    Ok(compute(sample, metadata)?)
}

fn compute(sample: &str, metadata: &SampleMetadata) -> Result<f64, DataError> {
    let cross_section = required(sample, "cross_section", metadata.cross_section)?;
    let filter_efficiency = required(sample, "filter_efficiency", metadata.filter_efficiency)?;
    let k_factor = required(sample, "k_factor", metadata.k_factor)?;
    let num_events = required(sample, "num_processed_events", metadata.num_processed_events)?;

    if !(num_events.is_finite() && num_events > 0.0) {
        return Err(DataError::ZeroProcessedEvents {
            sample: sample.to_string(),
            num_events,
        });
    }

    let factor = cross_section * filter_efficiency * k_factor / num_events;
    info!(
        sample,
        cross_section,
        filter_efficiency,
        k_factor,
        num_events,
        scale_factor = factor,
        "Computed scale factor"
    );
    Ok(factor)
}

/// Resolve every sample's factor up front so metadata problems abort the
/// run before any evaluation starts.
pub fn scale_factors<S: AsRef<str>>(
    table: &MetadataTable,
    samples: &[S],
) -> RoResult<BTreeMap<String, f64>> {
    samples
        .iter()
        .map(|s| Ok((s.as_ref().to_string(), scale_factor(table, s.as_ref())?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ro_types::RoError;

    fn table() -> MetadataTable {
        MetadataTable::new(36.1)
            .with_sample("410000", SampleMetadata::new(696.11, 0.543, 1.1949, 4.98e7))
            .with_sample("361000", SampleMetadata::new(1.0, 1.0, 1.0, 0.0))
            .with_sample(
                "370100",
                SampleMetadata {
                    cross_section: Some(0.1),
                    filter_efficiency: Some(1.0),
                    k_factor: None,
                    num_processed_events: Some(1.0e4),
                },
            )
    }

    #[test]
    fn known_sample_uses_formula() {
        let sf = scale_factor(&table(), "410000").unwrap();
        assert_relative_eq!(sf, 696.11 * 0.543 * 1.1949 / 4.98e7, max_relative = 1e-12);
    }

    #[test]
    fn unknown_sample_scales_by_one() {
        assert_eq!(scale_factor(&table(), "999999").unwrap(), 1.0);
    }

    #[test]
    fn zero_events_is_fatal_configuration() {
        let err = scale_factor(&table(), "361000").unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, RoError::Data(DataError::ZeroProcessedEvents { .. })));
    }

    #[test]
    fn missing_field_names_sample_and_field() {
        let err = scale_factor(&table(), "370100").unwrap_err();
        match err {
            RoError::Data(DataError::MissingMetadataField { sample, field }) => {
                assert_eq!(sample, "370100");
                assert_eq!(field, "k_factor");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn preflight_stops_at_first_bad_sample() {
        let t = table();
        let ok = scale_factors(&t, &["410000", "999999"]).unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok["999999"], 1.0);
        assert!(scale_factors(&t, &["410000", "361000"]).is_err());
    }
}
