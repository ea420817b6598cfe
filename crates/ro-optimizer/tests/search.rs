use std::collections::BTreeMap;

use ro_data::ColumnTable;
use ro_optimizer::{
    cut_hash, merge_backgrounds, rank_signal, resolved_hash, reverse_lookup, CutGrid, Dispatcher,
    SelectionEvaluator, SignificanceConfig,
};
use ro_types::{CountKind, CountTable, CutDimension, EventSource, GridAxis, SampleGroup, Supercuts};

fn m_eff_supercuts() -> Supercuts {
    serde_json::from_str(r#"[{"selections": "m_eff > {0}", "grid": [[100, 300, 100]]}]"#).unwrap()
}

fn events(name: &str, m_eff: f64, count: usize) -> ColumnTable {
    ColumnTable::new(name)
        .with_column("m_eff", vec![m_eff; count])
        .unwrap()
        .with_column("event_weight", vec![1.0; count])
        .unwrap()
}

fn counts(supercuts: &Supercuts, source: &dyn EventSource) -> CountTable {
    let grid = CutGrid::new(supercuts).unwrap();
    SelectionEvaluator::default()
        .count_sources(&grid, [source], 1.0)
        .unwrap()
}

#[test]
fn significance_falls_as_background_grows() {
    let supercuts = m_eff_supercuts();
    let grid = CutGrid::new(&supercuts).unwrap();
    assert_eq!(grid.len(), 2);
    let loose = grid.iter().next().unwrap();
    let loose_hash = cut_hash(&loose);

    let signal = counts(&supercuts, &events("signal", 150.0, 12));
    assert_eq!(signal[&loose_hash].weighted, 12.0);

    let config = SignificanceConfig::default().with_rank_by(CountKind::Weighted);
    let light = counts(&supercuts, &events("light", 150.0, 40));
    let heavy = counts(&supercuts, &events("heavy", 150.0, 400));

    let z = |background: &CountTable| {
        rank_signal(&signal, background, &config)
            .into_iter()
            .find(|e| e.hash == loose_hash)
            .unwrap()
            .significance_weighted
    };
    let z_light = z(&light);
    let z_heavy = z(&heavy);

    assert!(z_light.is_finite() && z_light > 0.0);
    assert!(z_light > z_heavy);
}

#[test]
fn tighter_cut_without_signal_is_a_sentinel() {
    let supercuts = m_eff_supercuts();
    let signal = counts(&supercuts, &events("signal", 150.0, 12));
    let background = counts(&supercuts, &events("bkg", 250.0, 40));

    let config = SignificanceConfig::default().with_rank_by(CountKind::Weighted);
    let ranked = rank_signal(&signal, &background, &config);
    assert_eq!(ranked.len(), 2);
    assert!(ranked[0].significance_weighted > 0.0);
    assert_eq!(ranked[1].significance_weighted, -1.0);
}

#[test]
fn every_hash_resolves_back_to_its_cut() {
    let supercuts = Supercuts::new(vec![
        CutDimension::grid("met > {0}", vec![GridAxis::new(0.0, 100.0, 25.0)]).unwrap(),
        CutDimension::grid(
            "{0} < ht && ht < {1}",
            vec![GridAxis::new(0.0, 2.0, 1.0), GridAxis::new(500.0, 1500.0, 500.0)],
        )
        .unwrap(),
        CutDimension::fixed("nJets >= {0}", vec![4.0]).unwrap(),
    ])
    .unwrap();
    let grid = CutGrid::new(&supercuts).unwrap();
    let hashes: Vec<_> = grid.iter().map(|c| cut_hash(&c)).collect();
    assert_eq!(hashes.len(), 16);

    let wanted = vec![hashes[0].clone(), hashes[7].clone(), hashes[15].clone()];
    let result = reverse_lookup(&grid, wanted.clone());
    assert!(result.is_complete());
    for hash in &wanted {
        assert_eq!(&resolved_hash(&result.resolved[hash]), hash);
    }
}

#[test]
fn dispatch_isolates_a_group_with_missing_columns() {
    let supercuts = m_eff_supercuts();
    let grid = CutGrid::new(&supercuts).unwrap();
    let evaluator = SelectionEvaluator::default();

    let mut sources: BTreeMap<String, ColumnTable> = BTreeMap::new();
    sources.insert("361000".into(), events("361000", 150.0, 20));
    sources.insert(
        "361001".into(),
        ColumnTable::new("361001").with_column("met", vec![1.0]).unwrap(),
    );
    sources.insert("361002".into(), events("361002", 250.0, 5));

    let groups: Vec<SampleGroup> = sources
        .keys()
        .map(|id| SampleGroup::new(id.clone(), vec![], "oTree"))
        .collect();
    let tables = std::sync::Mutex::new(BTreeMap::new());

    let report = Dispatcher::new(3)
        .dispatch(&groups, |group| {
            let source = &sources[&group.id];
            let table = evaluator.count_sources(&grid, [source as &dyn EventSource], 1.0)?;
            tables.lock().unwrap().insert(group.id.clone(), table);
            Ok(())
        })
        .unwrap();

    assert_eq!(report.succeeded(), 2);
    let failed: Vec<_> = report.failures().map(|o| o.sample.as_str()).collect();
    assert_eq!(failed, vec!["361001"]);
    assert!(report.outcomes[1].error.as_deref().unwrap().contains("m_eff"));

    let tables = tables.into_inner().unwrap();
    let merged = merge_backgrounds(tables.values());
    let loose = cut_hash(&grid.iter().next().unwrap());
    assert_eq!(merged[&loose].raw, 25.0);
}
