use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use tempfile::TempDir;

use ro_data::{read_json, read_supercuts, ResultStore};
use ro_engine::{
    run_cut, run_generate, run_hash, run_optimize, run_summary, CutConfig, GenerateConfig,
    HashConfig, OptimizeConfig, SummaryConfig,
};
use ro_optimizer::{cut_hash, resolved_hash, CutGrid, SignificanceConfig};
use ro_types::{CountKind, CountTable, CutHash, ResolvedCut, RoError};

/// `m_eff` values, each with weight 1 and four jets.
fn write_events(path: &Path, m_eff: &[(f64, usize)]) {
    let mut text = String::from("m_eff,nJets,event_weight\n");
    for (value, count) in m_eff {
        for _ in 0..*count {
            text.push_str(&format!("{value},4,1.0\n"));
        }
    }
    fs::write(path, text).unwrap();
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();

        write_events(&data.join("370100.signal.csv"), &[(250.0, 20)]);
        write_events(&data.join("410000.ttbar.csv"), &[(150.0, 100), (250.0, 50)]);
        write_events(&data.join("361000.part1.csv"), &[(250.0, 30)]);
        write_events(&data.join("361000.part2.csv"), &[(150.0, 20)]);

        fs::write(
            dir.path().join("supercuts.json"),
            r#"[{"selections": "m_eff > {0}", "grid": [[100, 300, 100]]}]"#,
        )
        .unwrap();

        let sample = r#"{"cross_section": 1.0, "filter_efficiency": 1.0, "k_factor": 1.0, "num_processed_events": 1000}"#;
        fs::write(
            dir.path().join("weights.json"),
            format!(
                r#"{{"luminosity": 1.0, "samples": {{"370100": {sample}, "410000": {sample}, "361000": {sample}}}}}"#
            ),
        )
        .unwrap();

        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cut_config(&self) -> CutConfig {
        CutConfig::new(
            vec![format!("{}/*.csv", self.path("data").display())],
            self.path("supercuts.json"),
        )
        .with_metadata(self.path("weights.json"))
        .with_workers(2)
        .with_output(self.path("cuts"), false)
    }

    fn optimize_config(&self) -> OptimizeConfig {
        OptimizeConfig::new(vec!["370100".into()], vec!["410000".into(), "361000.json".into()])
            .with_search_dir(self.path("cuts"))
            .with_output(self.path("significances"), false)
    }

    /// Hashes of the loose (`m_eff > 100`) and tight (`m_eff > 200`) cuts.
    fn cut_hashes(&self) -> (CutHash, CutHash) {
        let supercuts = read_supercuts(self.path("supercuts.json")).unwrap();
        let grid = CutGrid::new(&supercuts).unwrap();
        let hashes: Vec<CutHash> = grid.iter().map(|c| cut_hash(&c)).collect();
        (hashes[0].clone(), hashes[1].clone())
    }
}

#[test]
fn cut_counts_every_group() {
    let ws = Workspace::new();
    let run = run_cut(&ws.cut_config()).unwrap();
    assert_eq!(run.grid_size, 2);
    assert_eq!(run.report.succeeded(), 3);
    assert_eq!(run.report.failed(), 0);

    let (loose, tight) = ws.cut_hashes();
    let store = ResultStore::open(ws.path("cuts"));

    let multi_file: CountTable = store.read_count_table("361000").unwrap();
    assert_eq!(multi_file[&loose].raw, 50.0);
    assert_eq!(multi_file[&tight].raw, 30.0);
    assert_relative_eq!(multi_file[&tight].scaled, 0.03, epsilon = 1e-12);

    let signal = store.read_count_table("370100").unwrap();
    assert_eq!(signal[&loose].weighted, 20.0);
    assert_eq!(signal[&tight].weighted, 20.0);
}

#[test]
fn cut_refuses_existing_output_before_dispatch() {
    let ws = Workspace::new();
    fs::create_dir(ws.path("cuts")).unwrap();

    let err = run_cut(&ws.cut_config()).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(fs::read_dir(ws.path("cuts")).unwrap().count(), 0);
}

#[test]
fn incomplete_metadata_is_caught_before_dispatch() {
    let ws = Workspace::new();
    fs::write(
        ws.path("weights.json"),
        r#"{"samples": {"370100": {"cross_section": 1.0}}}"#,
    )
    .unwrap();

    let err = run_cut(&ws.cut_config()).unwrap_err();
    assert!(err.is_configuration());
    assert!(!ws.path("cuts").exists());
}

#[test]
fn bad_sample_is_skipped() {
    let ws = Workspace::new();
    fs::write(ws.path("data/999999.broken.csv"), "met,event_weight\n1,1\n").unwrap();

    let err = run_cut(&ws.cut_config().with_metadata(ws.path("missing.json"))).unwrap_err();
    assert!(err.is_configuration());

    let mut config = ws.cut_config();
    config.metadata = None;
    let run = run_cut(&config).unwrap();
    assert_eq!(run.report.succeeded(), 3);
    let failed: Vec<_> = run.report.failures().map(|o| o.sample.as_str()).collect();
    assert_eq!(failed, vec!["999999"]);
    assert!(!ResultStore::open(ws.path("cuts")).count_table_path("999999").exists());
}

#[test]
fn optimize_ranks_and_summarizes() {
    let ws = Workspace::new();
    run_cut(&ws.cut_config()).unwrap();
    let (loose, tight) = ws.cut_hashes();

    let run = run_optimize(&ws.optimize_config()).unwrap();
    assert_eq!(run.ranked.len(), 1);
    let ranked = &run.ranked[0];
    assert_eq!(ranked.sample, "370100");
    assert_eq!(ranked.entries.len(), 2);

    // Same signal, less background: the tight cut wins.
    let best = ranked.best().unwrap();
    assert_eq!(best.hash, tight);
    assert_eq!(best.yield_raw.bkg, 80.0);
    assert_relative_eq!(best.yield_scaled.sig, 20.0, epsilon = 1e-9);
    assert!(best.significance_scaled > ranked.entries[1].significance_scaled);
    assert_eq!(ranked.entries[1].hash, loose);

    let store = ResultStore::open(ws.path("significances"));
    let manifest = store.read_manifest().unwrap();
    assert_eq!(manifest.backgrounds, vec!["361000", "410000"]);
    assert_eq!(manifest.signals, vec!["370100"]);
    assert_eq!(manifest.background_hash, run.background_hash);
    assert_eq!(manifest.rank_by, CountKind::Scaled);
    assert!(store.significance_path("370100", &run.background_hash).exists());
    let backgrounds: Vec<String> = read_json(store.background_set_path(&run.background_hash)).unwrap();
    assert_eq!(backgrounds, vec!["361000", "410000"]);

    let summary = run_summary(&SummaryConfig {
        search_dir: ws.path("significances"),
        output: ws.path("summary.json"),
        overwrite: false,
    })
    .unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].hash, tight);
    assert_relative_eq!(summary[0].ratio, 0.25, epsilon = 1e-9);

    let written: serde_json::Value = read_json(ws.path("summary.json")).unwrap();
    assert_eq!(written[0]["sample"], "370100");
}

#[test]
fn background_order_does_not_change_the_hash() {
    let ws = Workspace::new();
    run_cut(&ws.cut_config()).unwrap();

    let first = run_optimize(&ws.optimize_config()).unwrap();
    let mut reversed = ws.optimize_config().with_output(ws.path("again"), false);
    reversed.backgrounds.reverse();
    let second = run_optimize(&reversed).unwrap();

    assert_eq!(first.background_hash, second.background_hash);
    assert_eq!(first.ranked, second.ranked);
}

#[test]
fn luminosity_scales_only_scaled_yields() {
    let ws = Workspace::new();
    run_cut(&ws.cut_config()).unwrap();

    let run = run_optimize(&ws.optimize_config().with_luminosity(10.0)).unwrap();
    let best = run.ranked[0].best().unwrap();
    assert_relative_eq!(best.yield_scaled.sig, 200.0, epsilon = 1e-9);
    assert_eq!(best.yield_weighted.sig, 20.0);
}

#[test]
fn rescale_requires_known_keys() {
    let ws = Workspace::new();
    run_cut(&ws.cut_config()).unwrap();

    fs::write(ws.path("rescale.json"), r#"{"ttbar": 1.2}"#).unwrap();
    let err = run_optimize(&ws.optimize_config().with_rescale(ws.path("rescale.json"), None))
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(!ws.path("significances").exists());

    fs::write(ws.path("groups.json"), r#"{"410000": "ttbar"}"#).unwrap();
    let run = run_optimize(
        &ws.optimize_config()
            .with_rescale(ws.path("rescale.json"), Some(ws.path("groups.json"))),
    )
    .unwrap();
    let best = run.ranked[0].best().unwrap();
    // 50 ttbar events scaled by 1.2, plus 30 unscaled.
    assert_relative_eq!(best.yield_scaled.bkg, 90.0, epsilon = 1e-9);
    assert_eq!(best.yield_raw.bkg, 80.0);
}

#[test]
fn optimize_rejects_bad_significance_settings() {
    let ws = Workspace::new();
    run_cut(&ws.cut_config()).unwrap();

    let config = ws
        .optimize_config()
        .with_significance(SignificanceConfig::default().with_uncertainties(-0.1, 0.3));
    assert!(run_optimize(&config).unwrap_err().is_configuration());
}

#[test]
fn missing_count_table_is_not_a_configuration_error() {
    let ws = Workspace::new();
    run_cut(&ws.cut_config()).unwrap();

    let mut config = ws.optimize_config();
    config.backgrounds.push("123456".into());
    let err = run_optimize(&config).unwrap_err();
    assert!(matches!(err, RoError::Data(_)));
    assert!(!err.is_configuration());
}

#[test]
fn hashes_resolve_from_the_summary() {
    let ws = Workspace::new();
    run_cut(&ws.cut_config()).unwrap();
    run_optimize(&ws.optimize_config()).unwrap();
    run_summary(&SummaryConfig {
        search_dir: ws.path("significances"),
        output: ws.path("summary.json"),
        overwrite: false,
    })
    .unwrap();
    let (_, tight) = ws.cut_hashes();

    let config = HashConfig::new(
        vec![ws.path("summary.json").display().to_string()],
        ws.path("supercuts.json"),
    )
    .reading_files()
    .with_output(ws.path("outputHash"), false);
    let run = run_hash(&config).unwrap();
    assert!(run.lookup.is_complete());

    let cut: Vec<ResolvedCut> = read_json(ws.path("outputHash").join(format!("{tight}.json"))).unwrap();
    assert_eq!(cut.len(), 1);
    assert_eq!(cut[0].selections, "m_eff > {0}");
    assert_eq!(cut[0].pivot, vec![200.0]);
    assert_eq!(resolved_hash(&cut), tight);
}

#[test]
fn unknown_hash_is_reported_not_fatal() {
    let ws = Workspace::new();
    let config = HashConfig::new(vec!["deadbeef".into()], ws.path("supercuts.json"))
        .with_output(ws.path("outputHash"), false);
    let run = run_hash(&config).unwrap();
    assert!(run.lookup.resolved.is_empty());
    assert!(run.lookup.unresolved.contains(&CutHash::from("deadbeef")));
}

#[test]
fn hash_with_empty_supercuts_creates_nothing() {
    let ws = Workspace::new();
    fs::write(ws.path("empty.json"), "[]").unwrap();
    let config = HashConfig::new(vec!["deadbeef".into()], ws.path("empty.json"))
        .with_output(ws.path("outputHash"), false);

    let err = run_hash(&config).unwrap_err();
    assert!(err.is_configuration());
    assert!(!ws.path("outputHash").exists());
}

#[test]
fn background_patterns_expand_in_the_search_dir() {
    let ws = Workspace::new();
    run_cut(&ws.cut_config()).unwrap();
    let literal = run_optimize(&ws.optimize_config()).unwrap();

    let config = OptimizeConfig::new(vec!["370100".into()], vec!["4100*.json".into(), "361000".into()])
        .with_search_dir(ws.path("cuts"))
        .with_output(ws.path("patterned"), false);
    let patterned = run_optimize(&config).unwrap();
    assert_eq!(patterned.background_hash, literal.background_hash);
    assert_eq!(patterned.ranked, literal.ranked);

    let config = OptimizeConfig::new(vec!["370100".into()], vec!["999*.json".into()])
        .with_search_dir(ws.path("cuts"))
        .with_output(ws.path("unmatched"), false);
    let err = run_optimize(&config).unwrap_err();
    assert!(err.is_configuration());
    assert!(!ws.path("unmatched").exists());
}

#[test]
fn generate_builds_a_template_from_columns() {
    let ws = Workspace::new();
    let output = ws.path("generated.json");
    let config = GenerateConfig::new(ws.path("data/370100.signal.csv"))
        .with_fixed(vec!["nJ*".into()])
        .with_output(&output, false);

    let supercuts = run_generate(&config).unwrap();
    let selections: Vec<_> = supercuts.dimensions().iter().map(|d| d.selections()).collect();
    assert_eq!(selections, vec!["m_eff > {0}", "nJets > {0}"]);
    assert!(!supercuts.dimensions()[0].is_fixed());
    assert!(supercuts.dimensions()[1].is_fixed());

    let reloaded = read_supercuts(&output).unwrap();
    assert_eq!(reloaded, supercuts);
    assert_eq!(reloaded.grid_size(), Some(10));

    assert!(run_generate(&config).unwrap_err().is_configuration());
    let skipped = run_generate(
        &config
            .clone()
            .with_skip(vec!["m_*".into()])
            .with_output(ws.path("skipped.json"), false),
    )
    .unwrap();
    assert_eq!(skipped.len(), 1);
}
