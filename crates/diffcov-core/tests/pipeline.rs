//! End-to-end pipeline runs

use diffcov_core::{
    PatchInput, PatchVerifier, PatternCache, TierKind, VerifierConfig, VerifierError,
};
use diffcov_patterns::PatternKey;
use diffcov_test_utils::{
    coverage_json, widget_corpus, CALC_DIFF, CALC_SOURCE, WIDGET_DIFF, WIDGET_SOURCE,
};
use pretty_assertions::assert_eq;

#[test]
fn widget_patch_learns_and_replays() {
    let corpus = widget_corpus().unwrap();
    let verifier = PatchVerifier::default();
    let prepared = verifier.prepare(
        PatchInput::new("src/shapes/widget.py", WIDGET_DIFF, WIDGET_SOURCE).with_corpus(corpus.path()),
    );

    assert_eq!(prepared.analysis.module_path, "shapes.widget");
    assert_eq!(prepared.patterns.keys().collect::<Vec<_>>(), vec!["Widget"]);
    assert_eq!(prepared.patterns["Widget"].patterns.len(), 2);
    assert_eq!(prepared.synthesis.tiers.get("__init__"), Some(&TierKind::PatternReplay));
    assert!(prepared
        .synthesis
        .source
        .contains("target_module.Widget(size=20, color='red')"));

    let key = PatternKey::new("Widget", Some("shapes.widget"), corpus.path());
    assert!(verifier.cache().contains(&key));
}

#[test]
fn shared_cache_serves_later_verifiers() {
    let corpus = widget_corpus().unwrap();
    let cache = PatternCache::new(16);
    let input = PatchInput::new("src/shapes/widget.py", WIDGET_DIFF, WIDGET_SOURCE).with_corpus(corpus.path());

    let first = PatchVerifier::default().with_cache(cache.clone()).prepare(input);
    // Corpus disappears; the cached patterns still apply
    let root = corpus.path().to_path_buf();
    drop(corpus);
    let second = PatchVerifier::default()
        .with_cache(cache.clone())
        .prepare(PatchInput::new("src/shapes/widget.py", WIDGET_DIFF, WIDGET_SOURCE).with_corpus(&root));

    assert_eq!(first.synthesis.source, second.synthesis.source);
    assert!(cache.contains(&PatternKey::new("Widget", Some("shapes.widget"), &root)));
}

#[test]
fn calc_patch_end_to_end() {
    let verifier = PatchVerifier::default();
    let prepared = verifier.prepare(PatchInput::new("calc.py", CALC_DIFF, CALC_SOURCE));
    assert!(prepared.patterns.is_empty());
    assert_eq!(prepared.synthesis.tiers.get("divide"), Some(&TierKind::GenericFallback));

    let dir = tempfile::tempdir().unwrap();
    let baseline = dir.path().join("baseline.json");
    let combined = dir.path().join("combined.json");
    std::fs::write(&baseline, coverage_json("calc.py", &[10, 11, 13, 14], &[12])).unwrap();
    std::fs::write(&combined, coverage_json("calc.py", &[10, 11, 12, 13, 14], &[])).unwrap();

    let cmp = verifier.compare_files(&prepared.analysis, Some(&baseline), Some(&combined));
    assert!(cmp.baseline.overall_coverage.abs() < 1e-9);
    assert!((cmp.combined.overall_coverage - 1.0).abs() < 1e-9);
    assert!((cmp.contribution - 1.0).abs() < 1e-9);

    let loaded = verifier.load_report(&combined).unwrap();
    assert_eq!(loaded.len(), 1);
}

#[test]
fn empty_diff_is_vacuously_covered() {
    let verifier = PatchVerifier::default();
    let prepared = verifier.prepare(PatchInput::new("calc.py", "", CALC_SOURCE));
    assert!(prepared.analysis.is_empty());
    assert!(prepared.synthesis.is_empty());
    assert!(!prepared.synthesis.source.contains("def test_"));

    let cmp = verifier.compare_files(&prepared.analysis, None, None);
    assert!((cmp.baseline.overall_coverage - 1.0).abs() < f64::EPSILON);
    assert!(cmp.contribution.abs() < f64::EPSILON);
}

#[test]
fn strict_report_loading_surfaces_errors() {
    let verifier = PatchVerifier::default();
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("coverage.json");
    std::fs::write(&bad, "not json").unwrap();

    assert!(matches!(verifier.load_report(&bad), Err(VerifierError::Report(_))));
    assert!(matches!(
        verifier.load_report(&dir.path().join("coverage.xml")),
        Err(VerifierError::Report(_))
    ));
}

#[test]
fn invalid_configuration_is_rejected() {
    let mut config = VerifierConfig::default();
    config.synthesis.max_examples = 0;
    let err = PatchVerifier::try_new(config).unwrap_err();
    assert!(err.is_config_error());

    let config = VerifierConfig::from_toml_str("[mapper]\nsource_roots = [\"lib\"]\n").unwrap();
    let verifier = PatchVerifier::try_new(config).unwrap();
    assert_eq!(verifier.analyze("lib/pkg/mod.py", "", "").module_path, "pkg.mod");
}

#[test]
fn analysis_serializes_with_record_field_names() {
    let analysis = PatchVerifier::default().analyze("calc.py", CALC_DIFF, CALC_SOURCE);
    let value = serde_json::to_value(&analysis).unwrap();
    assert_eq!(value["module_path"], "calc");
    assert_eq!(value["changed_functions"], serde_json::json!(["divide"]));
    assert_eq!(value["changed_lines"]["divide"], serde_json::json!([12]));
    assert_eq!(value["all_changed_lines"], serde_json::json!([12]));
    assert!(value["change_types"]["conditionals"].is_array());
}
