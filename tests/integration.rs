//! End-to-end pipeline tests: registry loading, engine runs, aggregation

use archon::config::Config;
use archon::engine::Engine;
use archon::registry::RuleRegistry;
use archon::rules::core_pack;
use archon::violation::Severity;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

fn oversized_state(property_count: usize) -> String {
    let props: String = (0..property_count)
        .map(|i| format!("    var field{}: Int\n", i))
        .collect();
    format!("import Foundation\n\nstruct State {{\n{}}}\n", props)
}

#[test]
fn oversized_state_end_to_end() {
    let project = TempDir::new().unwrap();
    let file = write(project.path(), "Sources/State.swift", &oversized_state(16));

    let config = Config::default();
    let mut registry = RuleRegistry::new();
    registry
        .register_pack("core", core_pack(&config.thresholds))
        .unwrap();
    registry.load_rules().unwrap();

    let engine = Engine::new(config);
    let report = engine.validate(&registry.active_rules(), &[file.clone()]);

    assert_eq!(report.violations.len(), 1);
    let violation = report.violations.iter().next().unwrap();
    assert_eq!(violation.rule, "state-shape");
    assert_eq!(violation.severity, Severity::High);
    assert_eq!(violation.file, file);
    assert!(violation.message.contains("16"));
}

#[test]
fn script_pack_with_one_malformed_rule() {
    let pack = TempDir::new().unwrap();
    write(
        pack.path(),
        "big-enum.yaml",
        "rule: big-enum\ntarget:\n  kind: enum\ncondition: \"caseCount > 2\"\nmessage: \"enum '{name}' has {caseCount} cases\"\n",
    );
    write(
        pack.path(),
        "broken.yaml",
        "condition: \"what even is this(\"\nmessage: \"m\"\n",
    );
    write(
        pack.path(),
        "force-try.yaml",
        "rule: force-try\nseverity: critical\nconfidence: 0.85\ncondition: \"source =~ /try!/\"\nmessage: \"file uses try!\"\n",
    );

    let mut registry = RuleRegistry::new();
    registry.add_script_pack("custom", pack.path());
    registry.load_rules().unwrap();

    assert_eq!(registry.active_rules().len(), 2);
    assert_eq!(registry.load_failures().len(), 1);

    // Reloading with no underlying changes returns the same names.
    let names: Vec<String> = registry
        .reload_rules()
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["big-enum", "force-try"]);
}

#[test]
fn mixed_rules_report_in_canonical_order() {
    let project = TempDir::new().unwrap();
    let file_a = write(
        project.path(),
        "A.swift",
        "struct State {\n    var a: Int\n}\n\nenum Mode {\n    case x\n    case y\n    case z\n}\n\nfunc run() {\n    let v = try! decode()\n}\n",
    );
    let file_b = write(
        project.path(),
        "B.swift",
        "enum Kind {\n    case a\n    case b\n    case c\n    case d\n}\n",
    );

    let pack = TempDir::new().unwrap();
    write(
        pack.path(),
        "big-enum.yaml",
        "rule: big-enum\ntarget:\n  kind: enum\ncondition: \"caseCount > 2\"\nmessage: \"enum '{name}' has {caseCount} cases\"\n",
    );
    write(
        pack.path(),
        "force-try.yaml",
        "rule: force-try\nseverity: critical\ncondition: \"source =~ /try!/\"\nmessage: \"file uses try!\"\n",
    );

    let config = Config::default();
    let mut registry = RuleRegistry::new();
    registry
        .register_pack("core", core_pack(&config.thresholds))
        .unwrap();
    registry.add_script_pack("custom", pack.path());
    registry.load_rules().unwrap();

    let engine = Engine::new(config);
    let report = engine.validate(
        &registry.active_rules(),
        &[file_a.clone(), file_b.clone()],
    );

    // Outer by file order, inner by registration order: native pack rules
    // registered before the script pack's (sorted) files.
    let sequence: Vec<(PathBuf, String)> = report
        .violations
        .iter()
        .map(|v| (v.file.clone(), v.rule.clone()))
        .collect();
    assert_eq!(
        sequence,
        vec![
            (file_a.clone(), "big-enum".to_string()),
            (file_a.clone(), "force-try".to_string()),
            (file_b.clone(), "big-enum".to_string()),
        ]
    );

    // Severity sort is stable and descending.
    let sorted: Vec<Severity> = report
        .violations
        .sorted_by_severity()
        .iter()
        .map(|v| v.severity)
        .collect();
    assert_eq!(
        sorted,
        vec![Severity::Critical, Severity::Medium, Severity::Medium]
    );
}

#[test]
fn cache_reuses_trees_across_runs() {
    let project = TempDir::new().unwrap();
    let file = write(project.path(), "A.swift", "struct AView {\n    var a: Int\n}\n");

    let config = Config::default();
    let mut registry = RuleRegistry::new();
    registry
        .register_pack("core", core_pack(&config.thresholds))
        .unwrap();
    registry.load_rules().unwrap();

    let engine = Engine::new(config);
    let rules = registry.active_rules();

    engine.validate(&rules, &[file.clone()]);
    let after_first = engine.cache().statistics();
    assert_eq!(after_first.misses, 1);
    assert_eq!(after_first.hits, 0);

    engine.validate(&rules, &[file]);
    let after_second = engine.cache().statistics();
    assert_eq!(after_second.hits, 1);
    assert_eq!(after_second.misses, 1);
}

#[test]
fn directory_validation_respects_excludes() {
    let project = TempDir::new().unwrap();
    write(project.path(), "Sources/App.swift", &oversized_state(16));
    write(project.path(), "Pods/Dep/Dep.swift", &oversized_state(16));

    let config = Config::default();
    let mut registry = RuleRegistry::new();
    registry
        .register_pack("core", core_pack(&config.thresholds))
        .unwrap();
    registry.load_rules().unwrap();

    let engine = Engine::new(config);
    let report = engine
        .validate_directory(&registry.active_rules(), project.path(), true)
        .unwrap();

    assert_eq!(report.files_processed, 1);
    assert_eq!(report.violations.len(), 1);
    assert!(report
        .violations
        .iter()
        .next()
        .unwrap()
        .file
        .ends_with("Sources/App.swift"));
}

#[test]
fn deactivated_rule_is_excluded_from_runs() {
    let project = TempDir::new().unwrap();
    let file = write(project.path(), "State.swift", &oversized_state(16));

    let config = Config::default();
    let mut registry = RuleRegistry::new();
    registry
        .register_pack("core", core_pack(&config.thresholds))
        .unwrap();
    registry.load_rules().unwrap();
    registry.deactivate("state-shape");

    let engine = Engine::new(config);
    let report = engine.validate(&registry.active_rules(), &[file]);
    assert!(report.is_clean());
}
