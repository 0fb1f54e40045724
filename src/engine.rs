//! Core validation engine
//!
//! Runs a rule set against a file set and returns one aggregated report.
//! Failures are isolated at file and rule granularity: a file that cannot
//! be parsed or a rule that blows up becomes data in the report, never an
//! aborted run. Only configuration and discovery problems fail fast.

use crate::cache::ParseCache;
use crate::config::Config;
use crate::context::SourceContext;
use crate::discover::{self, DiscoveryError};
use crate::parser::{SourceParser, StructuralParser};
use crate::rule::Rule;
use crate::violation::{Severity, Violation, ViolationCollection};
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reserved rule name for files that could not be read or parsed
pub const PARSE_FAILURE_RULE: &str = "parse-error";

/// Per-rule timing statistics
#[derive(Debug, Clone, Default)]
pub struct RuleTiming {
    /// Rule name
    pub rule: String,
    /// Total time spent in this rule
    pub total_time: Duration,
    /// Number of (rule, file) invocations
    pub evaluation_count: usize,
    /// Number of violations produced
    pub violation_count: usize,
}

impl RuleTiming {
    pub fn new(rule: &str) -> Self {
        Self {
            rule: rule.to_string(),
            ..Default::default()
        }
    }

    /// Average time per invocation
    pub fn avg_time(&self) -> Duration {
        if self.evaluation_count > 0 {
            self.total_time / self.evaluation_count as u32
        } else {
            Duration::ZERO
        }
    }
}

/// Result of a validation run
#[derive(Debug, Default)]
pub struct RunReport {
    /// All violations, in canonical (file x rule) order
    pub violations: ViolationCollection,

    /// Files processed
    pub files_processed: usize,

    /// Files that produced at least one violation
    pub files_with_violations: usize,

    /// Processing duration
    pub duration: Duration,

    /// Per-rule timing statistics (rule name -> timing)
    pub rule_timings: HashMap<String, RuleTiming>,
}

impl RunReport {
    /// Check if the run found nothing
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Count of violations at the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.violations.count_by_severity(severity)
    }

    /// Get exit code (0 = clean, 1 = violations, 2 = critical violations)
    pub fn exit_code(&self) -> i32 {
        if self.count(Severity::Critical) > 0 {
            2
        } else if !self.violations.is_empty() {
            1
        } else {
            0
        }
    }

    /// Merge another report into this one, appending its violations
    pub fn merge(&mut self, other: RunReport) {
        self.violations.merge(other.violations);
        self.files_processed += other.files_processed;
        self.files_with_violations += other.files_with_violations;

        for (rule, timing) in other.rule_timings {
            let entry = self
                .rule_timings
                .entry(rule)
                .or_insert_with(|| RuleTiming::new(&timing.rule));
            entry.total_time += timing.total_time;
            entry.evaluation_count += timing.evaluation_count;
            entry.violation_count += timing.violation_count;
        }
    }

    /// Rule timings sorted by total time (descending)
    pub fn sorted_timings(&self) -> Vec<&RuleTiming> {
        let mut timings: Vec<_> = self.rule_timings.values().collect();
        timings.sort_by(|a, b| b.total_time.cmp(&a.total_time));
        timings
    }
}

/// Cancellation token checked between file boundaries.
///
/// Violations are purely additive, so results merged before cancellation
/// remain valid.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The validation engine
pub struct Engine {
    config: Config,
    parser: Arc<dyn SourceParser>,
    cache: Arc<ParseCache>,
}

impl Engine {
    /// Create an engine with the built-in structural parser
    pub fn new(config: Config) -> Self {
        Self {
            config,
            parser: Arc::new(StructuralParser::new()),
            cache: Arc::new(ParseCache::new()),
        }
    }

    /// Substitute the parser implementation
    pub fn with_parser(mut self, parser: Arc<dyn SourceParser>) -> Self {
        self.parser = parser;
        self
    }

    /// The engine's parse cache
    pub fn cache(&self) -> &ParseCache {
        &self.cache
    }

    /// Run rules over files in the given order.
    ///
    /// The report's violations follow canonical order: outer by file order
    /// as supplied, inner by rule registration order, regardless of how
    /// execution is scheduled internally.
    pub fn validate(&self, rules: &[Arc<dyn Rule>], files: &[PathBuf]) -> RunReport {
        self.validate_with_cancel(rules, files, &CancelToken::new())
    }

    /// Like [`validate`](Self::validate), checking the token between files
    pub fn validate_with_cancel(
        &self,
        rules: &[Arc<dyn Rule>],
        files: &[PathBuf],
        token: &CancelToken,
    ) -> RunReport {
        let start = Instant::now();

        if rules.is_empty() {
            warn!("no active rules configured; report will be empty");
        }

        // Each file buffers its own results; the ordered merge below is
        // what guarantees canonical output order under parallelism.
        let per_file: Vec<RunReport> = if self.config.engine.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(if self.config.engine.jobs > 0 {
                    self.config.engine.jobs
                } else {
                    num_cpus::get()
                })
                .build()
                .unwrap_or_else(|_| rayon::ThreadPoolBuilder::new().build().unwrap());

            pool.install(|| {
                files
                    .par_iter()
                    .map(|file| {
                        if token.is_cancelled() {
                            RunReport::default()
                        } else {
                            self.validate_file(rules, file)
                        }
                    })
                    .collect()
            })
        } else {
            let mut results = Vec::with_capacity(files.len());
            for file in files {
                if token.is_cancelled() {
                    break;
                }
                results.push(self.validate_file(rules, file));
            }
            results
        };

        let mut report = RunReport::default();
        for file_report in per_file {
            report.merge(file_report);
        }
        report.duration = start.elapsed();
        report
    }

    /// Discover files under a directory, then validate them.
    ///
    /// Fails before any rule runs when the root does not exist or a
    /// configured glob is invalid.
    pub fn validate_directory(
        &self,
        rules: &[Arc<dyn Rule>],
        root: &Path,
        recursive: bool,
    ) -> Result<RunReport, DiscoveryError> {
        let files = discover::find_files(
            root,
            &self.config.files.include,
            &self.config.files.exclude,
            recursive,
        )?;
        debug!("discovered {} files under {}", files.len(), root.display());
        Ok(self.validate(rules, &files))
    }

    /// Validate one file against every rule, in registration order
    fn validate_file(&self, rules: &[Arc<dyn Rule>], path: &Path) -> RunReport {
        let mut report = RunReport {
            files_processed: 1,
            ..RunReport::default()
        };

        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                report.violations.push(parse_failure(path, &e.to_string()));
                report.files_with_violations = 1;
                return report;
            }
        };

        let tree = if self.config.engine.cache {
            self.cache.get_or_parse(path, &source, self.parser.as_ref())
        } else {
            self.parser.parse(&source).map(Arc::new)
        };

        let tree = match tree {
            Ok(tree) => tree,
            Err(e) => {
                report.violations.push(parse_failure(path, &e.to_string()));
                report.files_with_violations = 1;
                return report;
            }
        };

        let ctx = SourceContext::new(path, tree);

        for rule in rules {
            if !self.config.is_rule_enabled(rule.name()) {
                continue;
            }

            let start = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| rule.validate(&ctx)));
            let elapsed = start.elapsed();

            let mut produced = match outcome {
                Ok(violations) => violations,
                Err(payload) => {
                    let detail = panic_message(payload.as_ref());
                    warn!("rule '{}' failed on {}: {}", rule.name(), path.display(), detail);
                    let mut failed = ViolationCollection::new();
                    failed.push(execution_failure(rule.name(), path, &detail));
                    failed
                }
            };

            if let Some(severity) = self.config.get_severity_override(rule.name()) {
                produced = produced
                    .into_iter()
                    .map(|mut v| {
                        v.severity = severity;
                        v
                    })
                    .collect();
            }

            let timing = report
                .rule_timings
                .entry(rule.name().to_string())
                .or_insert_with(|| RuleTiming::new(rule.name()));
            timing.total_time += elapsed;
            timing.evaluation_count += 1;
            timing.violation_count += produced.len();

            report.violations.merge(produced);
        }

        if !report.violations.is_empty() {
            report.files_with_violations = 1;
        }
        report
    }
}

/// Synthetic violation for a file that could not be read or parsed
fn parse_failure(path: &Path, detail: &str) -> Violation {
    Violation::new(
        PARSE_FAILURE_RULE,
        Severity::High,
        &format!("file could not be analyzed: {}", detail),
        path.to_path_buf(),
        0,
    )
    .with_recommendation("Fix the syntax error so the file can be analyzed")
    .with_confidence(0.0)
}

/// Synthetic violation for an uncaught failure inside a rule body
fn execution_failure(rule: &str, path: &Path, detail: &str) -> Violation {
    Violation::new(
        rule,
        Severity::Low,
        &format!("rule '{}' failed while analyzing this file: {}", rule, detail),
        path.to_path_buf(),
        0,
    )
    .with_recommendation("Report this to the rule author")
    .with_confidence(0.2)
    .with_metadata("execution_failure", "true")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{RuleCategory, RuleDescriptor, ViolationSink};
    use tempfile::TempDir;

    /// Flags every struct declaration it sees
    struct FlagStructs {
        descriptor: RuleDescriptor,
    }

    impl FlagStructs {
        fn new(name: &str) -> Self {
            Self {
                descriptor: RuleDescriptor::new(name, RuleCategory::General),
            }
        }
    }

    impl Rule for FlagStructs {
        fn descriptor(&self) -> &RuleDescriptor {
            &self.descriptor
        }

        fn validate(&self, ctx: &SourceContext) -> ViolationCollection {
            let mut sink = ViolationSink::new();
            for decl in ctx.declarations(Some(crate::parser::DeclarationKind::Struct)) {
                sink.emit(Violation::new(
                    self.name(),
                    Severity::Medium,
                    &format!("struct '{}'", decl.name),
                    ctx.path().to_path_buf(),
                    decl.line,
                ));
            }
            sink.into_collection()
        }
    }

    /// Panics on every file
    struct AlwaysPanics {
        descriptor: RuleDescriptor,
    }

    impl AlwaysPanics {
        fn new() -> Self {
            Self {
                descriptor: RuleDescriptor::new("always-panics", RuleCategory::General),
            }
        }
    }

    impl Rule for AlwaysPanics {
        fn descriptor(&self) -> &RuleDescriptor {
            &self.descriptor
        }

        fn validate(&self, _ctx: &SourceContext) -> ViolationCollection {
            panic!("deliberate test failure");
        }
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn engine() -> Engine {
        Engine::new(Config::default())
    }

    fn serial_engine() -> Engine {
        let mut config = Config::default();
        config.engine.parallel = false;
        Engine::new(config)
    }

    #[test]
    fn test_violation_only_in_first_file() {
        let temp = TempDir::new().unwrap();
        let file_a = write_file(temp.path(), "A.swift", "struct A {\n}\n");
        let file_b = write_file(temp.path(), "B.swift", "enum B {\n    case x\n}\n");

        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(FlagStructs::new("flag-structs"))];
        let report = engine().validate(&rules, &[file_a.clone(), file_b]);

        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations.iter().next().unwrap().file, file_a);
        assert_eq!(report.files_processed, 2);
        assert_eq!(report.files_with_violations, 1);
    }

    #[test]
    fn test_canonical_ordering_under_parallelism() {
        let temp = TempDir::new().unwrap();
        let source = "struct First {\n}\n\nstruct Second {\n}\n";
        let files: Vec<PathBuf> = (0..6)
            .map(|i| write_file(temp.path(), &format!("F{}.swift", i), source))
            .collect();

        let rules: Vec<Arc<dyn Rule>> = vec![
            Arc::new(FlagStructs::new("rule-one")),
            Arc::new(FlagStructs::new("rule-two")),
        ];

        let report = engine().validate(&rules, &files);

        let expected: Vec<(PathBuf, String)> = files
            .iter()
            .flat_map(|f| {
                ["rule-one", "rule-two"].into_iter().flat_map(move |rule| {
                    // Each rule reports both structs, in source order.
                    [(f.clone(), rule.to_string()), (f.clone(), rule.to_string())]
                })
            })
            .collect();

        let actual: Vec<(PathBuf, String)> = report
            .violations
            .iter()
            .map(|v| (v.file.clone(), v.rule.clone()))
            .collect();

        assert_eq!(actual, expected);
    }

    #[test]
    fn test_determinism_across_runs() {
        let temp = TempDir::new().unwrap();
        let files: Vec<PathBuf> = (0..4)
            .map(|i| {
                write_file(
                    temp.path(),
                    &format!("F{}.swift", i),
                    "struct S {\n    var a: Int\n}\n",
                )
            })
            .collect();

        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(FlagStructs::new("flag-structs"))];
        let engine = engine();

        let first: Vec<String> = engine
            .validate(&rules, &files)
            .violations
            .iter()
            .map(|v| format!("{}:{}:{}", v.file.display(), v.rule, v.message))
            .collect();
        let second: Vec<String> = engine
            .validate(&rules, &files)
            .violations
            .iter()
            .map(|v| format!("{}:{}:{}", v.file.display(), v.rule, v.message))
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_failing_rule_does_not_suppress_others() {
        let temp = TempDir::new().unwrap();
        let file = write_file(temp.path(), "A.swift", "struct A {\n}\n");

        let rules: Vec<Arc<dyn Rule>> = vec![
            Arc::new(AlwaysPanics::new()),
            Arc::new(FlagStructs::new("flag-structs")),
        ];

        let report = serial_engine().validate(&rules, &[file]);

        // One synthetic failure plus one real finding.
        assert_eq!(report.violations.len(), 2);

        let synthetic = report.violations.by_rule("always-panics");
        assert_eq!(synthetic.len(), 1);
        assert_eq!(synthetic[0].severity, Severity::Low);
        assert!(synthetic[0].automation_confidence() <= 0.2);
        assert!(synthetic[0].message.contains("always-panics"));

        assert_eq!(report.violations.by_rule("flag-structs").len(), 1);
    }

    #[test]
    fn test_parse_failure_does_not_abort_run() {
        let temp = TempDir::new().unwrap();
        let broken = write_file(temp.path(), "Broken.swift", "struct Broken {\n");
        let fine = write_file(temp.path(), "Fine.swift", "struct Fine {\n}\n");

        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(FlagStructs::new("flag-structs"))];
        let report = engine().validate(&rules, &[broken.clone(), fine]);

        let parse_failures = report.violations.by_rule(PARSE_FAILURE_RULE);
        assert_eq!(parse_failures.len(), 1);
        assert_eq!(parse_failures[0].file, broken);

        // The healthy file still reported.
        assert_eq!(report.violations.by_rule("flag-structs").len(), 1);
    }

    #[test]
    fn test_empty_rules_yield_empty_report() {
        let temp = TempDir::new().unwrap();
        let file = write_file(temp.path(), "A.swift", "struct A {\n}\n");

        let report = engine().validate(&[], &[file]);
        assert!(report.is_clean());
        assert_eq!(report.files_processed, 1);
    }

    #[test]
    fn test_missing_directory_fails_before_rules_run() {
        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(FlagStructs::new("flag-structs"))];
        let result = engine().validate_directory(&rules, Path::new("/nonexistent"), true);
        assert!(matches!(result, Err(DiscoveryError::RootNotFound(_))));
    }

    #[test]
    fn test_empty_directory_is_valid_empty_report() {
        let temp = TempDir::new().unwrap();
        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(FlagStructs::new("flag-structs"))];

        let report = engine()
            .validate_directory(&rules, temp.path(), true)
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(report.files_processed, 0);
    }

    #[test]
    fn test_severity_override_applied() {
        let temp = TempDir::new().unwrap();
        let file = write_file(temp.path(), "A.swift", "struct A {\n}\n");

        let mut config = Config::default();
        config
            .rules
            .severity
            .insert("flag-structs".to_string(), Severity::Critical);

        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(FlagStructs::new("flag-structs"))];
        let report = Engine::new(config).validate(&rules, &[file]);

        assert_eq!(report.count(Severity::Critical), 1);
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn test_disabled_rule_skipped() {
        let temp = TempDir::new().unwrap();
        let file = write_file(temp.path(), "A.swift", "struct A {\n}\n");

        let mut config = Config::default();
        config.rules.disabled.push("flag-structs".to_string());

        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(FlagStructs::new("flag-structs"))];
        let report = Engine::new(config).validate(&rules, &[file]);
        assert!(report.is_clean());
    }

    #[test]
    fn test_cancelled_run_keeps_merged_results() {
        let temp = TempDir::new().unwrap();
        let file = write_file(temp.path(), "A.swift", "struct A {\n}\n");

        let token = CancelToken::new();
        token.cancel();

        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(FlagStructs::new("flag-structs"))];
        let report = serial_engine().validate_with_cancel(&rules, &[file], &token);

        // Cancelled before the first file boundary: nothing processed.
        assert_eq!(report.files_processed, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn test_exit_codes() {
        let mut report = RunReport::default();
        assert_eq!(report.exit_code(), 0);

        report.violations.push(Violation::new(
            "r",
            Severity::Medium,
            "m",
            PathBuf::from("a"),
            1,
        ));
        assert_eq!(report.exit_code(), 1);

        report.violations.push(Violation::new(
            "r",
            Severity::Critical,
            "m",
            PathBuf::from("a"),
            2,
        ));
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn test_rule_timings_recorded() {
        let temp = TempDir::new().unwrap();
        let file = write_file(temp.path(), "A.swift", "struct A {\n}\n");

        let rules: Vec<Arc<dyn Rule>> = vec![Arc::new(FlagStructs::new("flag-structs"))];
        let report = engine().validate(&rules, &[file]);

        let timing = report.rule_timings.get("flag-structs").unwrap();
        assert_eq!(timing.evaluation_count, 1);
        assert_eq!(timing.violation_count, 1);
    }
}
