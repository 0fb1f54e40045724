//! Rule registry and loader
//!
//! An explicit, queryable catalog of native and script rules grouped into
//! named packs. A registry is a plain value owned by whoever drives the
//! engine; there is no process-wide state.

use crate::config::ConfigError;
use crate::rule::{Rule, RuleCategory, RuleDescriptor, RuleState};
use crate::script::ScriptRule;
use log::warn;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A script definition that failed to compile
#[derive(Debug, Clone)]
pub struct LoadFailure {
    /// Definition file (or source name) that failed
    pub file: PathBuf,
    /// What went wrong
    pub error: String,
}

struct RegistryEntry {
    descriptor: RuleDescriptor,
    rule: Arc<dyn Rule>,
    pack: String,
}

/// Central catalog of rules
#[derive(Default)]
pub struct RuleRegistry {
    /// Registered rules, in registration order
    entries: Vec<RegistryEntry>,

    /// Name -> entry index
    index: HashMap<String, usize>,

    /// Native packs in registration order (kept for reload)
    native_packs: Vec<(String, Vec<Arc<dyn Rule>>)>,

    /// Script pack directories in registration order
    script_packs: Vec<(String, PathBuf)>,

    /// In-memory rule sources in registration order (kept for reload)
    sources: Vec<(String, String)>,

    /// Names explicitly switched off; survives reloads
    deactivated: HashSet<String>,

    /// Script definitions that failed to compile during the last load
    failures: Vec<LoadFailure>,
}

impl RuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named pack of native rules
    pub fn register_pack(
        &mut self,
        name: &str,
        rules: Vec<Arc<dyn Rule>>,
    ) -> Result<(), ConfigError> {
        for rule in &rules {
            self.insert_entry(rule.clone(), name)?;
        }
        self.native_packs.push((name.to_string(), rules));
        Ok(())
    }

    /// Record a directory of one-rule definition files as a pack.
    ///
    /// The directory is scanned on the next [`load_rules`](Self::load_rules)
    /// or [`reload_rules`](Self::reload_rules) call.
    pub fn add_script_pack(&mut self, name: &str, dir: &Path) {
        self.script_packs.push((name.to_string(), dir.to_path_buf()));
    }

    /// Register a rule from an in-memory definition string, exactly as if
    /// it had been read from a definition file.
    pub fn register_source(&mut self, name: &str, source: &str) -> Result<(), ConfigError> {
        match ScriptRule::from_source(name, source) {
            Ok(rule) => self.insert_entry(Arc::new(rule), "source")?,
            Err(e) => self.failures.push(LoadFailure {
                file: PathBuf::from(name),
                error: e.to_string(),
            }),
        }
        self.sources.push((name.to_string(), source.to_string()));
        Ok(())
    }

    /// Load every registered pack and return descriptors in registration
    /// order. Idempotent: repeated calls without underlying changes return
    /// the same set.
    ///
    /// A duplicate rule name anywhere in the registry is a configuration
    /// error; a malformed script definition is recorded against that rule
    /// only and does not block its siblings.
    pub fn load_rules(&mut self) -> Result<Vec<RuleDescriptor>, ConfigError> {
        self.rebuild()?;
        Ok(self.descriptors())
    }

    /// Re-scan script sources. Returns the same set of names as the
    /// previous load when the underlying definitions are unchanged; the
    /// deactivated set is preserved either way.
    pub fn reload_rules(&mut self) -> Result<Vec<RuleDescriptor>, ConfigError> {
        self.rebuild()?;
        Ok(self.descriptors())
    }

    fn rebuild(&mut self) -> Result<(), ConfigError> {
        self.entries.clear();
        self.index.clear();
        self.failures.clear();

        let native_packs = self.native_packs.clone();
        for (pack, rules) in &native_packs {
            for rule in rules {
                self.insert_entry(rule.clone(), pack)?;
            }
        }

        let sources = self.sources.clone();
        for (name, source) in &sources {
            match ScriptRule::from_source(name, source) {
                Ok(rule) => self.insert_entry(Arc::new(rule), "source")?,
                Err(e) => self.failures.push(LoadFailure {
                    file: PathBuf::from(name),
                    error: e.to_string(),
                }),
            }
        }

        let script_packs = self.script_packs.clone();
        for (pack, dir) in &script_packs {
            self.load_script_dir(pack, dir)?;
        }

        Ok(())
    }

    /// Scan one pack directory, in stable filename order
    fn load_script_dir(&mut self, pack: &str, dir: &Path) -> Result<(), ConfigError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("skipping rule pack '{}': {}", pack, e);
                return Ok(());
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml") | Some("json")
                )
            })
            .collect();
        paths.sort();

        for path in paths {
            match ScriptRule::load(&path) {
                Ok(rule) => self.insert_entry(Arc::new(rule), pack)?,
                Err(e) => {
                    warn!("failed to load rule from {}: {}", path.display(), e);
                    self.failures.push(LoadFailure {
                        file: path,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn insert_entry(&mut self, rule: Arc<dyn Rule>, pack: &str) -> Result<(), ConfigError> {
        let name = rule.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ConfigError::DuplicateRule(name));
        }

        let mut descriptor = rule.descriptor().clone();
        descriptor.state = if self.deactivated.contains(&name) {
            RuleState::Deactivated
        } else {
            RuleState::Active
        };

        self.index.insert(name, self.entries.len());
        self.entries.push(RegistryEntry {
            descriptor,
            rule,
            pack: pack.to_string(),
        });
        Ok(())
    }

    /// All descriptors in registration order
    pub fn descriptors(&self) -> Vec<RuleDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    /// Descriptor for one rule
    pub fn metadata(&self, name: &str) -> Option<RuleDescriptor> {
        self.index
            .get(name)
            .map(|&i| self.entries[i].descriptor.clone())
    }

    /// Descriptors in the given category, in registration order
    pub fn rules_by_category(&self, category: RuleCategory) -> Vec<RuleDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.category == category)
            .map(|e| e.descriptor.clone())
            .collect()
    }

    /// Pack a rule belongs to
    pub fn pack_of(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&i| self.entries[i].pack.as_str())
    }

    /// Active rules in registration order
    pub fn active_rules(&self) -> Vec<Arc<dyn Rule>> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.is_active())
            .map(|e| e.rule.clone())
            .collect()
    }

    /// Switch a rule off. The transition is persistent: it survives
    /// reloads until the rule is explicitly re-enabled.
    pub fn deactivate(&mut self, name: &str) -> bool {
        match self.index.get(name) {
            Some(&i) => {
                self.entries[i].descriptor.state = RuleState::Deactivated;
                self.deactivated.insert(name.to_string());
                true
            }
            None => false,
        }
    }

    /// Switch a rule back on
    pub fn activate(&mut self, name: &str) -> bool {
        match self.index.get(name) {
            Some(&i) => {
                self.entries[i].descriptor.state = RuleState::Active;
                self.deactivated.remove(name);
                true
            }
            None => false,
        }
    }

    /// Script definitions that failed during the last load
    pub fn load_failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    /// Number of registered rules (including deactivated ones)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry has no rules
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
