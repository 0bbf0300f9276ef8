//! Override lookup: hand-maintained corrections keyed by OS branch and build
//!
//! The catalog alone doesn't say which beta a build was, or what a
//! prerequisite build was called. This dataset fills those gaps:
//!
//! ```json
//! { "iOS 10": { "14E5230e": { "Version": "10.3", "Beta": 1 } } }
//! ```
//!
//! An entry may carry `Models`, in which case it only applies to packages
//! for at least one of those models.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Corrections for a single build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildOverride {
    /// Human-facing version, e.g. `10.3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Beta number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<u32>,
    /// Label suffix such as `GM` or `RC`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// Models this entry is restricted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    /// Corrected release date, `YYYYMMDD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl BuildOverride {
    /// Check whether this entry applies to a package supporting `models`
    pub fn applies_to(&self, models: &BTreeSet<String>) -> bool {
        match &self.models {
            Some(scoped) => scoped.iter().any(|m| models.contains(m)),
            None => true,
        }
    }
}

/// Override lookup: branch name -> build -> corrections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideLookup {
    branches: BTreeMap<String, BTreeMap<String, BuildOverride>>,
}

impl OverrideLookup {
    /// Create an empty lookup
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry for a build on a branch
    pub fn insert(
        &mut self,
        branch: impl Into<String>,
        build: impl Into<String>,
        entry: BuildOverride,
    ) {
        self.branches
            .entry(branch.into())
            .or_default()
            .insert(build.into(), entry);
    }

    /// Load a lookup from a property list (`.plist`) or JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().is_some_and(|ext| ext == "plist") {
            return plist::from_file(path).map_err(|e| Error::Plist {
                name: path.display().to_string(),
                source: e,
            });
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Find the entry for a build, searching branches in name order and
    /// taking the first branch that lists it
    pub fn find(&self, build: &str) -> Option<&BuildOverride> {
        self.branches.values().find_map(|builds| builds.get(build))
    }

    /// Find the entry for a build, honouring model scoping.
    ///
    /// A model-scoped entry whose models don't intersect `models` is
    /// treated as absent.
    pub fn lookup(&self, build: &str, models: &BTreeSet<String>) -> Option<&BuildOverride> {
        self.find(build).filter(|entry| entry.applies_to(models))
    }

    /// Get the total number of build entries
    pub fn len(&self) -> usize {
        self.branches.values().map(BTreeMap::len).sum()
    }

    /// Check if the lookup has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
