//! Row counts for the merged cells of a wiki table
//!
//! Tallied in one pass over the sorted packages, then consumed by the
//! layout pass: the first row with a given key takes the whole count and
//! evicts it, so later rows sharing the key emit no cell.

use crate::corrections::CorrectionTable;
use crate::package::Package;
use std::collections::BTreeMap;

/// Rowspan tallies for one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowspanCounts {
    /// Declared build -> rows
    builds: BTreeMap<String, usize>,
    /// Actual build -> rows. Stands in for the release date, since a GM and
    /// the next beta can be pushed the same day.
    dates: BTreeMap<String, usize>,
    /// URL -> prerequisite builds of the rows sharing it
    urls: BTreeMap<String, Vec<String>>,
    /// Marketing version -> rows
    marketing_versions: BTreeMap<String, usize>,
    /// (declared build, prerequisite version) -> rows
    prerequisite_versions: BTreeMap<(String, String), usize>,
    /// (declared build, prerequisite build) -> rows
    prerequisite_builds: BTreeMap<(String, String), usize>,
}

impl RowspanCounts {
    /// Tally the rows of a sorted, filtered package sequence
    pub fn tally(packages: &[Package], corrections: &CorrectionTable) -> Self {
        let mut counts = Self::default();

        for package in packages {
            let build = package.declared_build().to_string();

            *counts.builds.entry(build.clone()).or_default() += 1;
            *counts
                .dates
                .entry(package.actual_build().to_string())
                .or_default() += 1;

            if !corrections.excluded_from_url_grouping(
                package.supported_devices(),
                package.prerequisite_build(),
                package.os_version(),
            ) {
                counts
                    .urls
                    .entry(package.url().to_string())
                    .or_default()
                    .push(package.prerequisite_build().to_string());
            }

            *counts
                .marketing_versions
                .entry(package.marketing_version().to_string())
                .or_default() += 1;
            *counts
                .prerequisite_versions
                .entry((build.clone(), package.prerequisite_version().to_string()))
                .or_default() += 1;
            *counts
                .prerequisite_builds
                .entry((build, package.prerequisite_build().to_string()))
                .or_default() += 1;
        }

        counts
    }

    pub fn build(&self, declared_build: &str) -> Option<usize> {
        self.builds.get(declared_build).copied()
    }

    pub fn date(&self, actual_build: &str) -> Option<usize> {
        self.dates.get(actual_build).copied()
    }

    pub fn marketing_version(&self, version: &str) -> Option<usize> {
        self.marketing_versions.get(version).copied()
    }

    pub fn prerequisite_version(&self, declared_build: &str, version: &str) -> Option<usize> {
        self.prerequisite_versions
            .get(&(declared_build.to_string(), version.to_string()))
            .copied()
    }

    pub fn prerequisite_build(&self, declared_build: &str, build: &str) -> Option<usize> {
        self.prerequisite_builds
            .get(&(declared_build.to_string(), build.to_string()))
            .copied()
    }

    /// Prerequisite builds still waiting for a URL cell
    pub fn url(&self, url: &str) -> Option<&[String]> {
        self.urls.get(url).map(Vec::as_slice)
    }

    /// Total rows counted
    pub fn rows(&self) -> usize {
        self.builds.values().sum()
    }

    pub(crate) fn take_build(&mut self, declared_build: &str) -> Option<usize> {
        self.builds.remove(declared_build)
    }

    pub(crate) fn take_date(&mut self, actual_build: &str) -> Option<usize> {
        self.dates.remove(actual_build)
    }

    pub(crate) fn take_marketing_version(&mut self, version: &str) -> Option<usize> {
        self.marketing_versions.remove(version)
    }

    pub(crate) fn take_prerequisite_version(
        &mut self,
        declared_build: &str,
        version: &str,
    ) -> Option<usize> {
        self.prerequisite_versions
            .remove(&(declared_build.to_string(), version.to_string()))
    }

    pub(crate) fn take_prerequisite_build(
        &mut self,
        declared_build: &str,
        build: &str,
    ) -> Option<usize> {
        self.prerequisite_builds
            .remove(&(declared_build.to_string(), build.to_string()))
    }

    /// Claim the URL cell for a row, if its prerequisite is still waiting.
    ///
    /// Returns the span: the waiting rows less `reduce_by`. Afterwards only
    /// the last `reduce_by` prerequisites keep waiting, so a file listed
    /// again further down the table gets a fresh cell there.
    pub(crate) fn claim_url(
        &mut self,
        url: &str,
        prerequisite_build: &str,
        reduce_by: usize,
    ) -> Option<usize> {
        let waiting = self.urls.get_mut(url)?;
        if !waiting.iter().any(|b| b == prerequisite_build) {
            return None;
        }

        let span = waiting.len().saturating_sub(reduce_by);
        if span > 0 {
            waiting.drain(..span);
        } else {
            self.urls.remove(url);
        }

        Some(span)
    }
}
