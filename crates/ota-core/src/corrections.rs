//! One-off historical corrections, kept as data instead of code paths
//!
//! Catalogs published over the years contain a handful of anomalies that
//! only make sense case by case: a delta whose URL is reused out of order,
//! files that appear in several separated spots of a table, a legacy
//! version prefix. The built-in table covers the known ones; a JSON file
//! can replace it.

use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// A delta package whose URL is reused non-contiguously.
///
/// Packages for `device` that upgrade from `prerequisite_build` get their
/// own URL cell instead of joining the URL grouping, except the one whose
/// OS version is `grouped_os_version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlCarveOut {
    pub device: String,
    pub prerequisite_build: String,
    pub grouped_os_version: String,
}

/// Shrinks the URL rowspan of a file that shows up again further down
/// the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowspanReduction {
    /// Prerequisite build the rule applies to (`N/A` for universal packages)
    pub prerequisite_build: String,
    /// Exact OS version the rule applies to
    #[serde(default)]
    pub os_version: Option<String>,
    /// Lowest OS version the rule applies to
    #[serde(default)]
    pub min_os_version: Option<String>,
    /// Devices the rule is limited to; empty means any device
    #[serde(default)]
    pub devices: Vec<String>,
    /// Only apply to final releases (beta number 0)
    #[serde(default)]
    pub finals_only: bool,
    /// Rows to take off the span
    pub reduce_by: usize,
}

impl RowspanReduction {
    fn matches(&self, prerequisite_build: &str, os_version: &str, beta: u32, device: &str) -> bool {
        if self.prerequisite_build != prerequisite_build {
            return false;
        }
        if self.finals_only && beta != 0 {
            return false;
        }
        if !self.devices.is_empty() && !self.devices.iter().any(|d| d == device) {
            return false;
        }
        if let Some(exact) = &self.os_version {
            if exact != os_version {
                return false;
            }
        }
        if let Some(min) = &self.min_os_version {
            match (min.parse::<Version>(), os_version.parse::<Version>()) {
                (Ok(min), Ok(actual)) if actual >= min => {}
                _ => return false,
            }
        }
        true
    }
}

/// Packages whose marketing and OS versions disagree in a known way get an
/// extra cell showing the OS version they report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurportedVersion {
    pub marketing_prefix: String,
    pub os_prefix: String,
}

/// A marketing version that never gets its own cell on a device family;
/// its rows are folded into the next version cell instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscardedVersion {
    pub device_prefix: String,
    pub marketing_version: String,
    pub extra_rows: usize,
}

/// The full set of historical corrections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionTable {
    /// Prefix stripped from OS versions (a one-time versioning scheme change)
    pub legacy_version_prefix: String,
    /// Known-bad date strings, keyed by the text found in the URL, and
    /// their `YYYYMMDD` corrections
    pub date_corrections: BTreeMap<String, String>,
    /// Delta package excluded from URL grouping
    pub url_carve_out: Option<UrlCarveOut>,
    /// URL rowspan reductions, first match wins
    pub rowspan_reductions: Vec<RowspanReduction>,
    /// Prerequisite builds whose packages leave the version text out
    pub hidden_version_prerequisites: Vec<String>,
    /// Marketing/OS version pairs that get a purported-version cell
    pub purported_versions: Vec<PurportedVersion>,
    /// Marketing versions folded into the following version cell
    pub discarded_versions: Vec<DiscardedVersion>,
}

impl Default for CorrectionTable {
    fn default() -> Self {
        let reduction = |prereq: &str, os: Option<&str>, min: Option<&str>, reduce_by| {
            RowspanReduction {
                prerequisite_build: prereq.to_string(),
                os_version: os.map(str::to_string),
                min_os_version: min.map(str::to_string),
                devices: Vec::new(),
                finals_only: false,
                reduce_by,
            }
        };

        Self {
            legacy_version_prefix: "9.9.".to_string(),
            date_corrections: [
                ("201218.D22", "20120307"),
                ("2015106-DC", "20151006"),
                ("20160009/1", "20160913"),
            ]
            .into_iter()
            .map(|(bad, good)| (bad.to_string(), good.to_string()))
            .collect(),
            url_carve_out: Some(UrlCarveOut {
                device: "iPod5,1".to_string(),
                prerequisite_build: "10B141".to_string(),
                grouped_os_version: "8.4.1".to_string(),
            }),
            rowspan_reductions: vec![
                RowspanReduction {
                    devices: vec![
                        "iPhone4,1".to_string(),
                        "iPhone5,1".to_string(),
                        "iPhone5,2".to_string(),
                    ],
                    finals_only: true,
                    ..reduction("N/A", Some("9.2"), None, 4)
                },
                RowspanReduction {
                    finals_only: true,
                    ..reduction("N/A", Some("9.2.1"), None, 2)
                },
                reduction("13A340", Some("9.2"), None, 2),
                reduction("13A344", Some("9.2.1"), None, 1),
                // 10.3.3 reuses these deltas, but a later beta separates them
                reduction("14C92", None, Some("11.2"), 1),
                reduction("14E277", None, Some("11.2"), 1),
            ],
            hidden_version_prerequisites: vec!["12S507".to_string(), "12S632".to_string()],
            purported_versions: vec![PurportedVersion {
                marketing_prefix: "1.0".to_string(),
                os_prefix: "8.2".to_string(),
            }],
            discarded_versions: vec![DiscardedVersion {
                device_prefix: "Watch".to_string(),
                marketing_version: "9.0".to_string(),
                extra_rows: 2,
            }],
        }
    }
}

impl CorrectionTable {
    /// A table with no corrections at all
    pub fn empty() -> Self {
        Self {
            legacy_version_prefix: String::new(),
            date_corrections: BTreeMap::new(),
            url_carve_out: None,
            rowspan_reductions: Vec::new(),
            hidden_version_prerequisites: Vec::new(),
            purported_versions: Vec::new(),
            discarded_versions: Vec::new(),
        }
    }

    /// Load a correction table from JSON. Sections left out of the file
    /// keep their built-in values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Strip the legacy prefix from an OS version (`9.9.10.0` -> `10.0`)
    pub fn strip_legacy_prefix<'a>(&self, version: &'a str) -> &'a str {
        if self.legacy_version_prefix.is_empty() {
            return version;
        }
        version
            .strip_prefix(self.legacy_version_prefix.as_str())
            .unwrap_or(version)
    }

    /// Apply a known date correction, if there is one
    pub fn correct_date<'a>(&'a self, date: &'a str) -> &'a str {
        self.date_corrections
            .get(date)
            .map_or(date, String::as_str)
    }

    /// Check whether a package is the carved-out delta (same device and
    /// prerequisite), regardless of its OS version
    pub fn is_carve_out_delta(&self, devices: &BTreeSet<String>, prerequisite_build: &str) -> bool {
        self.url_carve_out.as_ref().is_some_and(|c| {
            devices.contains(&c.device) && c.prerequisite_build == prerequisite_build
        })
    }

    /// Check whether a package stays out of the URL grouping
    pub fn excluded_from_url_grouping(
        &self,
        devices: &BTreeSet<String>,
        prerequisite_build: &str,
        os_version: &str,
    ) -> bool {
        self.is_carve_out_delta(devices, prerequisite_build)
            && self
                .url_carve_out
                .as_ref()
                .is_some_and(|c| c.grouped_os_version != os_version)
    }

    /// Rows to take off a package's URL rowspan
    pub fn rowspan_reduction(
        &self,
        prerequisite_build: &str,
        os_version: &str,
        beta: u32,
        device: &str,
    ) -> usize {
        self.rowspan_reductions
            .iter()
            .find(|r| r.matches(prerequisite_build, os_version, beta, device))
            .map_or(0, |r| r.reduce_by)
    }

    /// Check whether the version text is left out for a prerequisite build
    pub fn hides_version(&self, prerequisite_build: &str) -> bool {
        self.hidden_version_prerequisites
            .iter()
            .any(|b| b == prerequisite_build)
    }

    /// Check whether a package gets a purported-version cell
    pub fn has_purported_version(&self, marketing_version: &str, os_version: &str) -> bool {
        self.purported_versions.iter().any(|p| {
            marketing_version.starts_with(&p.marketing_prefix) && os_version.starts_with(&p.os_prefix)
        })
    }

    /// Marketing versions discarded for a device
    pub fn discarded_versions_for<'a>(
        &'a self,
        device: &'a str,
    ) -> impl Iterator<Item = &'a DiscardedVersion> + 'a {
        self.discarded_versions
            .iter()
            .filter(move |d| device.starts_with(&d.device_prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn devices(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strip_legacy_prefix() {
        let table = CorrectionTable::default();
        assert_eq!(table.strip_legacy_prefix("9.9.10.0"), "10.0");
        assert_eq!(table.strip_legacy_prefix("9.3.5"), "9.3.5");
        assert_eq!(CorrectionTable::empty().strip_legacy_prefix("9.9.10.0"), "9.9.10.0");
    }

    #[test]
    fn test_url_carve_out() {
        let table = CorrectionTable::default();
        let ipod = devices(&["iPod5,1"]);

        assert!(table.excluded_from_url_grouping(&ipod, "10B141", "8.4"));
        assert!(!table.excluded_from_url_grouping(&ipod, "10B141", "8.4.1"));
        assert!(!table.excluded_from_url_grouping(&ipod, "11D257", "8.4"));
        assert!(!table.excluded_from_url_grouping(&devices(&["iPhone5,1"]), "10B141", "8.4"));
    }

    #[test]
    fn test_rowspan_reductions() {
        let table = CorrectionTable::default();

        assert_eq!(table.rowspan_reduction("N/A", "9.2", 0, "iPhone5,1"), 4);
        assert_eq!(table.rowspan_reduction("N/A", "9.2", 0, "iPad2,1"), 0);
        assert_eq!(table.rowspan_reduction("N/A", "9.2", 3, "iPhone5,1"), 0);
        assert_eq!(table.rowspan_reduction("N/A", "9.2.1", 0, "iPad2,1"), 2);
        assert_eq!(table.rowspan_reduction("13A344", "9.2.1", 0, "iPad2,1"), 1);
        assert_eq!(table.rowspan_reduction("14C92", "11.2", 0, "iPhone9,1"), 1);
        assert_eq!(table.rowspan_reduction("14C92", "11.1.2", 0, "iPhone9,1"), 0);
        assert_eq!(table.rowspan_reduction("14G60", "11.2", 0, "iPhone9,1"), 0);
    }

    #[test]
    fn test_date_corrections() {
        let mut table = CorrectionTable::default();
        table
            .date_corrections
            .insert("20161305".to_string(), "20160513".to_string());

        assert_eq!(table.correct_date("20161305"), "20160513");
        assert_eq!(table.correct_date("20170101"), "20170101");
        assert_eq!(table.correct_date("201218.D22"), "20120307");
        assert_eq!(table.correct_date("2015106-DC"), "20151006");
        assert_eq!(table.correct_date("20160009/1"), "20160913");
    }

    #[test]
    fn test_discarded_versions_for() {
        let table = CorrectionTable::default();
        assert_eq!(table.discarded_versions_for("Watch2,3").count(), 1);
        assert_eq!(table.discarded_versions_for("iPhone9,1").count(), 0);
    }

    #[test]
    fn test_load_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"date_corrections": {{"20150931": "20150930"}}, "discarded_versions": []}}"#
        )
        .unwrap();

        let table = CorrectionTable::load(file.path()).unwrap();
        assert_eq!(table.correct_date("20150931"), "20150930");
        assert!(table.discarded_versions.is_empty());
        assert_eq!(table.legacy_version_prefix, "9.9.");
        assert_eq!(table.rowspan_reductions.len(), 6);
    }
}
