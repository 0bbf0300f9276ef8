//! Package descriptors: one normalized, immutable view of a catalog record
//!
//! Catalog records changed shape many times over the years and are often
//! mislabeled. [`Package::from_record`] reconciles them once at ingestion:
//! it detects inflated build numbers, refines the declared release type,
//! applies the override lookup, and computes the sort key.

use crate::buildnum;
use crate::corrections::CorrectionTable;
use crate::error::{Error, Result};
use crate::overrides::{BuildOverride, OverrideLookup};
use crate::record::RawRecord;
use crate::sortkey;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Sentinel for a missing prerequisite (a universal package)
pub const NOT_APPLICABLE: &str = "N/A";

static URL_DATE_ZERO_PADDED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{4}[-.]20[0-9]{8}-").expect("valid regex"));

static URL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{4}[-.]20[0-9]{6}.").expect("valid regex"));

/// Date-like token of a URL, possibly mangled (`2015106-DC`, `201218.D22`)
static URL_DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]{4}[-.](20[0-9]{4}[0-9.][A-Za-z0-9_-]..)").expect("valid regex")
});

/// Release type as declared by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReleaseType {
    Public,
    Beta,
    Carrier,
    Internal,
    /// Anything else, kept verbatim for reporting
    Unknown(String),
}

impl ReleaseType {
    /// Interpret the `ReleaseType` field. A missing field means `Public`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("Public") => ReleaseType::Public,
            Some("Beta") => ReleaseType::Beta,
            Some("Carrier") => ReleaseType::Carrier,
            Some("Internal") => ReleaseType::Internal,
            Some(other) => ReleaseType::Unknown(other.to_string()),
        }
    }

    /// The declared string
    pub fn as_str(&self) -> &str {
        match self {
            ReleaseType::Public => "Public",
            ReleaseType::Beta => "Beta",
            ReleaseType::Carrier => "Carrier",
            ReleaseType::Internal => "Internal",
            ReleaseType::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refined release classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReleaseClass {
    /// The declared release type wasn't recognised
    Unknown,
    /// A final (public) release
    Final,
    PublicBeta,
    DeveloperBeta,
    CarrierBeta,
    Internal,
}

impl ReleaseClass {
    /// Integer rank: -1 unknown, 0 final, 1 public beta, 2 developer beta,
    /// 3 carrier beta, 4 internal
    pub fn rank(self) -> i8 {
        match self {
            ReleaseClass::Unknown => -1,
            ReleaseClass::Final => 0,
            ReleaseClass::PublicBeta => 1,
            ReleaseClass::DeveloperBeta => 2,
            ReleaseClass::CarrierBeta => 3,
            ReleaseClass::Internal => 4,
        }
    }

    /// Check whether this is anything other than a final or unknown release
    pub fn is_prerelease(self) -> bool {
        self.rank() > 0
    }

    /// Check whether this is a public or developer beta
    pub fn is_beta(self) -> bool {
        matches!(self, ReleaseClass::PublicBeta | ReleaseClass::DeveloperBeta)
    }

    /// Label appended to the version of a pre-release
    pub fn label(self) -> Option<&'static str> {
        match self {
            ReleaseClass::PublicBeta => Some("Public Beta"),
            ReleaseClass::DeveloperBeta => Some("beta"),
            ReleaseClass::CarrierBeta => Some("Carrier Beta"),
            ReleaseClass::Internal => Some("Internal"),
            ReleaseClass::Final | ReleaseClass::Unknown => None,
        }
    }
}

/// What the documentation identifier says about the release track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentationTrack {
    PublicBeta,
    Beta,
    None,
}

impl DocumentationTrack {
    fn of(documentation_id: &str) -> Self {
        let lower = documentation_id.to_lowercase();
        if documentation_id.contains("Public") {
            DocumentationTrack::PublicBeta
        } else if ["public", "beta", "seed"].iter().any(|w| lower.contains(w)) {
            DocumentationTrack::Beta
        } else {
            DocumentationTrack::None
        }
    }
}

/// A normalized catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    declared_build: String,
    actual_build: String,
    release_type: ReleaseType,
    release_class: ReleaseClass,
    beta_number: u32,
    marketing_version: String,
    os_version: String,
    prerequisite_build: String,
    prerequisite_version: String,
    compatibility_version: u32,
    supported_devices: BTreeSet<String>,
    supported_models: BTreeSet<String>,
    size: u64,
    url: String,
    date: Option<NaiveDate>,
    allowable_ota: bool,
    auto_update: bool,
    documentation_id: String,
    suffix: Option<String>,
    sort_key: String,
}

impl Package {
    /// Derive a package from a raw catalog record.
    ///
    /// Fails only when `Build`, `OSVersion` or `SupportedDevices` is
    /// missing; every other field has a default.
    pub fn from_record(
        record: &RawRecord,
        overrides: &OverrideLookup,
        corrections: &CorrectionTable,
    ) -> Result<Self> {
        let declared_build = record
            .get_str("Build")
            .ok_or(Error::MalformedRecord { field: "Build" })?
            .to_string();
        let raw_os_version = record
            .get_str("OSVersion")
            .ok_or(Error::MalformedRecord { field: "OSVersion" })?;
        let supported_devices: BTreeSet<String> = record
            .get_str_array("SupportedDevices")
            .ok_or(Error::MalformedRecord {
                field: "SupportedDevices",
            })?
            .into_iter()
            .collect();
        // Very old catalogs don't list models
        let supported_models: BTreeSet<String> = record
            .get_str_array("SupportedDeviceModels")
            .unwrap_or_default()
            .into_iter()
            .collect();

        let release_type = ReleaseType::parse(record.get_str("ReleaseType"));
        let documentation_id = record
            .get_str("SUDocumentationID")
            .unwrap_or(NOT_APPLICABLE)
            .to_string();
        let track = DocumentationTrack::of(&documentation_id);

        let inflated = is_inflated(&declared_build, &release_type, track);
        let actual_build = if inflated {
            buildnum::remove_padding(&declared_build)
        } else {
            declared_build.clone()
        };

        let release_class = match &release_type {
            ReleaseType::Public | ReleaseType::Beta => match track {
                DocumentationTrack::PublicBeta => ReleaseClass::PublicBeta,
                DocumentationTrack::Beta => ReleaseClass::DeveloperBeta,
                DocumentationTrack::None
                    if !inflated && buildnum::looks_like_beta(&declared_build) =>
                {
                    ReleaseClass::DeveloperBeta
                }
                DocumentationTrack::None => ReleaseClass::Final,
            },
            ReleaseType::Carrier => ReleaseClass::CarrierBeta,
            ReleaseType::Internal => ReleaseClass::Internal,
            ReleaseType::Unknown(raw) => {
                warn!(build = %declared_build, release_type = %raw, "unknown release type");
                ReleaseClass::Unknown
            }
        };

        let own_override = overrides.lookup(&actual_build, &supported_models);

        let beta_number = if release_class.is_beta() {
            own_override
                .and_then(|o| o.beta)
                .unwrap_or_else(|| beta_from_documentation(&documentation_id, track))
        } else {
            0
        };

        let os_version = own_override
            .and_then(|o| o.version.clone())
            .unwrap_or_else(|| corrections.strip_legacy_prefix(raw_os_version).to_string());

        let marketing_version = own_override
            .and_then(|o| o.version.clone())
            .or_else(|| {
                record.get_str("MarketingVersion").map(|mv| {
                    if mv.contains('.') {
                        mv.to_string()
                    } else {
                        format!("{mv}.0")
                    }
                })
            })
            .unwrap_or_else(|| os_version.clone());

        let prerequisite_build = record
            .get_str("PrerequisiteBuild")
            .filter(|b| buildnum::contains_build(b))
            .unwrap_or(NOT_APPLICABLE)
            .to_string();

        let prerequisite_version =
            prerequisite_version(record, &prerequisite_build, &supported_models, overrides);

        let real_update = record.get_dict("RealUpdateAttributes");
        let size = real_update
            .and_then(|r| r.get_int("RealUpdateDownloadSize"))
            .or_else(|| record.get_int("_DownloadSize"))
            .map_or(0, |s| s.max(0) as u64);
        let url = match real_update.and_then(|r| r.get_str("RealUpdateURL")) {
            Some(url) => url.to_string(),
            None => format!(
                "{}{}",
                record.get_str("__BaseURL").unwrap_or_default(),
                record.get_str("__RelativePath").unwrap_or_default()
            ),
        };

        let date = release_date(record, own_override, &url, corrections);

        let mut package = Self {
            declared_build,
            actual_build,
            release_type,
            release_class,
            beta_number,
            marketing_version,
            os_version,
            prerequisite_build,
            prerequisite_version,
            compatibility_version: record
                .get_int("CompatibilityVersion")
                .map_or(0, |v| v.max(0) as u32),
            supported_devices,
            supported_models,
            size,
            url,
            date,
            allowable_ota: record.get_bool("AllowableOTA").unwrap_or(true),
            auto_update: record.get_bool("AutoUpdate").unwrap_or(false),
            documentation_id,
            suffix: own_override.and_then(|o| o.suffix.clone()),
            sort_key: String::new(),
        };
        package.sort_key = sortkey::sort_key(&package);

        Ok(package)
    }

    /// Build number exactly as the catalog lists it
    pub fn declared_build(&self) -> &str {
        &self.declared_build
    }

    /// Build number without inflation padding
    pub fn actual_build(&self) -> &str {
        &self.actual_build
    }

    /// Check whether the declared build is the real one
    pub fn is_honest_build(&self) -> bool {
        self.actual_build == self.declared_build
    }

    /// Release type as declared
    pub fn release_type(&self) -> &ReleaseType {
        &self.release_type
    }

    /// Refined release classification
    pub fn release_class(&self) -> ReleaseClass {
        self.release_class
    }

    /// Beta number, 0 when not a beta (or unknown)
    pub fn beta_number(&self) -> u32 {
        self.beta_number
    }

    pub fn marketing_version(&self) -> &str {
        &self.marketing_version
    }

    pub fn os_version(&self) -> &str {
        &self.os_version
    }

    /// Build this package applies on top of, or [`NOT_APPLICABLE`]
    pub fn prerequisite_build(&self) -> &str {
        &self.prerequisite_build
    }

    /// Human label of the prerequisite, e.g. `10.3 beta 2`
    pub fn prerequisite_version(&self) -> &str {
        &self.prerequisite_version
    }

    /// Check whether this package installs over any build
    pub fn is_universal(&self) -> bool {
        self.prerequisite_build == NOT_APPLICABLE
    }

    pub fn compatibility_version(&self) -> u32 {
        self.compatibility_version
    }

    pub fn supported_devices(&self) -> &BTreeSet<String> {
        &self.supported_devices
    }

    pub fn supported_models(&self) -> &BTreeSet<String> {
        &self.supported_models
    }

    /// Download size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Release date. URL timestamps can be off by a few days.
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Whether the OS may install this package (false for stubs)
    pub fn allowable_ota(&self) -> bool {
        self.allowable_ota
    }

    pub fn auto_update(&self) -> bool {
        self.auto_update
    }

    pub fn documentation_id(&self) -> &str {
        &self.documentation_id
    }

    /// Label suffix from the override lookup (`GM`, `RC`, ...)
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// Canonical ordering key
    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }

    /// Date as `(year, month, day)`
    pub fn date_parts(&self) -> Option<(i32, u32, u32)> {
        self.date.map(|d| (d.year(), d.month(), d.day()))
    }
}

/// A beta-shaped build declared as a public release, with documentation
/// that doesn't mention a beta track, carries padding that pushes devices
/// on betas to the final build.
fn is_inflated(build: &str, release_type: &ReleaseType, track: DocumentationTrack) -> bool {
    *release_type == ReleaseType::Public
        && track == DocumentationTrack::None
        && buildnum::looks_like_beta(build)
        && !build.ends_with(|c: char| c.is_ascii_lowercase())
}

/// Beta number from the tail of a documentation identifier such as
/// `iOS10Beta10` or `iOS11Seed3`. Defaults to 1.
fn beta_from_documentation(documentation_id: &str, track: DocumentationTrack) -> u32 {
    if track == DocumentationTrack::None {
        return 0;
    }

    let mut tail = documentation_id.chars().rev();
    let last = tail.next().and_then(|c| c.to_digit(10));
    let before = tail.next().and_then(|c| c.to_digit(10));

    match (before, last) {
        (Some(tens), Some(ones)) => tens * 10 + ones,
        (None, Some(digit)) | (Some(digit), None) => digit,
        (None, None) => 1,
    }
}

fn prerequisite_version(
    record: &RawRecord,
    prerequisite_build: &str,
    models: &BTreeSet<String>,
    overrides: &OverrideLookup,
) -> String {
    let raw = record.get_str("PrerequisiteOSVersion");

    let entry = (prerequisite_build != NOT_APPLICABLE)
        .then(|| overrides.lookup(prerequisite_build, models))
        .flatten();

    if let Some(entry) = entry {
        if let Some(version) = entry.version.as_deref().or(raw) {
            return compose_version_label(version, entry);
        }
    }

    match raw {
        Some(version) => version.to_string(),
        None if prerequisite_build == NOT_APPLICABLE => NOT_APPLICABLE.to_string(),
        None => "0.0".to_string(),
    }
}

/// `<version>[ beta[ N]][ <suffix>]`
fn compose_version_label(version: &str, entry: &BuildOverride) -> String {
    let mut label = version.to_string();

    match entry.beta {
        Some(1) => label.push_str(" beta"),
        Some(n) if n > 1 => {
            label.push_str(" beta ");
            label.push_str(&n.to_string());
        }
        _ => {}
    }

    if let Some(suffix) = &entry.suffix {
        label.push(' ');
        label.push_str(suffix);
    }

    label
}

fn release_date(
    record: &RawRecord,
    own_override: Option<&BuildOverride>,
    url: &str,
    corrections: &CorrectionTable,
) -> Option<NaiveDate> {
    let raw = own_override
        .and_then(|o| o.date.clone())
        .or_else(|| {
            record
                .get_str("PostingDate")
                .map(|d| d.chars().filter(char::is_ascii_digit).take(8).collect())
        })
        .or_else(|| date_from_url(url, corrections))?;

    let corrected = corrections.correct_date(&raw);
    match NaiveDate::parse_from_str(corrected, "%Y%m%d") {
        Ok(date) => Some(date),
        Err(_) => {
            debug!(date = %corrected, url, "unusable release date");
            None
        }
    }
}

/// Pull a `YYYYMMDD` timestamp out of a download URL such as
/// `.../041-80335-20161024-...` or the zero-padded `2016008004` form.
///
/// A mangled token that has a date correction is returned as is, for
/// [`CorrectionTable::correct_date`] to resolve.
fn date_from_url(url: &str, corrections: &CorrectionTable) -> Option<String> {
    if let Some(m) = URL_DATE_ZERO_PADDED.find(url) {
        let m = m.as_str();
        return Some(format!("{}{}{}", &m[5..9], &m[10..12], &m[13..15]));
    }

    if let Some(token) = URL_DATE_TOKEN.captures(url).and_then(|c| c.get(1)) {
        if corrections.date_corrections.contains_key(token.as_str()) {
            return Some(token.as_str().to_string());
        }
    }

    URL_DATE.find(url).map(|m| m.as_str()[5..13].to_string())
}
