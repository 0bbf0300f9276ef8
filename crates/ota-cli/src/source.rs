//! Catalog retrieval: local files, Mesu URLs and Pallas asset queries

use ota_core::{parse_mesu_bytes, parse_mesu_file, parse_pallas_response, Device, Error, RawRecord, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MESU_ASSETS: &str = "://mesu.apple.com/assets/";

const PALLAS_URL: &str = "https://gdmf.apple.com/v2/assets";

const SOFTWARE_UPDATE_ASSET: &str = "com.apple.MobileAsset.SoftwareUpdate";

/// Something that produces raw catalog records
pub trait CatalogSource {
    fn fetch(&self) -> Result<Vec<RawRecord>>;
}

/// Pick the source for a `-f` argument: a Mesu URL or a local file
pub fn for_locator(locator: &str) -> Result<Box<dyn CatalogSource>> {
    if locator.contains(MESU_ASSETS) {
        Ok(Box::new(MesuSource::new(locator)))
    } else if locator.contains("://") {
        Err(Error::NotMesu(locator.to_string()))
    } else {
        Ok(Box::new(FileSource::new(locator)))
    }
}

fn source_error(locator: &str, e: impl std::fmt::Display) -> Error {
    Error::Source {
        locator: locator.to_string(),
        message: e.to_string(),
    }
}

/// A catalog saved to disk
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for FileSource {
    fn fetch(&self) -> Result<Vec<RawRecord>> {
        parse_mesu_file(&self.path)
    }
}

/// A catalog published on mesu.apple.com
pub struct MesuSource {
    url: String,
}

impl MesuSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl CatalogSource for MesuSource {
    fn fetch(&self) -> Result<Vec<RawRecord>> {
        info!(url = %self.url, "downloading catalog");

        let bytes = reqwest::blocking::get(&self.url)
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| source_error(&self.url, e))?;

        parse_mesu_bytes(&bytes, &self.url)
    }
}

/// Pallas audiences per OS, keyed by the OS name a device reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PallasConfig {
    audiences: BTreeMap<String, Vec<String>>,
}

impl Default for PallasConfig {
    fn default() -> Self {
        const IOS: &str = "01c1d682-6e8f-4908-b724-5501fe3f5e5c";

        let audiences = [
            ("iOS", IOS),
            // The older Apple TVs are served alongside iOS
            ("Apple TV software", IOS),
            ("tvOS", "356d9da0-eee4-4c6c-bbe5-99b60eadddf0"),
            ("audioOS", "0322d49d-d558-4ddf-bdff-c0443d0e6fac"),
            ("watchOS", "b82fcf9c-c284-41c9-8eb2-e69bf5a5269f"),
        ]
        .into_iter()
        .map(|(os, audience)| (os.to_string(), vec![audience.to_string()]))
        .collect();

        Self { audiences }
    }
}

impl PallasConfig {
    /// Load audiences from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Audiences to query for a device
    pub fn audiences_for(&self, device: &Device) -> &[String] {
        self.audiences
            .get(device.os_name())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A build (and optionally version) the device is currently running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledBuild {
    pub build: String,
    pub version: Option<String>,
}

impl InstalledBuild {
    /// Parse `BUILD` or `BUILD:VERSION`
    pub fn parse(s: &str) -> Result<Self> {
        let (build, version) = match s.split_once(':') {
            Some((build, version)) => (build, Some(version.to_string())),
            None => (s, None),
        };
        ota_core::validate_pallas_build(build)?;

        Ok(Self {
            build: build.to_string(),
            version,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssetRequest<'a> {
    asset_audience: &'a str,
    asset_type: &'a str,
    build_version: &'a str,
    client_version: u32,
    #[serde(rename = "HWModelStr", skip_serializing_if = "Option::is_none")]
    hw_model_str: Option<&'a str>,
    product_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    product_version: Option<&'a str>,
}

/// Pallas asset queries for one device
pub struct PallasSource {
    device: Device,
    installed: Vec<InstalledBuild>,
    config: PallasConfig,
}

impl PallasSource {
    pub fn new(device: Device, installed: Vec<InstalledBuild>, config: PallasConfig) -> Self {
        Self {
            device,
            installed,
            config,
        }
    }
}

impl CatalogSource for PallasSource {
    fn fetch(&self) -> Result<Vec<RawRecord>> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| source_error(PALLAS_URL, e))?;
        let mut records = Vec::new();

        for audience in self.config.audiences_for(&self.device) {
            for installed in &self.installed {
                let request = AssetRequest {
                    asset_audience: audience,
                    asset_type: SOFTWARE_UPDATE_ASSET,
                    build_version: &installed.build,
                    client_version: 2,
                    hw_model_str: self.device.model(),
                    product_type: self.device.identifier(),
                    product_version: installed.version.as_deref(),
                };
                debug!(audience = %audience, build = %installed.build, "querying Pallas");

                let body = client
                    .post(PALLAS_URL)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .json(&request)
                    .send()
                    .and_then(|r| r.error_for_status())
                    .and_then(|r| r.text())
                    .map_err(|e| source_error(PALLAS_URL, e))?;

                records.extend(parse_pallas_response(&body, PALLAS_URL)?);
            }
        }

        info!(assets = records.len(), "Pallas queries finished");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_locator() {
        assert!(for_locator("https://mesu.apple.com/assets/com_apple_MobileAsset_SoftwareUpdate/com_apple_MobileAsset_SoftwareUpdate.xml").is_ok());
        assert!(for_locator("catalog.xml").is_ok());

        let err = for_locator("https://example.com/catalog.xml").err().unwrap();
        assert_eq!(err.condition(), Some("notmesu"));
    }

    #[test]
    fn test_file_source_missing() {
        let err = FileSource::new("/nonexistent/catalog.xml").fetch().unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }

    #[test]
    fn test_installed_build() {
        assert_eq!(
            InstalledBuild::parse("17A577:13.0").unwrap(),
            InstalledBuild {
                build: "17A577".to_string(),
                version: Some("13.0".to_string()),
            }
        );
        assert_eq!(InstalledBuild::parse("17A577").unwrap().version, None);
        assert_eq!(
            InstalledBuild::parse("latest").unwrap_err().condition(),
            Some("badbuild")
        );
    }

    #[test]
    fn test_audiences() {
        let config = PallasConfig::default();
        let audience = |id: &str| {
            config
                .audiences_for(&Device::new(Some(id), None).unwrap())
                .to_vec()
        };

        assert_eq!(audience("AppleTV3,1"), audience("iPhone9,1"));
        assert_eq!(audience("AppleTV5,3"), vec!["356d9da0-eee4-4c6c-bbe5-99b60eadddf0"]);
        assert_eq!(audience("AudioAccessory1,1"), vec!["0322d49d-d558-4ddf-bdff-c0443d0e6fac"]);
        assert_eq!(audience("Watch3,1"), vec!["b82fcf9c-c284-41c9-8eb2-e69bf5a5269f"]);
    }

    #[test]
    fn test_request_body() {
        let request = AssetRequest {
            asset_audience: "a",
            asset_type: SOFTWARE_UPDATE_ASSET,
            build_version: "17A577",
            client_version: 2,
            hw_model_str: Some("D10AP"),
            product_type: "iPhone9,1",
            product_version: None,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["AssetAudience"], "a");
        assert_eq!(json["BuildVersion"], "17A577");
        assert_eq!(json["ClientVersion"], 2);
        assert_eq!(json["HWModelStr"], "D10AP");
        assert_eq!(json["ProductType"], "iPhone9,1");
        assert!(json.get("ProductVersion").is_none());
    }
}
