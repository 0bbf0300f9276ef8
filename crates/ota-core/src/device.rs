//! Device identifiers, models and per-device presentation data

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static DEVICE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(AppleTV|AudioAccessory|iPad|iPhone|iPod|Watch)[0-9]?[0-9],[0-9][0-9]?$")
        .expect("valid regex")
});

static MODEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[BDJKMNP][0-9]{1,3}[A-Za-z]?AP$").expect("valid regex"));

static STUB_NOTICE_DEVICES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(iPad[4-6]|iPhone[6-8]|iPod7,1)").expect("valid regex"));

/// Devices sold in variants that share an identifier but not a catalog entry
const MODEL_AMBIGUOUS: &[&str] = &["iPad6,11", "iPad6,12", "iPhone8,1", "iPhone8,2", "iPhone8,4"];

/// Apple TVs running the pre-tvOS software
const LEGACY_APPLE_TV: &[&str] = &["AppleTV2,1", "AppleTV3,1", "AppleTV3,2"];

/// Product family, taken from the device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceFamily {
    AppleTv,
    AudioAccessory,
    IPad,
    IPhone,
    IPod,
    Watch,
}

impl DeviceFamily {
    /// Determine the family of a device identifier such as `iPhone8,1`
    pub fn of(device: &str) -> Option<Self> {
        const PREFIXES: &[(&str, DeviceFamily)] = &[
            ("AppleTV", DeviceFamily::AppleTv),
            ("AudioAccessory", DeviceFamily::AudioAccessory),
            ("iPad", DeviceFamily::IPad),
            ("iPhone", DeviceFamily::IPhone),
            ("iPod", DeviceFamily::IPod),
            ("Watch", DeviceFamily::Watch),
        ];

        PREFIXES
            .iter()
            .find(|(prefix, _)| device.starts_with(prefix))
            .map(|(_, family)| *family)
    }
}

/// A validated device identifier, with the model when one was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    identifier: String,
    family: DeviceFamily,
    model: Option<String>,
}

impl Device {
    /// Validate a device identifier and (when the device needs one) a model.
    ///
    /// A model given for a device that doesn't need one is kept as-is; it
    /// still selects the wiki header.
    pub fn new(identifier: Option<&str>, model: Option<&str>) -> Result<Self> {
        let identifier = match identifier {
            Some(id) if DEVICE_ID.is_match(id) => id,
            other => return Err(Error::InvalidDevice(other.map(str::to_string))),
        };
        let family = DeviceFamily::of(identifier)
            .ok_or_else(|| Error::InvalidDevice(Some(identifier.to_string())))?;

        if needs_model(identifier) && !model.is_some_and(|m| MODEL_ID.is_match(m)) {
            return Err(Error::InvalidModel {
                device: identifier.to_string(),
                model: model.map(str::to_string),
            });
        }

        Ok(Self {
            identifier: identifier.to_string(),
            family,
            model: model.map(str::to_string),
        })
    }

    /// The device identifier, e.g. `iPhone8,1`
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The product family
    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    /// The model, e.g. `N71AP`
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Check whether packages must be matched on model as well as device
    pub fn needs_model(&self) -> bool {
        needs_model(&self.identifier)
    }

    /// Check whether this is a watch
    pub fn is_watch(&self) -> bool {
        self.family == DeviceFamily::Watch
    }

    /// Check whether this is an Apple TV running the pre-tvOS software
    pub fn is_legacy_apple_tv(&self) -> bool {
        LEGACY_APPLE_TV.contains(&self.identifier.as_str())
    }

    /// Check whether this device's updates are only published through Pallas
    pub fn requires_pallas(&self) -> bool {
        self.family == DeviceFamily::AudioAccessory
    }

    /// Check whether this device was offered the dummy update pointing
    /// users at iTunes
    pub fn may_show_stub_notice(&self) -> bool {
        STUB_NOTICE_DEVICES.is_match(&self.identifier)
    }

    /// Name of the OS this device runs
    pub fn os_name(&self) -> &'static str {
        match self.family {
            DeviceFamily::AppleTv if self.is_legacy_apple_tv() => "Apple TV software",
            DeviceFamily::AppleTv => "tvOS",
            DeviceFamily::AudioAccessory => "audioOS",
            DeviceFamily::Watch => "watchOS",
            DeviceFamily::IPad | DeviceFamily::IPhone | DeviceFamily::IPod => "iOS",
        }
    }
}

/// Check whether a device identifier needs a model to pick its packages
pub fn needs_model(device: &str) -> bool {
    MODEL_AMBIGUOUS.contains(&device)
}

/// Header data for one device in a wiki table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceEntry {
    /// Heading level (number of `=` on each side)
    pub header_level: usize,
    /// Models sold under this name
    pub models: Vec<String>,
}

/// Device class -> device name -> header data.
///
/// Used to title full wiki tables with the device's marketing name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceCatalog {
    classes: BTreeMap<String, BTreeMap<String, DeviceEntry>>,
}

/// Resolved heading for a full wiki table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeading {
    pub level: usize,
    pub model: String,
    pub name: Option<String>,
}

impl DeviceCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device entry to a class
    pub fn insert(&mut self, class: impl Into<String>, name: impl Into<String>, entry: DeviceEntry) {
        self.classes
            .entry(class.into())
            .or_default()
            .insert(name.into(), entry);
    }

    /// Load a catalog from a property list (`.plist`) or JSON file
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

    /// Find the device name and entry for a model
    pub fn find_model(&self, model: &str) -> Option<(&str, &DeviceEntry)> {
        self.classes
            .values()
            .flat_map(|devices| devices.iter())
            .find(|(_, entry)| entry.models.iter().any(|m| m == model))
            .map(|(name, entry)| (name.as_str(), entry))
    }

    /// Build the table heading for a device. Unknown models get a level 3
    /// heading with just the model (or device identifier).
    pub fn heading(&self, device: &Device) -> TableHeading {
        let model = device.model().unwrap_or(device.identifier());

        match self.find_model(model) {
            Some((name, entry)) => TableHeading {
                level: entry.header_level,
                model: model.to_string(),
                // Level 3 headings sit under a section already naming the device
                name: (entry.header_level != 3).then(|| name.to_string()),
            },
            None => TableHeading {
                level: 3,
                model: model.to_string(),
                name: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_validation() {
        assert!(Device::new(Some("iPhone9,1"), None).is_ok());
        assert!(Device::new(Some("AppleTV5,3"), None).is_ok());
        assert!(Device::new(Some("Watch2,3"), None).is_ok());

        let err = Device::new(None, None).unwrap_err();
        assert_eq!(err.condition(), Some("device"));

        let err = Device::new(Some("Pixel3,1"), None).unwrap_err();
        assert_eq!(err.condition(), Some("device"));

        let err = Device::new(Some("iPhone"), None).unwrap_err();
        assert_eq!(err.condition(), Some("device"));
    }

    #[test]
    fn test_model_required_for_ambiguous_devices() {
        let err = Device::new(Some("iPhone8,1"), None).unwrap_err();
        assert_eq!(err.condition(), Some("model"));

        let err = Device::new(Some("iPhone8,1"), Some("N71")).unwrap_err();
        assert_eq!(err.condition(), Some("model"));

        let device = Device::new(Some("iPhone8,1"), Some("N71mAP")).unwrap();
        assert!(device.needs_model());
        assert_eq!(device.model(), Some("N71mAP"));
    }

    #[test]
    fn test_os_names() {
        let name = |id: &str| Device::new(Some(id), None).unwrap().os_name();
        assert_eq!(name("AppleTV3,2"), "Apple TV software");
        assert_eq!(name("AppleTV5,3"), "tvOS");
        assert_eq!(name("AudioAccessory1,1"), "audioOS");
        assert_eq!(name("Watch1,1"), "watchOS");
        assert_eq!(name("iPod7,1"), "iOS");
    }

    #[test]
    fn test_device_traits() {
        let homepod = Device::new(Some("AudioAccessory1,1"), None).unwrap();
        assert!(homepod.requires_pallas());

        let iphone = Device::new(Some("iPhone6,1"), None).unwrap();
        assert!(iphone.may_show_stub_notice());
        assert!(!iphone.requires_pallas());

        let iphone = Device::new(Some("iPhone10,1"), None).unwrap();
        assert!(!iphone.may_show_stub_notice());
    }

    #[test]
    fn test_heading() {
        let mut catalog = DeviceCatalog::new();
        catalog.insert(
            "iPhone",
            "iPhone 6s",
            DeviceEntry {
                header_level: 4,
                models: vec!["N71AP".to_string(), "N71mAP".to_string()],
            },
        );

        let device = Device::new(Some("iPhone8,1"), Some("N71mAP")).unwrap();
        let heading = catalog.heading(&device);
        assert_eq!(heading.level, 4);
        assert_eq!(heading.name.as_deref(), Some("iPhone 6s"));

        let device = Device::new(Some("iPhone9,1"), Some("D10AP")).unwrap();
        let heading = catalog.heading(&device);
        assert_eq!(heading.level, 3);
        assert_eq!(heading.model, "D10AP");
        assert_eq!(heading.name, None);
    }
}
