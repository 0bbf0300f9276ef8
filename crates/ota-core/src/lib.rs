//! ota-core: Core library for parsing OTA software update catalogs
//!
//! This library provides functionality to:
//! - Deserialize Mesu property-list catalogs and Pallas JWT responses
//! - Normalize raw catalog records into package descriptors, correcting
//!   inflated build numbers and mislabeled release types
//! - Select the packages for one device within version bounds
//! - Order packages by release and render them as a text report or a
//!   wiki table with merged cells

pub mod buildnum;
pub mod catalog;
pub mod corrections;
pub mod device;
pub mod error;
pub mod filter;
pub mod layout;
pub mod overrides;
pub mod package;
pub mod pipeline;
pub mod record;
pub mod rowspan;
pub mod sortkey;
pub mod table;
pub mod text;
pub mod version;
pub mod wiki;

pub use catalog::{parse_mesu_bytes, parse_mesu_file, parse_pallas_json, parse_pallas_response};
pub use corrections::CorrectionTable;
pub use device::{Device, DeviceCatalog, DeviceEntry, DeviceFamily};
pub use error::{Error, Result};
pub use filter::FilterOptions;
pub use overrides::{BuildOverride, OverrideLookup};
pub use package::{Package, ReleaseClass, ReleaseType, NOT_APPLICABLE};
pub use pipeline::{validate_pallas_build, CatalogKind, Context, OutputFormat, Pipeline, Query};
pub use record::{RawRecord, Value};
pub use rowspan::RowspanCounts;
pub use table::{Cell, Column, Row, WikiTable};
pub use version::Version;
