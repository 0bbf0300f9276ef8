//! End-to-end rendering: validation, ingestion, filtering, sorting and output

use crate::buildnum;
use crate::corrections::CorrectionTable;
use crate::device::{Device, DeviceCatalog};
use crate::error::{Error, Result};
use crate::filter::{self, FilterOptions};
use crate::layout;
use crate::overrides::OverrideLookup;
use crate::package::Package;
use crate::record::RawRecord;
use crate::rowspan::RowspanCounts;
use crate::table::TableFrame;
use crate::text;
use crate::wiki;
use rayon::prelude::*;
use tracing::{info, warn};

/// Where the records came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    /// A Mesu property list
    Mesu,
    /// Pallas asset query responses
    Pallas,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    /// Wiki markup; `full_table` adds the heading and table frame
    Wiki { full_table: bool },
}

/// One rendering request
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub device: Option<String>,
    pub model: Option<String>,
    pub filter: FilterOptions,
    pub format: OutputFormat,
}

impl Query {
    /// Validate the device and model of the request
    pub fn device(&self) -> Result<Device> {
        Device::new(self.device.as_deref(), self.model.as_deref())
    }
}

/// Check the build a Pallas query is made for
pub fn validate_pallas_build(build: &str) -> Result<()> {
    if buildnum::is_well_formed(build) {
        Ok(())
    } else {
        Err(Error::BadBuild(build.to_string()))
    }
}

/// Reference data shared by every render
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub overrides: OverrideLookup,
    pub corrections: CorrectionTable,
    pub devices: DeviceCatalog,
}

/// Renders catalogs. Holds only read-only reference data; every call
/// builds its own packages and rowspan counts.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    context: Context,
}

impl Pipeline {
    /// Create a pipeline over the given reference data
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Check a request before any catalog is retrieved
    pub fn validate(&self, query: &Query, kind: CatalogKind) -> Result<Device> {
        let device = query.device()?;

        if kind == CatalogKind::Mesu && device.requires_pallas() {
            return Err(Error::NeedsPallas(device.identifier().to_string()));
        }

        Ok(device)
    }

    /// Validate a request and render its catalog.
    ///
    /// `records` is `None` when no catalog could be provided.
    pub fn run(
        &self,
        query: &Query,
        kind: CatalogKind,
        records: Option<Vec<RawRecord>>,
    ) -> Result<String> {
        let device = self.validate(query, kind)?;
        let records = records.ok_or(Error::NoCatalog)?;
        Ok(self.render(query, &device, records))
    }

    /// Turn raw records into packages. Records missing a required field are
    /// logged and skipped.
    pub fn ingest(&self, records: Vec<RawRecord>) -> Vec<Package> {
        let Context {
            overrides,
            corrections,
            ..
        } = &self.context;

        records
            .into_par_iter()
            .filter_map(
                |record| match Package::from_record(&record, overrides, corrections) {
                    Ok(package) => Some(package),
                    Err(e) => {
                        warn!(build = record.get_str("Build"), "skipping record: {e}");
                        None
                    }
                },
            )
            .collect()
    }

    /// Render validated records for a device
    pub fn render(&self, query: &Query, device: &Device, records: Vec<RawRecord>) -> String {
        let total = records.len();
        let selection = filter::select(self.ingest(records), device, &query.filter);

        let mut packages = selection.packages;
        packages.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
        info!(
            device = device.identifier(),
            records = total,
            packages = packages.len(),
            "catalog filtered"
        );

        match query.format {
            OutputFormat::Text => text::render(&packages, device),
            OutputFormat::Wiki { full_table } => {
                let counts = RowspanCounts::tally(&packages, &self.context.corrections);
                let mut table =
                    layout::layout(&packages, counts, device, &self.context.corrections);
                if full_table {
                    table.frame = Some(TableFrame {
                        heading: self.context.devices.heading(device),
                        stub_notice: selection.stub_seen,
                    });
                }
                wiki::emit(&table)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::BuildOverride;
    use crate::version::Version;

    fn record(build: &str, version: &str, devices: Vec<&str>) -> RawRecord {
        RawRecord::new()
            .with("Build", build)
            .with("OSVersion", version)
            .with("SupportedDevices", devices)
            .with("_DownloadSize", 1000_i64)
            .with("__BaseURL", "http://appldnld.apple.com/")
            .with("__RelativePath", format!("{build}-{version}.zip"))
    }

    fn query(device: &str, format: OutputFormat) -> Query {
        Query {
            device: Some(device.to_string()),
            format,
            ..Default::default()
        }
    }

    #[test]
    fn test_validation_conditions() {
        let pipeline = Pipeline::default();
        let condition = |query: &Query, kind, records| {
            pipeline.run(query, kind, records).unwrap_err().condition()
        };

        let no_device = Query::default();
        assert_eq!(condition(&no_device, CatalogKind::Mesu, Some(vec![])), Some("device"));

        let no_model = query("iPhone8,2", OutputFormat::Text);
        assert_eq!(condition(&no_model, CatalogKind::Mesu, Some(vec![])), Some("model"));

        let homepod = query("AudioAccessory1,1", OutputFormat::Text);
        assert_eq!(condition(&homepod, CatalogKind::Mesu, Some(vec![])), Some("needspallas"));
        assert!(pipeline.run(&homepod, CatalogKind::Pallas, Some(vec![])).is_ok());

        let iphone = query("iPhone9,1", OutputFormat::Text);
        assert_eq!(condition(&iphone, CatalogKind::Mesu, None), Some("nofile"));
    }

    #[test]
    fn test_validate_pallas_build() {
        assert!(validate_pallas_build("17A577").is_ok());
        let err = validate_pallas_build("17-A577").unwrap_err();
        assert_eq!(err.condition(), Some("badbuild"));
    }

    #[test]
    fn test_malformed_records_skipped() {
        let pipeline = Pipeline::default();
        let records = vec![
            record("14G60", "10.3.3", vec!["iPhone9,1"]),
            RawRecord::new().with("OSVersion", "10.3.3"),
        ];

        assert_eq!(pipeline.ingest(records).len(), 1);
    }

    #[test]
    fn test_text_output_sorted() {
        let pipeline = Pipeline::default();
        let records = vec![
            record("10A403", "6.0", vec!["iPhone5,1"]),
            record("9A334", "5.0", vec!["iPhone5,1"]),
            record("10A350", "6.0", vec!["iPhone4,1"]),
        ];
        let output = pipeline
            .run(&query("iPhone5,1", OutputFormat::Text), CatalogKind::Mesu, Some(records))
            .unwrap();

        let headlines: Vec<&str> = output
            .lines()
            .filter(|l| l.starts_with("iOS "))
            .collect();
        assert_eq!(headlines, vec!["iOS 5.0 (Build 9A334)", "iOS 6.0 (Build 10A403)"]);
    }

    #[test]
    fn test_deterministic_order() {
        let pipeline = Pipeline::default();
        let records: Vec<RawRecord> = ["14G60", "9A334", "12F5061", "14A403", "10A55", "13G36"]
            .iter()
            .map(|b| record(b, "9.0", vec!["iPhone5,1"]))
            .collect();
        let mut reversed = records.clone();
        reversed.reverse();

        let q = query("iPhone5,1", OutputFormat::Wiki { full_table: false });
        let first = pipeline.run(&q, CatalogKind::Mesu, Some(records)).unwrap();
        let second = pipeline.run(&q, CatalogKind::Mesu, Some(reversed)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bounds_scenario() {
        let pipeline = Pipeline::default();
        let records: Vec<RawRecord> = [
            ("12H321", "8.4.1"),
            ("13A344", "9.0"),
            ("13B143", "9.1"),
            ("13C75", "9.2"),
            ("13D15", "9.2.1"),
            ("13E238", "9.3"),
        ]
        .iter()
        .map(|(b, v)| record(b, v, vec!["iPhone5,1"]))
        .collect();

        let mut q = query("iPhone5,1", OutputFormat::Text);
        q.filter.minimum = Some("9.0".parse::<Version>().unwrap());
        q.filter.maximum = Some("9.2".parse::<Version>().unwrap());

        let output = pipeline.run(&q, CatalogKind::Mesu, Some(records)).unwrap();
        let headlines: Vec<&str> = output.lines().filter(|l| l.starts_with("iOS ")).collect();
        assert_eq!(
            headlines,
            vec![
                "iOS 9.0 (Build 13A344)",
                "iOS 9.1 (Build 13B143)",
                "iOS 9.2 (Build 13C75)"
            ]
        );
    }

    #[test]
    fn test_wiki_same_version_two_builds() {
        let pipeline = Pipeline::default();
        let records = vec![
            record("14A403", "10.3.3", vec!["iPhone9,1"]),
            record("14A404", "10.3.3", vec!["iPhone9,1"]),
        ];
        let output = pipeline
            .run(
                &query("iPhone9,1", OutputFormat::Wiki { full_table: false }),
                CatalogKind::Mesu,
                Some(records),
            )
            .unwrap();

        assert!(output.contains("| rowspan=\"2\" | 10.3.3\n"));
        assert!(output.contains("| 14A403\n"));
        assert!(output.contains("| 14A404\n"));
        assert_eq!(output.matches("| colspan=\"2\" {{n/a}}").count(), 2);
    }

    #[test]
    fn test_wiki_full_table() {
        let mut context = Context::default();
        context.overrides.insert(
            "iOS 10",
            "14G60",
            BuildOverride {
                date: Some("20170719".to_string()),
                ..Default::default()
            },
        );
        let pipeline = Pipeline::new(context);
        let stub = RawRecord::new()
            .with("Build", "99Z999")
            .with("OSVersion", "99.0")
            .with("AllowableOTA", false)
            .with("SupportedDevices", vec!["iPhone7,2"]);
        let records = vec![record("14G60", "10.3.3", vec!["iPhone7,2"]), stub];

        let mut q = query("iPhone7,2", OutputFormat::Wiki { full_table: true });
        q.filter.remove_stubs = true;
        let output = pipeline.run(&q, CatalogKind::Mesu, Some(records)).unwrap();

        assert!(output.starts_with("=== [[iPhone7,2]] ===\nUsers still running"));
        assert!(output.contains("| {{date|2017|07|19}}\n"));
        assert!(!output.contains("99Z999"));
        assert!(output.ends_with("|}"));
    }

    #[test]
    fn test_fresh_state_between_runs() {
        let pipeline = Pipeline::default();
        let q = query("iPhone9,1", OutputFormat::Wiki { full_table: false });
        let records = vec![
            record("14A403", "10.3.3", vec!["iPhone9,1"]),
            record("14A404", "10.3.3", vec!["iPhone9,1"]),
        ];

        let first = pipeline.run(&q, CatalogKind::Mesu, Some(records.clone())).unwrap();
        let second = pipeline.run(&q, CatalogKind::Mesu, Some(records)).unwrap();
        assert_eq!(first, second);
    }
}
