//! Layout pass: turns sorted packages plus their rowspan counts into a
//! cell plan
//!
//! Each row only carries the cells that start on it. The first row with a
//! given build, version or file takes the whole count for that key and
//! evicts it; rows further down fall under the merged cell.

use crate::buildnum;
use crate::corrections::CorrectionTable;
use crate::device::Device;
use crate::package::{Package, ReleaseType};
use crate::rowspan::RowspanCounts;
use crate::table::{Cell, Column, Row, WikiTable, NOT_AVAILABLE};
use crate::text::{format_size, labelled_version};
use regex::Regex;
use std::sync::LazyLock;

static FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9a-f]{40}\.zip").expect("valid regex"));

const INFLATED_REF: &str = "<ref name=\"inflated\" />";

/// Lay out the table body for a sorted, filtered package sequence
pub fn layout(
    packages: &[Package],
    mut counts: RowspanCounts,
    device: &Device,
    corrections: &CorrectionTable,
) -> WikiTable {
    let show_compatibility =
        device.is_watch() || packages.iter().any(|p| p.compatibility_version() > 0);

    // Discarded versions never get a cell; the first version cell covers their rows
    let mut extra_rows: usize = corrections
        .discarded_versions_for(device.identifier())
        .filter_map(|d| {
            counts
                .take_marketing_version(&d.marketing_version)
                .map(|_| d.extra_rows)
        })
        .sum();

    let mut rows = Vec::with_capacity(packages.len());
    for package in packages {
        let mut row = Row::default();

        version_cells(&mut row, package, &mut counts, device, corrections, extra_rows);
        extra_rows = 0;

        if let Some(span) = counts.take_build(package.declared_build()) {
            let mut content = package.actual_build().to_string();
            if !package.is_honest_build() {
                content.push_str(INFLATED_REF);
            }
            row.cells.push(Cell::new(Column::Build, content).spanning(span));
        }

        prerequisite_cells(&mut row, package, &mut counts);

        if show_compatibility {
            let content = match package.compatibility_version() {
                0 => NOT_AVAILABLE.to_string(),
                version => version.to_string(),
            };
            row.cells.push(Cell::new(Column::CompatibilityVersion, content));
        }

        if let Some(span) = counts.take_date(package.actual_build()) {
            let content = match package.date() {
                Some(date) => date.format("{{date|%Y|%m|%d}}").to_string(),
                None => NOT_AVAILABLE.to_string(),
            };
            row.cells.push(Cell::new(Column::ReleaseDate, content).spanning(span));
        }

        let release_type = match package.release_type() {
            ReleaseType::Public => NOT_AVAILABLE.to_string(),
            other => other.to_string(),
        };
        row.cells.push(Cell::new(Column::ReleaseType, release_type));

        file_cells(&mut row, package, &mut counts, device, corrections);

        rows.push(row);
    }

    let mut columns = vec![
        Column::Version,
        Column::Build,
        Column::PrerequisiteVersion,
        Column::PrerequisiteBuild,
    ];
    if show_compatibility {
        columns.push(Column::CompatibilityVersion);
    }
    columns.extend([
        Column::ReleaseDate,
        Column::ReleaseType,
        Column::Url,
        Column::Size,
    ]);

    WikiTable {
        columns,
        rows,
        frame: None,
    }
}

fn version_cells(
    row: &mut Row,
    package: &Package,
    counts: &mut RowspanCounts,
    device: &Device,
    corrections: &CorrectionTable,
    extra_rows: usize,
) {
    let Some(span) = counts.take_marketing_version(package.marketing_version()) else {
        return;
    };

    if device.is_legacy_apple_tv() {
        row.cells
            .push(Cell::new(Column::MarketingVersionFiller, "[MARKETING VERSION]").spanning(span));
    }

    let mut content = if corrections.hides_version(package.prerequisite_build()) {
        labelled_version(package)
            .trim_start_matches(package.marketing_version())
            .trim_start()
            .to_string()
    } else {
        labelled_version(package)
    };
    if let Some(suffix) = package.suffix() {
        if !content.is_empty() {
            content.push(' ');
        }
        content.push_str(suffix);
    }

    let version_span = if span > 1 { span + extra_rows } else { span };
    row.cells
        .push(Cell::new(Column::Version, content).spanning(version_span));

    if corrections.has_purported_version(package.marketing_version(), package.os_version()) {
        row.cells
            .push(Cell::new(Column::PurportedVersion, package.os_version()).spanning(span));
    }
}

fn prerequisite_cells(row: &mut Row, package: &Package, counts: &mut RowspanCounts) {
    let build = package.declared_build();

    if let Some(span) = counts.take_prerequisite_version(build, package.prerequisite_version()) {
        let cell = if package.is_universal() {
            Cell::new(Column::PrerequisiteVersion, NOT_AVAILABLE).across(2)
        } else {
            Cell::new(Column::PrerequisiteVersion, prerequisite_label(package))
        };
        row.cells.push(cell.spanning(span));
    }

    if package.is_universal() {
        return;
    }

    if let Some(span) = counts.take_prerequisite_build(build, package.prerequisite_build()) {
        row.cells.push(
            Cell::new(Column::PrerequisiteBuild, package.prerequisite_build()).spanning(span),
        );
    }
}

fn prerequisite_label(package: &Package) -> String {
    let label = package.prerequisite_version();

    if label.contains(" GM") {
        label.replace("GM", "[[Golden Master|GM]]")
    } else if label.contains(" RC") {
        label.replace("RC", "[[Release Candidate|RC]]")
    } else if buildnum::looks_like_beta(package.prerequisite_build()) && !label.contains("beta") {
        format!("{label} beta #")
    } else {
        label.to_string()
    }
}

fn file_cells(
    row: &mut Row,
    package: &Package,
    counts: &mut RowspanCounts,
    device: &Device,
    corrections: &CorrectionTable,
) {
    let span = if corrections.excluded_from_url_grouping(
        package.supported_devices(),
        package.prerequisite_build(),
        package.os_version(),
    ) {
        1
    } else {
        let reduce_by = corrections.rowspan_reduction(
            package.prerequisite_build(),
            package.os_version(),
            package.beta_number(),
            device.identifier(),
        );
        match counts.claim_url(package.url(), package.prerequisite_build(), reduce_by) {
            Some(span) => span,
            None => return,
        }
    };

    let link = match FILE_NAME.find(package.url()) {
        Some(name) => format!("[{} {}]", package.url(), name.as_str()),
        None => format!("[{}]", package.url()),
    };

    row.cells.push(Cell::new(Column::Url, link).spanning(span));
    row.cells
        .push(Cell::new(Column::Size, format_size(package.size())).spanning(span));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::{BuildOverride, OverrideLookup};
    use crate::record::RawRecord;

    const FILE_A: &str = "0123456789abcdef0123456789abcdef01234567.zip";
    const FILE_B: &str = "89abcdef0123456789abcdef0123456789abcdef.zip";

    struct Fixture {
        overrides: OverrideLookup,
        corrections: CorrectionTable,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                overrides: OverrideLookup::new(),
                corrections: CorrectionTable::default(),
            }
        }

        fn package(&self, record: RawRecord) -> Package {
            Package::from_record(&record, &self.overrides, &self.corrections).unwrap()
        }

        fn table(&self, packages: &[Package], device: &str) -> WikiTable {
            let device = Device::new(Some(device), None).unwrap();
            let counts = RowspanCounts::tally(packages, &self.corrections);
            layout(packages, counts, &device, &self.corrections)
        }
    }

    fn record(build: &str, version: &str, device: &str, file: &str) -> RawRecord {
        RawRecord::new()
            .with("Build", build)
            .with("OSVersion", version)
            .with("SupportedDevices", vec![device])
            .with("_DownloadSize", 1_048_576_i64)
            .with("__BaseURL", "http://appldnld.apple.com/ios/091-00000-20170719-0000/")
            .with("__RelativePath", file)
    }

    fn delta(record: RawRecord, build: &str, version: &str) -> RawRecord {
        record
            .with("PrerequisiteBuild", build)
            .with("PrerequisiteOSVersion", version)
    }

    #[test]
    fn test_same_version_two_builds() {
        let fixture = Fixture::new();
        let packages = vec![
            fixture.package(record("14A403", "10.3.3", "iPhone9,1", FILE_A)),
            fixture.package(record("14A404", "10.3.3", "iPhone9,1", FILE_B)),
        ];
        let table = fixture.table(&packages, "iPhone9,1");

        let version = table.rows[0].get(Column::Version).unwrap();
        assert_eq!(version.rowspan, 2);
        assert_eq!(version.content, "10.3.3");
        assert!(table.rows[1].get(Column::Version).is_none());

        let builds: Vec<&str> = table
            .rows
            .iter()
            .filter_map(|r| r.get(Column::Build))
            .map(|c| c.content.as_str())
            .collect();
        assert_eq!(builds, vec!["14A403", "14A404"]);
    }

    #[test]
    fn test_universal_prerequisite() {
        let fixture = Fixture::new();
        let packages = vec![fixture.package(record("14G60", "10.3.3", "iPhone9,1", FILE_A))];
        let table = fixture.table(&packages, "iPhone9,1");

        let cell = table.rows[0].get(Column::PrerequisiteVersion).unwrap();
        assert_eq!(cell.colspan, 2);
        assert_eq!(cell.content, NOT_AVAILABLE);
        assert!(table.rows[0].get(Column::PrerequisiteBuild).is_none());
    }

    #[test]
    fn test_rowspans_cover_every_row() {
        let fixture = Fixture::new();
        let base = || record("14G60", "10.3.3", "iPhone9,1", FILE_B);
        let packages = vec![
            fixture.package(record("14G60", "10.3.3", "iPhone9,1", FILE_A)),
            fixture.package(delta(base(), "14E277", "10.3")),
            fixture.package(delta(base(), "14E304", "10.3.1")),
            fixture.package(delta(
                record("14G60", "10.3.3", "iPhone9,1", FILE_A),
                "14F89",
                "10.3.2",
            )),
        ];
        let table = fixture.table(&packages, "iPhone9,1");

        assert_eq!(table.span_total(Column::Version), 4);
        assert_eq!(table.span_total(Column::Build), 4);
        assert_eq!(table.span_total(Column::ReleaseDate), 4);
        assert_eq!(table.span_total(Column::ReleaseType), 4);
        assert_eq!(table.span_total(Column::Url), 4);
        assert_eq!(table.span_total(Column::Size), 4);
    }

    #[test]
    fn test_inflated_build_gets_footnote() {
        let fixture = Fixture::new();
        let packages = vec![fixture.package(
            record("12F5061", "8.4", "iPhone7,2", FILE_A).with("ReleaseType", "Public"),
        )];
        let table = fixture.table(&packages, "iPhone7,2");

        assert_eq!(
            table.rows[0].get(Column::Build).unwrap().content,
            "12F61<ref name=\"inflated\" />"
        );
    }

    #[test]
    fn test_prerequisite_labels() {
        let mut fixture = Fixture::new();
        fixture.overrides.insert(
            "iOS 11",
            "15A372",
            BuildOverride {
                version: Some("11.0".to_string()),
                suffix: Some("GM".to_string()),
                ..Default::default()
            },
        );

        let gm = fixture.package(delta(
            record("15A402", "11.0.1", "iPhone9,1", FILE_A),
            "15A372",
            "11.0",
        ));
        assert_eq!(prerequisite_label(&gm), "11.0 [[Golden Master|GM]]");

        let beta = fixture.package(delta(
            record("15A402", "11.0.1", "iPhone9,1", FILE_A),
            "15A5370a",
            "11.0",
        ));
        assert_eq!(prerequisite_label(&beta), "11.0 beta #");

        let plain = fixture.package(delta(
            record("15A402", "11.0.1", "iPhone9,1", FILE_A),
            "14G60",
            "10.3.3",
        ));
        assert_eq!(prerequisite_label(&plain), "10.3.3");
    }

    #[test]
    fn test_cells_and_columns() {
        let fixture = Fixture::new();
        let packages = vec![fixture.package(
            record("15A372", "11.0", "iPhone9,1", FILE_A).with("ReleaseType", "Carrier"),
        )];
        let table = fixture.table(&packages, "iPhone9,1");
        let row = &table.rows[0];

        assert!(!table.columns.contains(&Column::CompatibilityVersion));
        assert_eq!(row.get(Column::ReleaseType).unwrap().content, "Carrier");
        assert_eq!(row.get(Column::ReleaseDate).unwrap().content, "{{date|2017|07|19}}");
        assert_eq!(row.get(Column::Size).unwrap().content, "1,048,576");
        assert!(row
            .get(Column::Url)
            .unwrap()
            .content
            .ends_with(&format!(" {FILE_A}]")));
        assert_eq!(row.get(Column::Version).unwrap().content, "11.0 Carrier Beta");
    }

    #[test]
    fn test_watch_columns() {
        let fixture = Fixture::new();
        let packages = vec![fixture.package(record("15R372", "4.0", "Watch2,3", FILE_A))];
        let table = fixture.table(&packages, "Watch2,3");

        assert!(table.columns.contains(&Column::CompatibilityVersion));
        assert_eq!(
            table.rows[0].get(Column::CompatibilityVersion).unwrap().content,
            NOT_AVAILABLE
        );
    }

    #[test]
    fn test_legacy_apple_tv_filler() {
        let fixture = Fixture::new();
        let packages = vec![fixture.package(record("12B435", "7.0.2", "AppleTV3,2", FILE_A))];
        let table = fixture.table(&packages, "AppleTV3,2");

        assert_eq!(
            table.rows[0].cells[0],
            Cell::new(Column::MarketingVersionFiller, "[MARKETING VERSION]")
        );
    }

    #[test]
    fn test_hidden_version_and_purported_version() {
        let fixture = Fixture::new();
        let packages = vec![fixture.package(delta(
            record("12S632", "8.2", "Watch1,1", FILE_A).with("MarketingVersion", "1.0.1"),
            "12S507",
            "8.2",
        ))];
        let table = fixture.table(&packages, "Watch1,1");
        let row = &table.rows[0];

        assert_eq!(row.get(Column::Version).unwrap().content, "");
        assert_eq!(row.get(Column::PurportedVersion).unwrap().content, "8.2");
    }

    #[test]
    fn test_discarded_watch_version() {
        let fixture = Fixture::new();
        let packages = vec![
            fixture.package(record("13S661", "2.0", "Watch1,1", FILE_A)),
            fixture.package(record("13S663", "2.0", "Watch1,1", FILE_B)),
            fixture.package(record("13V144", "9.0", "Watch1,1", FILE_B)),
        ];
        let table = fixture.table(&packages, "Watch1,1");

        assert_eq!(table.rows[0].get(Column::Version).unwrap().rowspan, 4);
        assert!(table.rows[2].get(Column::Version).is_none());
    }

    #[test]
    fn test_carve_out_gets_single_row_cells() {
        let fixture = Fixture::new();
        let packages = vec![
            fixture.package(delta(record("12H143", "8.4", "iPod5,1", FILE_A), "10B141", "6.1")),
            fixture.package(delta(record("12H143", "8.4", "iPod5,1", FILE_A), "11D257", "7.1.2")),
        ];
        let table = fixture.table(&packages, "iPod5,1");

        assert_eq!(table.rows[0].get(Column::Url).unwrap().rowspan, 1);
        assert_eq!(table.rows[1].get(Column::Url).unwrap().rowspan, 1);
    }

    #[test]
    fn test_reused_file_gets_second_cell() {
        let fixture = Fixture::new();
        let file = |prereq: &str, version: &str| {
            fixture.package(delta(record("15C114", "11.2", "iPhone9,1", FILE_A), prereq, version))
        };
        let packages = vec![
            file("14C92", "10.2"),
            file("14D27", "10.2.1"),
            fixture.package(delta(
                record("15C114", "11.2", "iPhone9,1", FILE_B),
                "14E277",
                "10.3",
            )),
            file("14F89", "10.3.2"),
        ];
        let table = fixture.table(&packages, "iPhone9,1");

        // 14C92 loses the row it shares with 14F89 further down
        assert_eq!(table.rows[0].get(Column::Url).unwrap().rowspan, 2);
        assert!(table.rows[1].get(Column::Url).is_none());
        assert_eq!(table.rows[3].get(Column::Url).unwrap().rowspan, 1);
    }
}
