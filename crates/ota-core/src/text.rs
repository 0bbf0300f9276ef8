//! Plain-text report, one block per package

use crate::device::Device;
use crate::package::Package;
use std::fmt::Write;

/// Format a byte count with thousands separators: `1234567` -> `1,234,567`
pub fn format_size(bytes: u64) -> String {
    let digits = bytes.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

/// Version with its pre-release label, e.g. `10.3 beta 2` or `9.0 Public Beta`
pub(crate) fn labelled_version(package: &Package) -> String {
    let mut label = package.marketing_version().to_string();

    if let Some(class) = package.release_class().label() {
        label.push(' ');
        label.push_str(class);
        if package.beta_number() > 1 {
            let _ = write!(label, " {}", package.beta_number());
        }
    }

    label
}

/// Render the report for a sorted package sequence
pub fn render(packages: &[Package], device: &Device) -> String {
    let mut out = String::new();

    for package in packages {
        render_package(&mut out, package, device.os_name());
    }

    out
}

fn render_package(out: &mut String, package: &Package, os_name: &str) {
    let yes_no = |flag: bool| if flag { "Yes" } else { "No" };

    let _ = writeln!(
        out,
        "{os_name} {} (Build {})",
        labelled_version(package),
        package.actual_build()
    );
    let _ = writeln!(
        out,
        "Listed as: {} (Build {})",
        package.os_version(),
        package.declared_build()
    );
    let _ = writeln!(out, "Installation permitted: {}", yes_no(package.allowable_ota()));
    let _ = writeln!(out, "Auto-Update permitted: {}", yes_no(package.auto_update()));
    let _ = writeln!(out, "Reported Release Type: {}", package.release_type());

    if package.is_universal() {
        let _ = writeln!(out, "Requires: Not specified");
    } else {
        let _ = writeln!(
            out,
            "Requires: {} (Build {})",
            package.prerequisite_version(),
            package.prerequisite_build()
        );
    }

    match package.date() {
        Some(date) => {
            let _ = writeln!(out, "Timestamp: {}", date.format("%Y/%m/%d"));
        }
        None => {
            let _ = writeln!(out, "Timestamp: N/A");
        }
    }

    let _ = writeln!(out, "Compatibility Version: {}", package.compatibility_version());
    let _ = writeln!(out, "URL: {}", package.url());
    let _ = writeln!(out, "File size: {}", format_size(package.size()));
    out.push('\n');
}
