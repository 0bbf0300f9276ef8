//! Canonical ordering key for packages
//!
//! Comparing two keys as strings gives the release order: build first,
//! then what the package upgrades from, then compatibility version and
//! release classification.

use crate::buildnum;
use crate::package::{Package, ReleaseType};

/// Replacement for the numeric run of a dishonest build. Every build of the
/// branch whose padded run is nonzero compares after it.
const DISHONEST_RUN: &str = "0000";

/// Padding put in front of the release type rank of a universal package
const UNIVERSAL_PREFIX: &str = "0000000000";

/// Compose the sort key of a package
pub fn sort_key(package: &Package) -> String {
    format!(
        "{}{}{}{}{}",
        padded_build(package.declared_build(), package.is_honest_build()),
        prerequisite_major(package.prerequisite_version()),
        padded_prerequisite(package),
        package.compatibility_version(),
        package.release_class().rank(),
    )
}

/// Pad a build so that `9A350` sorts before `10A350` and `10A55` before
/// `10A403`.
fn padded_build(build: &str, honest: bool) -> String {
    let build = pad_branch(build);

    if !honest {
        return match buildnum::branch_end(&build) {
            Some(end) => format!("{}{DISHONEST_RUN}", &build[..end]),
            None => build,
        };
    }

    buildnum::pad_numeric_run(&build)
}

/// Prefix single-digit branch numbers with `0`
fn pad_branch(build: &str) -> String {
    if buildnum::is_old_style(build) {
        format!("0{build}")
    } else {
        build.to_string()
    }
}

fn prerequisite_major(version: &str) -> u32 {
    version
        .split('.')
        .next()
        .and_then(|major| major.trim().parse().ok())
        .unwrap_or(0)
}

fn padded_prerequisite(package: &Package) -> String {
    if package.is_universal() {
        let rank = match package.release_type() {
            ReleaseType::Beta => 1,
            ReleaseType::Carrier => 2,
            ReleaseType::Internal => 3,
            ReleaseType::Public | ReleaseType::Unknown(_) => 0,
        };
        return format!("{UNIVERSAL_PREFIX}{rank}");
    }

    let build = package.prerequisite_build();
    if buildnum::is_old_style(build) {
        return format!("0{build}");
    }

    let build = if package.prerequisite_version().contains("beta") {
        buildnum::remove_padding(build)
    } else {
        build.to_string()
    };

    let mut padded = buildnum::pad_numeric_run(&build);
    // A final build sorts after the betas numbered like it
    if padded.ends_with(|c: char| c.is_ascii_digit()) {
        padded.push('z');
    }
    padded
}
