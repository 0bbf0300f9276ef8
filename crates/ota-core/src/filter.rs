//! Package selection for one device

use crate::device::Device;
use crate::package::Package;
use crate::version::Version;
use rayon::prelude::*;
use tracing::debug;

/// Build number of the dummy package that tells users to update with iTunes
const STUB_BUILD: &str = "99Z999";

/// What to keep out of a catalog
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Keep pre-releases as well as final releases
    pub show_beta: bool,
    /// Drop packages the OS isn't allowed to install
    pub remove_stubs: bool,
    /// Lowest marketing version to keep
    pub minimum: Option<Version>,
    /// Highest marketing version to keep
    pub maximum: Option<Version>,
}

/// Packages that passed the filter, in catalog order
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub packages: Vec<Package>,
    /// A dummy update was among the packages for this device
    pub stub_seen: bool,
}

/// Select the packages for `device`. Catalog order is preserved.
pub fn select(packages: Vec<Package>, device: &Device, options: &FilterOptions) -> Selection {
    let stub_seen = device.may_show_stub_notice()
        && packages
            .par_iter()
            .any(|p| !p.allowable_ota() && p.actual_build() == STUB_BUILD);

    let packages: Vec<Package> = packages
        .into_par_iter()
        .filter(|p| keep(p, device, options))
        .collect();

    Selection {
        packages,
        stub_seen,
    }
}

/// Check whether a package belongs in the output for `device`
pub fn keep(package: &Package, device: &Device, options: &FilterOptions) -> bool {
    if !package.supported_devices().contains(device.identifier()) {
        return false;
    }

    if device.needs_model() {
        let matches_model = device
            .model()
            .is_some_and(|m| package.supported_models().contains(m));
        if !matches_model {
            debug!(build = package.actual_build(), "skipped: model mismatch");
            return false;
        }
    }

    if !options.show_beta && package.release_class().rank() != 0 {
        return false;
    }

    if options.remove_stubs && !package.allowable_ota() {
        debug!(build = package.actual_build(), "skipped: stub");
        return false;
    }

    within_bounds(package.marketing_version(), options)
}

fn within_bounds(marketing_version: &str, options: &FilterOptions) -> bool {
    if options.minimum.is_none() && options.maximum.is_none() {
        return true;
    }

    let Ok(version) = marketing_version.parse::<Version>() else {
        debug!(marketing_version, "skipped: unparsable version with bounds set");
        return false;
    };

    options.minimum.as_ref().is_none_or(|min| version >= *min)
        && options.maximum.as_ref().is_none_or(|max| version <= *max)
}
