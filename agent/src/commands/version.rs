//! Version command

use crate::domain::config::current_version_tag;

/// Print the release tag this build reports and the crate version.
pub fn run() {
    println!(
        "fleetwatch {} (tag {})",
        env!("CARGO_PKG_VERSION"),
        current_version_tag()
    );
}
