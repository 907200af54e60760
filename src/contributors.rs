use anyhow::Result;

use crate::collector::TrustPolicy;
use crate::config::Config;
use crate::connector_fs::FsContributors;

/// Prints every discovered contributor with its trust and manifest status.
pub fn list_contributors(config: &Config) -> Result<()> {
    let fs = FsContributors::discover(&config.contributors)?;
    let trust = TrustPolicy::new(config.collector.allowlist.clone());

    println!(
        "{:<36} {:<28} {:>7} {:<8} HEALTHY",
        "AUTHORITY", "PACKAGE", "VERSION", "TRUSTED"
    );
    for contributor in fs.contributors() {
        println!(
            "{:<36} {:<28} {:>7} {:<8} {}",
            contributor.authority,
            contributor.package_name,
            contributor.version,
            trust.is_trusted(&contributor),
            fs.is_healthy(&contributor.authority)
        );
    }

    Ok(())
}
