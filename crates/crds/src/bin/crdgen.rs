//! Prints the PerformanceProfile CRD manifest as YAML.

use crds::PerformanceProfile;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&PerformanceProfile::crd())?);
    Ok(())
}
