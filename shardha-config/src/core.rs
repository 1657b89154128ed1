use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::Path;
use tracing::info;

use super::cluster::{Cluster, Role};
use super::error::Error;
use super::properties::Properties;

/// Configuration for both clusters.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Preferred cluster.
    #[serde(default)]
    pub primary: Cluster,
    /// Fallback cluster.
    #[serde(default)]
    pub secondary: Cluster,
}

impl Config {
    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let source = read_to_string(path)?;
        let config = Self::from_toml(&source)?;
        info!(
            "loaded \"{}\" [primary: {} nodes, secondary: {} nodes]",
            path.display(),
            config.primary.nodes.len(),
            config.secondary.nodes.len()
        );
        Ok(config)
    }

    /// Parse and validate TOML.
    pub fn from_toml(source: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(source).map_err(|err| Error::config(source, err))?;
        config.check()?;
        Ok(config)
    }

    /// Build from one properties set, with `primary.` and `secondary.` prefixes.
    pub fn from_properties(properties: &Properties) -> Result<Self, Error> {
        let config = Self {
            primary: properties.cluster(Some(Role::Primary.prefix()))?,
            secondary: properties.cluster(Some(Role::Secondary.prefix()))?,
        };
        config.check()?;
        Ok(config)
    }

    /// Build from two unprefixed properties files, one per cluster.
    pub fn from_property_files(
        primary: impl AsRef<Path>,
        secondary: impl AsRef<Path>,
    ) -> Result<Self, Error> {
        let config = Self {
            primary: Properties::load(primary)?.cluster(None)?,
            secondary: Properties::load(secondary)?.cluster(None)?,
        };
        config.check()?;
        Ok(config)
    }

    /// Settings for one role.
    pub fn cluster(&self, role: Role) -> &Cluster {
        match role {
            Role::Primary => &self.primary,
            Role::Secondary => &self.secondary,
        }
    }

    /// Validate both clusters.
    pub fn check(&self) -> Result<(), Error> {
        self.primary.check(Role::Primary)?;
        self.secondary.check(Role::Secondary)?;
        Ok(())
    }
}
