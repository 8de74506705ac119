//! The configuration file: failure threshold, which inspections run and
//! the matcher's move detection knobs.
//!
//! ```yaml
//! threshold: VERIFY
//! inspections:
//!   movedfiles: false
//! build-id-dir: /usr/lib/.build-id/
//! security-paths:
//!   - /etc/sudoers.d/
//! ```

// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::peers::MatchOptions;
use crate::results::Severity;
use crate::utils;
use anyhow::{bail, Result};
use fn_error_context::context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

fn default_threshold() -> Severity {
    Severity::Verify
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default = "default_threshold")]
    pub threshold: Severity,
    #[serde(default)]
    pub inspections: BTreeMap<String, bool>,
    pub build_id_dir: Option<String>,
    pub shared_lib_marker: Option<String>,
    pub kernel_module_dirs: Option<Vec<String>>,
    pub debug_marker: Option<String>,
    #[serde(default)]
    pub security_paths: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            inspections: BTreeMap::new(),
            build_id_dir: None,
            shared_lib_marker: None,
            kernel_module_dirs: None,
            debug_marker: None,
            security_paths: Vec::new(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file (YAML or JSON).
    #[context("Loading configuration {}", path.as_ref().display())]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Config = utils::parse_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for name in self.inspections.keys() {
            if crate::inspect::lookup(name).is_none() {
                bail!("Unknown inspection: {name}");
            }
        }
        if self.threshold.rank().is_none() {
            bail!("Threshold must be one of OK, INFO, VERIFY or BAD");
        }
        Ok(())
    }

    /// Inspections run unless explicitly disabled.
    pub fn is_enabled(&self, inspection: &str) -> bool {
        self.inspections.get(inspection).copied().unwrap_or(true)
    }

    pub fn match_options(&self) -> MatchOptions {
        let defaults = MatchOptions::default();
        MatchOptions {
            build_id_dir: self
                .build_id_dir
                .clone()
                .unwrap_or(defaults.build_id_dir),
            shared_lib_marker: self
                .shared_lib_marker
                .clone()
                .unwrap_or(defaults.shared_lib_marker),
            kernel_module_dirs: self
                .kernel_module_dirs
                .clone()
                .unwrap_or(defaults.kernel_module_dirs),
            debug_marker: self
                .debug_marker
                .clone()
                .unwrap_or(defaults.debug_marker),
        }
    }

    /// True if `path` is below one of the configured security paths.
    pub fn is_security_path(&self, path: &str) -> bool {
        self.security_paths
            .iter()
            .any(|p| path.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use indoc::indoc;

    fn parse(s: &str) -> Result<Config> {
        let c: Config = utils::parse_stream(&utils::InputFormat::YAML, &mut s.as_bytes())?;
        c.validate()?;
        Ok(c)
    }

    #[test]
    fn test_defaults() {
        let c = parse("{}").unwrap();
        assert_eq!(c, Config::default());
        assert!(c.is_enabled("addedfiles"));
        assert_eq!(c.match_options(), MatchOptions::default());
        assert_eq!(c.match_options().build_id_dir, crate::peers::BUILD_ID_DIR);
    }

    #[test]
    fn test_parse() {
        let c = parse(indoc! { r#"
            threshold: BAD
            inspections:
              movedfiles: false
            build-id-dir: /usr/lib/.build-id-alt/
            security-paths:
              - /etc/sudoers.d/
        "# })
        .unwrap();
        assert_eq!(c.threshold, Severity::Bad);
        assert_eq!(
            c.inspections,
            maplit::btreemap! { "movedfiles".to_string() => false }
        );
        assert!(!c.is_enabled("movedfiles"));
        assert!(c.is_enabled("removedfiles"));
        assert_eq!(c.match_options().build_id_dir, "/usr/lib/.build-id-alt/");
        assert_eq!(c.match_options().shared_lib_marker, ".so");
        assert!(c.is_security_path("/etc/sudoers.d/wheel"));
        assert!(!c.is_security_path("/etc/motd"));
    }

    #[test]
    fn test_invalid() {
        assert!(parse("inspections: {nosuchthing: true}").is_err());
        assert!(parse("threshold: WAIVED").is_err());
        assert!(parse("threshold: PURPLE").is_err());
        assert!(parse("frobnicate: 1").is_err());
    }
}
