//! Pipeline manifest loader and validation.
//!
//! A manifest may replace the default step order and declare shell command
//! steps:
//!
//! ```toml
//! [pipeline]
//! steps = ["clone_repo", "~update_golang", "prebuild"]
//!
//! [commands.prebuild]
//! run = "make defconfig"
//! cwd = "."
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::{is_valid_step_name, StepDecl, OPTIONAL_SIGIL};
use crate::steps::is_builtin;

/// Parsed pipeline manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub commands: BTreeMap<String, CommandSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    /// Replaces the built-in order when present.
    pub steps: Option<Vec<String>>,
}

/// One `[commands.<name>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSpec {
    pub run: String,
    /// Working directory relative to the build directory.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

/// Load and validate a manifest file.
pub fn load_manifest(path: &Path) -> Result<Manifest, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(path.display().to_string())
        } else {
            ConfigError::IoError(e)
        }
    })?;
    parse_manifest(&content)
}

/// Parse and validate manifest text.
pub fn parse_manifest(content: &str) -> Result<Manifest, ConfigError> {
    let manifest: Manifest = toml::from_str(content)?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}

pub fn validate_manifest(manifest: &Manifest) -> Result<(), ConfigError> {
    if let Some(steps) = &manifest.pipeline.steps {
        for raw in steps {
            StepDecl::parse(raw).map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;
        }
    }

    for (name, spec) in &manifest.commands {
        if name.starts_with(OPTIONAL_SIGIL) {
            return Err(ConfigError::ValidationFailed(format!(
                "command '{}' must be declared without the '{}' sigil",
                name, OPTIONAL_SIGIL
            )));
        }
        if !is_valid_step_name(name) {
            return Err(ConfigError::ValidationFailed(format!(
                "command name '{}' may only contain letters, digits, '_', '.' and '-'",
                name
            )));
        }
        if is_builtin(name) {
            return Err(ConfigError::ValidationFailed(format!(
                "command '{}' collides with a built-in step",
                name
            )));
        }
        if spec.run.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(format!(
                "command '{}' has an empty run script",
                name
            )));
        }
        if let Some(cwd) = &spec.cwd {
            let escapes = cwd
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                return Err(ConfigError::ValidationFailed(format!(
                    "command '{}' cwd '{}' must stay inside the build directory",
                    name,
                    cwd.display()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_manifest_keeps_defaults() {
        let manifest = parse_manifest("").unwrap();
        assert_eq!(manifest, Manifest::default());
        assert!(manifest.pipeline.steps.is_none());
    }

    #[test]
    fn test_full_manifest_parses() {
        let manifest = parse_manifest(
            r#"
[pipeline]
steps = ["clone_repo", "~update_golang", "prebuild"]

[commands.prebuild]
run = "make defconfig"
cwd = "."
"#,
        )
        .unwrap();

        assert_eq!(manifest.pipeline.steps.as_ref().unwrap().len(), 3);
        let prebuild = &manifest.commands["prebuild"];
        assert_eq!(prebuild.run, "make defconfig");
        assert_eq!(prebuild.cwd, Some(PathBuf::from(".")));
    }

    #[test]
    fn test_invalid_manifests_are_rejected() {
        let cases = [
            "[pipeline]\nsteps = [\"\"]\n",
            "[pipeline]\nsteps = [\"~\"]\n",
            "[commands.clone_repo]\nrun = \"true\"\n",
            "[commands.\"~late\"]\nrun = \"true\"\n",
            "[commands.\"bad name\"]\nrun = \"true\"\n",
            "[commands.empty]\nrun = \"  \"\n",
            "[commands.up]\nrun = \"true\"\ncwd = \"../outside\"\n",
            "[commands.abs]\nrun = \"true\"\ncwd = \"/tmp\"\n",
        ];
        for case in cases {
            assert!(
                matches!(parse_manifest(case), Err(ConfigError::ValidationFailed(_))),
                "accepted: {}",
                case
            );
        }
    }

    #[test]
    fn test_unknown_keys_and_bad_toml_are_syntax_errors() {
        assert!(matches!(
            parse_manifest("[pipeline]\norder = []\n"),
            Err(ConfigError::InvalidToml(_))
        ));
        assert!(matches!(
            parse_manifest("[pipeline"),
            Err(ConfigError::InvalidToml(_))
        ));
    }

    #[test]
    fn test_load_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let err = load_manifest(&dir.path().join("pipeline.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
