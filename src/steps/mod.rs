//! Built-in step catalog for preparing an ImmortalWrt/OpenWrt source tree.
//!
//! Every handler takes the shared [`ExecutionContext`] and the run's
//! [`Logger`] and reports failure as a [`StepError`]. The catalog order in
//! [`DEFAULT_PIPELINE`] is the order a full preparation runs in.

pub mod command;
pub mod feeds;
pub mod install;
pub mod packages;
pub mod patch;
pub mod source;

use std::fs;
use std::io;
use std::panic::Location;
use std::path::Path;

use crate::error::StepError;
use crate::log_collector::Logger;
use crate::models::ExecutionContext;
use crate::orchestrator::{Pipeline, StepRegistry};

pub use command::CommandStep;

/// Signature shared by every built-in handler.
pub type BuiltinStep = fn(&ExecutionContext, &Logger) -> Result<(), StepError>;

/// Built-in handlers by name.
pub const BUILTIN_STEPS: &[(&str, BuiltinStep)] = &[
    ("clone_repo", source::clone_repo),
    ("clean_up", source::clean_up),
    ("reset_feeds_conf", source::reset_feeds_conf),
    ("update_feeds", feeds::update_feeds),
    ("remove_unwanted_packages", packages::remove_unwanted_packages),
    ("update_golang", feeds::update_golang),
    ("install_feeds", feeds::install_feeds),
    ("fix_kernel_vermagic", patch::fix_kernel_vermagic),
    ("pin_kernel_patchver", patch::pin_kernel_patchver),
    ("set_build_signature", patch::set_build_signature),
    ("install_uci_defaults", install::install_uci_defaults),
    ("apply_config", install::apply_config),
];

/// Default declaration list; `update_golang` is off unless enabled.
pub const DEFAULT_PIPELINE: &[&str] = &[
    "clone_repo",
    "clean_up",
    "reset_feeds_conf",
    "update_feeds",
    "remove_unwanted_packages",
    "~update_golang",
    "install_feeds",
    "fix_kernel_vermagic",
    "pin_kernel_patchver",
    "set_build_signature",
    "install_uci_defaults",
    "apply_config",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_STEPS.iter().any(|(builtin, _)| *builtin == name)
}

pub fn default_pipeline() -> Result<Pipeline, StepError> {
    Pipeline::parse(DEFAULT_PIPELINE)
}

/// Register every built-in handler into `registry`.
pub fn register_builtins(registry: &mut StepRegistry) -> Result<(), StepError> {
    for (name, handler) in BUILTIN_STEPS {
        registry.register(name, *handler)?;
    }
    Ok(())
}

/// A registry holding just the built-in catalog.
pub fn builtin_registry() -> Result<StepRegistry, StepError> {
    let mut registry = StepRegistry::new();
    register_builtins(&mut registry)?;
    Ok(registry)
}

/// Rewrite a text file in place with `edit`.
///
/// Returns whether the content changed; an unchanged file is not rewritten.
#[track_caller]
pub(crate) fn edit_file<F>(path: &Path, edit: F) -> Result<bool, StepError>
where
    F: FnOnce(&str) -> Result<String, StepError>,
{
    let location = Location::caller();
    let original = fs::read_to_string(path).map_err(|source| StepError::Io {
        operation: format!("read {}", path.display()),
        source,
        location,
    })?;

    let updated = edit(&original)?;
    if updated == original {
        return Ok(false);
    }

    fs::write(path, updated).map_err(|source| StepError::Io {
        operation: format!("write {}", path.display()),
        source,
        location,
    })?;
    Ok(true)
}

/// Remove a file or directory tree. Missing paths are not an error.
///
/// Returns whether anything was removed.
#[track_caller]
pub(crate) fn remove_path(path: &Path) -> Result<bool, StepError> {
    let location = Location::caller();
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(StepError::Io {
                operation: format!("stat {}", path.display()),
                source,
                location,
            })
        }
    };

    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|source| StepError::Io {
        operation: format!("remove {}", path.display()),
        source,
        location,
    })?;
    Ok(true)
}
