//! Steps that place files into the tree: first-boot defaults and `.config`.

use std::fs;

use crate::error::StepError;
use crate::log_collector::Logger;
use crate::models::ExecutionContext;

pub const UCI_DEFAULTS_SCRIPT: &str = "files/etc/uci-defaults/99-wrtprep";

/// First-boot script recording where the firmware was built from.
///
/// uci-defaults scripts that exit 0 are deleted after their first run.
pub fn render_uci_defaults(ctx: &ExecutionContext) -> String {
    let quote = |value: &str| format!("'{}'", value.replace('\'', r"'\''"));
    format!(
        "#!/bin/sh\n\
         # Generated by wrtprep; runs once on first boot.\n\
         cat > /etc/wrtprep-release <<'EOF'\n\
         WRTPREP_REPO={}\n\
         WRTPREP_BRANCH={}\n\
         WRTPREP_COMMIT={}\n\
         EOF\n\
         exit 0\n",
        quote(&ctx.repo_url),
        quote(&ctx.branch),
        quote(ctx.commit.as_deref().unwrap_or("HEAD")),
    )
}

pub fn install_uci_defaults(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    let path = ctx.build_dir.join(UCI_DEFAULTS_SCRIPT);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StepError::io(format!("create {}", parent.display()), e))?;
    }
    fs::write(&path, render_uci_defaults(ctx))
        .map_err(|e| StepError::io(format!("write {}", path.display()), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .map_err(|e| StepError::io(format!("chmod {}", path.display()), e))?;
    }

    logger.info(format!("installed {}", UCI_DEFAULTS_SCRIPT));
    Ok(())
}

/// Install the build configuration as `<build_dir>/.config`.
pub fn apply_config(ctx: &ExecutionContext, logger: &Logger) -> Result<(), StepError> {
    let target = ctx.build_dir.join(".config");
    fs::copy(&ctx.config_file, &target).map_err(|e| {
        StepError::io(
            format!("copy {} to {}", ctx.config_file.display(), target.display()),
            e,
        )
    })?;
    logger.info(format!(
        "applied {} as {}",
        ctx.config_file.display(),
        target.display()
    ));
    Ok(())
}
