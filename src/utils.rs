use std::{
    env,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Output},
    time::Duration,
};

use indicatif::{ProgressBar, ProgressStyle};
use which::which;

use crate::error::{PeaksError, Result};

/// Environment variable naming the MACS2 binary
pub const MACS2_PATH_ENV: &str = "MACS2_PATH";

/// Look for a binary by explicit path first, then by an environment variable,
/// then in `PATH`.
pub fn find_binary(
    name: &str,
    binary_filepath: Option<&Path>,
    env_var: Option<&str>,
) -> Option<PathBuf> {
    if let Some(p) = binary_filepath {
        return Some(p.to_path_buf());
    }
    if let Some(p) = env_var.and_then(env::var_os).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(p));
    }
    which(name).ok()
}

pub fn find_macs2(binary_filepath: Option<&Path>) -> Result<PathBuf> {
    let macs2 = find_binary("macs2", binary_filepath, Some(MACS2_PATH_ENV))
        .ok_or(PeaksError::MissingMacs2)?;
    log::debug!("Using macs2 at {}", macs2.display());
    Ok(macs2)
}

pub fn check_if_failed(tool: &str, output: Output) -> Result<Output> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(PeaksError::ToolFailed {
            tool: tool.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        })
    }
}

/// Run `cmd` to completion, append its stderr to `log_file` if there is one,
/// and fail on a non-zero exit.
pub fn run_cmd(tool: &str, cmd: &mut Command, log_file: Option<&mut File>) -> Result<Output> {
    log::info!("{cmd:?}");
    let output = cmd.output()?;
    if let Some(log_file) = log_file {
        log_file.write_all(&output.stderr)?;
        log_file.flush()?;
    }
    log::info!("{tool} exit code: {}", output.status);
    check_if_failed(tool, output)
}

/// Show a spinner with `msg` while `f` runs.
pub fn wrap_cmd<T, E, F>(msg: &'static str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let p = ProgressBar::new_spinner().with_style(style).with_message(msg);
    p.enable_steady_tick(Duration::from_millis(100));

    match f() {
        Ok(x) => {
            p.finish_with_message(format!("✅ \"{msg}\" complete"));
            Ok(x)
        }
        Err(e) => {
            p.finish_with_message(format!("❌ \"{msg}\" failed"));
            Err(e)
        }
    }
}
