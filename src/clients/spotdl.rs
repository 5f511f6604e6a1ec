use std::{
    collections::BTreeSet,
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use log::{debug, info, warn};
use tokio::process::Command;
use walkdir::WalkDir;

use crate::clients::{
    entities::CanonicalUrl,
    errors::{Error, Result},
};

/// Filename template handed to spotdl, relative to the output directory.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "{artists} - {title}.{output-ext}";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How to invoke the external download tool.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub program: PathBuf,
    /// Arguments placed before the URL, e.g. `-m spotdl` for a Python interpreter
    pub leading_args: Vec<OsString>,
    pub ffmpeg: PathBuf,
    pub output_template: String,
    pub timeout: Duration,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        DownloaderConfig {
            program: PathBuf::from("spotdl"),
            leading_args: Vec::new(),
            // Resolved through PATH by spotdl itself
            ffmpeg: PathBuf::from("ffmpeg"),
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Fetches audio for canonical URLs by shelling out to spotdl.
///
/// The files a run produced are found by diffing the output directory, so two
/// downloads must never share an output directory at the same time.
#[derive(Debug, Clone, Default)]
pub struct Downloader {
    config: DownloaderConfig,
}

impl Downloader {
    pub fn new(config: DownloaderConfig) -> Self {
        Downloader { config }
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    fn build_args(&self, url: &CanonicalUrl, out_dir: &Path) -> Vec<OsString> {
        let mut args = self.config.leading_args.clone();
        args.extend([
            url.to_string().into(),
            "--output".into(),
            out_dir.join(&self.config.output_template).into_os_string(),
            "--ffmpeg".into(),
            self.config.ffmpeg.clone().into_os_string(),
        ]);
        args
    }

    /// Download `url` into `out_dir` and return the files that appeared there.
    pub async fn download(&self, url: &str, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let url = CanonicalUrl::parse(url)?;
        tokio::fs::create_dir_all(out_dir).await?;

        let before = snapshot(out_dir);
        let outcome = self.run_tool(&url, out_dir).await;
        let created: Vec<PathBuf> = snapshot(out_dir).difference(&before).cloned().collect();

        match outcome {
            Ok(()) => {
                info!("Downloaded {} file(s) for {url}", created.len());
                Ok(created)
            }
            Err(reason) => {
                discard_partial(&created).await;
                Err(Error::DownloadFailed {
                    url: url.to_string(),
                    reason,
                })
            }
        }
    }

    async fn run_tool(&self, url: &CanonicalUrl, out_dir: &Path) -> Result<(), String> {
        info!("Running {} for {url} ...", self.config.program.display());
        let mut command = Command::new(&self.config.program);
        command
            .args(self.build_args(url, out_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so ffmpeg and other helpers die with the tool
        #[cfg(unix)]
        command.process_group(0);
        let child = command
            .spawn()
            .map_err(|e| format!("cannot start {}: {e}", self.config.program.display()))?;
        let pid = child.id();

        // Dropping the wait future on timeout kills the child
        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(output) => {
                output.map_err(|e| format!("waiting for {} failed: {e}", self.config.program.display()))?
            }
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid).await;
                }
                return Err(format!("timed out after {:?}", self.config.timeout));
            }
        };

        let success = output.status.success();
        for line in String::from_utf8_lossy(&output.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&output.stderr).lines())
            .filter(|line| !line.trim().is_empty())
        {
            if success {
                debug!("spotdl: {line}");
            } else {
                warn!("spotdl: {line}");
            }
        }

        if success {
            Ok(())
        } else {
            Err(format!("exited with {}", output.status))
        }
    }
}

/// SIGKILL every process left in the group led by `pid`.
#[cfg(unix)]
async fn kill_process_group(pid: u32) {
    // The shell builtin, /bin/kill is not installed everywhere
    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("kill -s KILL -{pid}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(status) if status.success() => debug!("Killed process group {pid}"),
        // Nothing left to kill once the whole group has exited
        Ok(status) => debug!("kill for process group {pid} exited with {status}"),
        Err(e) => warn!("Could not kill process group {pid}: {e}"),
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pid: u32) {}

/// Regular files below `dir`, recursively.
fn snapshot(dir: &Path) -> BTreeSet<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

// A failed attempt never contributes files; remove what it left behind so a
// retry sees them as new again.
async fn discard_partial(created: &[PathBuf]) {
    for path in created {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed partial output {}", path.display()),
            Err(e) => warn!("Could not remove partial output {}: {e}", path.display()),
        }
    }
}
