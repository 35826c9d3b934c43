//! Update delivery backed by GitHub releases.
//!
//! A check looks up the latest release, downloads the payload published for the
//! running platform into a temp dir under the staging root, verifies its
//! SHA-256 digest, and reports `Downloaded` to every subscriber. Installing
//! swaps the running executable for the staged one (or hands an `.msi` to
//! `msiexec`) and spawns the new version.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use hostbridge_platform::HideWindow;
use log::{debug, info, warn};
use tempfile::TempDir;
use thiserror::Error;

use crate::collaborators::{UpdateDelivery, UpdateEvent, UpdateListener};
use crate::release::{ReleaseCheckError, ReleaseFeed, check_latest};
use crate::staging;

#[derive(Debug, Error)]
pub enum UpdateDeliveryError {
    #[error("update feed is not configured")]
    NotConfigured,
    #[error("no update has been downloaded")]
    NothingStaged,
    #[error(transparent)]
    Release(#[from] ReleaseCheckError),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{context}: {source}")]
    Zip {
        context: &'static str,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("{0}")]
    Invalid(String),
}

impl UpdateDeliveryError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn http(context: &'static str, source: reqwest::Error) -> Self {
        Self::Http { context, source }
    }

    pub(crate) fn zip(context: &'static str, source: zip::result::ZipError) -> Self {
        Self::Zip { context, source }
    }

    pub(crate) fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::io(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseDeliveryConfig {
    /// `None` disables delivery; every check then reports `NotConfigured`.
    pub feed: Option<ReleaseFeed>,
    pub current_version: String,
    pub staging_dir: PathBuf,
}

#[derive(Debug)]
struct StagedUpdate {
    version: String,
    payload: PathBuf,
    dir: TempDir,
}

pub struct ReleaseDelivery {
    client: reqwest::Client,
    config: ReleaseDeliveryConfig,
    listeners: Mutex<Vec<UpdateListener>>,
    staged: Mutex<Option<StagedUpdate>>,
}

impl ReleaseDelivery {
    #[must_use]
    pub fn new(client: reqwest::Client, config: ReleaseDeliveryConfig) -> Self {
        Self {
            client,
            config,
            listeners: Mutex::new(Vec::new()),
            staged: Mutex::new(None),
        }
    }

    /// Check for a newer release and stage it, reporting the outcome to
    /// subscribers. Nothing is reported when already up to date.
    pub async fn check_and_download(&self) {
        match self.fetch_update().await {
            Ok(Some(staged)) => {
                let version = staged.version.clone();
                info!(
                    "Update {version} staged at {}",
                    staged.payload.display()
                );
                *lock(&self.staged) = Some(staged);
                self.emit(&UpdateEvent::Downloaded { version });
            }
            Ok(None) => debug!("No newer release available"),
            Err(error) => self.emit(&UpdateEvent::Error(error.to_string())),
        }
    }

    #[must_use]
    pub fn staged_version(&self) -> Option<String> {
        lock(&self.staged)
            .as_ref()
            .map(|staged| staged.version.clone())
    }

    /// Remove staging directories left behind by earlier runs.
    pub fn cleanup_stale_staging(&self) {
        staging::cleanup_stale(&self.config.staging_dir);
    }

    async fn fetch_update(&self) -> Result<Option<StagedUpdate>, UpdateDeliveryError> {
        let feed = self
            .config
            .feed
            .as_ref()
            .ok_or(UpdateDeliveryError::NotConfigured)?;

        let Some(update) = check_latest(&self.client, feed, &self.config.current_version).await?
        else {
            return Ok(None);
        };

        let asset = update.asset.ok_or_else(|| {
            UpdateDeliveryError::Invalid(format!(
                "Release {} has no verifiable payload for this platform",
                update.latest_version
            ))
        })?;

        std::fs::create_dir_all(&self.config.staging_dir)
            .map_err(|error| UpdateDeliveryError::io("failed to create staging directory", error))?;
        let dir = tempfile::tempdir_in(&self.config.staging_dir)
            .map_err(|error| UpdateDeliveryError::io("failed to create temp directory", error))?;

        let file_name = Path::new(&asset.name)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty() && !name.contains(".."))
            .unwrap_or("update-download");
        let payload = dir.path().join(file_name);

        info!(
            "Downloading update {} from {}",
            update.latest_version, asset.download_url
        );
        staging::download_file(&self.client, &asset.download_url, &payload).await?;
        staging::verify_checksum(&payload, &asset.sha256)?;

        Ok(Some(StagedUpdate {
            version: update.latest_version,
            payload,
            dir,
        }))
    }

    fn emit(&self, event: &UpdateEvent) {
        if let UpdateEvent::Error(message) = event {
            warn!("Update delivery failed: {message}");
        }
        lock(&self.listeners).retain(|listener| listener.notify(event.clone()));
    }
}

impl UpdateDelivery for ReleaseDelivery {
    fn subscribe(&self, listener: UpdateListener) {
        lock(&self.listeners).push(listener);
    }

    fn install_and_relaunch(&self) -> Result<(), UpdateDeliveryError> {
        let staged = lock(&self.staged)
            .take()
            .ok_or(UpdateDeliveryError::NothingStaged)?;
        info!("Installing update {}", staged.version);

        let is_msi = staged
            .payload
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("msi"));
        if is_msi {
            return launch_msi(staged);
        }

        let extract_dir = staged.dir.path().join("extracted");
        std::fs::create_dir_all(&extract_dir).map_err(|error| {
            UpdateDeliveryError::io("failed to create extraction directory", error)
        })?;
        staging::extract_zip(&staged.payload, &extract_dir)?;

        let new_binary = staging::find_binary(&extract_dir).ok_or_else(|| {
            UpdateDeliveryError::Invalid(format!(
                "No '{}' binary found in update payload",
                staging::BINARY_NAME
            ))
        })?;

        self_replace::self_replace(&new_binary)
            .map_err(|error| UpdateDeliveryError::io("failed to replace executable", error))?;

        let exe = staging::relaunch_path()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755));
        }

        info!("Relaunching from {}", exe.display());
        relaunch_command(&exe)
            .spawn()
            .map_err(|error| UpdateDeliveryError::io("failed to relaunch app", error))?;
        Ok(())
    }
}

fn relaunch_command(exe: &Path) -> std::process::Command {
    let mut command = std::process::Command::new(exe);
    command.hide_window();
    command
}

#[cfg_attr(not(windows), allow(dead_code))]
fn msi_command(payload: &Path) -> std::process::Command {
    let mut command = std::process::Command::new("msiexec");
    command
        .arg("/i")
        .arg(payload)
        .arg("/passive")
        .hide_window();
    command
}

#[cfg(windows)]
fn launch_msi(staged: StagedUpdate) -> Result<(), UpdateDeliveryError> {
    let payload = staged.payload;
    // msiexec outlives this process; the staged directory must survive our exit.
    let _ = staged.dir.keep();
    info!("Launching MSI installer: {}", payload.display());
    msi_command(&payload)
        .spawn()
        .map_err(|error| UpdateDeliveryError::io("failed to launch MSI installer", error))?;
    Ok(())
}

#[cfg(not(windows))]
fn launch_msi(_staged: StagedUpdate) -> Result<(), UpdateDeliveryError> {
    Err(UpdateDeliveryError::Invalid(
        "MSI installation is only supported on Windows".to_string(),
    ))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
