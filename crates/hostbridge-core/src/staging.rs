use std::io::Read;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::delivery::UpdateDeliveryError;

pub(crate) const BINARY_NAME: &str = if cfg!(windows) {
    "hostbridge.exe"
} else {
    "hostbridge"
};

/// Stream `url` to `dest`, returning the number of bytes written.
pub(crate) async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, UpdateDeliveryError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|error| UpdateDeliveryError::http("download request failed", error))?;

    if !response.status().is_success() {
        return Err(UpdateDeliveryError::Invalid(format!(
            "Download failed with status {}",
            response.status()
        )));
    }

    let mut file = tokio::fs::File::create(dest).await.map_err(|error| {
        UpdateDeliveryError::io_with_path("failed to create download file", dest, &error)
    })?;

    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|error| UpdateDeliveryError::http("download stream error", error))?;
        file.write_all(&chunk).await.map_err(|error| {
            UpdateDeliveryError::io_with_path("failed to write download data", dest, &error)
        })?;
        downloaded += chunk.len() as u64;
    }

    file.flush().await.map_err(|error| {
        UpdateDeliveryError::io_with_path("failed to flush download file", dest, &error)
    })?;

    info!("Download complete: {downloaded} bytes");
    Ok(downloaded)
}

pub(crate) fn sha256_file(path: &Path) -> Result<String, UpdateDeliveryError> {
    let mut file = std::fs::File::open(path).map_err(|error| {
        UpdateDeliveryError::io_with_path("failed to open file for checksum", path, &error)
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];

    loop {
        let read = file.read(&mut buffer).map_err(|error| {
            UpdateDeliveryError::io_with_path("failed to read file for checksum", path, &error)
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub(crate) fn verify_checksum(path: &Path, expected: &str) -> Result<(), UpdateDeliveryError> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        debug!("Checksum verified for {}", path.display());
        Ok(())
    } else {
        Err(UpdateDeliveryError::Invalid(format!(
            "Checksum mismatch for {}. Refusing to stage update.",
            path.display()
        )))
    }
}

pub(crate) fn extract_zip(zip_path: &Path, dest: &Path) -> Result<(), UpdateDeliveryError> {
    let file = std::fs::File::open(zip_path).map_err(|error| {
        UpdateDeliveryError::io_with_path("failed to open zip file", zip_path, &error)
    })?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|error| UpdateDeliveryError::zip("failed to read zip archive", error))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| UpdateDeliveryError::zip("failed to read zip entry", error))?;
        let Some(name) = entry.enclosed_name() else {
            warn!("Skipping zip entry with unsafe path");
            continue;
        };
        let out_path = dest.join(name);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|error| {
                UpdateDeliveryError::io_with_path(
                    "failed to create extraction directory",
                    &out_path,
                    &error,
                )
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                UpdateDeliveryError::io_with_path(
                    "failed to create extraction parent directory",
                    parent,
                    &error,
                )
            })?;
        }
        let mut outfile = std::fs::File::create(&out_path).map_err(|error| {
            UpdateDeliveryError::io_with_path("failed to create extracted file", &out_path, &error)
        })?;
        std::io::copy(&mut entry, &mut outfile).map_err(|error| {
            UpdateDeliveryError::io_with_path("failed to extract archive entry", &out_path, &error)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
            }
        }
    }

    debug!("Extraction complete to {}", dest.display());
    Ok(())
}

/// Find the bridge executable inside an extracted payload, at most two levels deep.
pub(crate) fn find_binary(dir: &Path) -> Option<PathBuf> {
    find_binary_at_depth(dir, 2)
}

fn find_binary_at_depth(dir: &Path, depth: usize) -> Option<PathBuf> {
    let candidate = dir.join(BINARY_NAME);
    if candidate.is_file() {
        return Some(candidate);
    }
    if depth == 0 {
        return None;
    }

    std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .find_map(|path| find_binary_at_depth(&path, depth - 1))
}

/// Path the running executable should be relaunched from.
///
/// After `self-replace` on Linux `/proc/self/exe` points at the unlinked inode, so
/// `current_exe()` carries a ` (deleted)` suffix.
pub(crate) fn relaunch_path() -> Result<PathBuf, UpdateDeliveryError> {
    let exe = std::env::current_exe()
        .map_err(|error| UpdateDeliveryError::io("failed to get current executable", error))?;
    Ok(strip_deleted_suffix(exe))
}

fn strip_deleted_suffix(exe: PathBuf) -> PathBuf {
    let fixed = exe
        .to_string_lossy()
        .strip_suffix(" (deleted)")
        .map(PathBuf::from);
    fixed.unwrap_or(exe)
}

/// Remove leftover `.tmp*` staging directories from earlier runs.
pub(crate) fn cleanup_stale(staging_root: &Path) {
    let Ok(entries) = std::fs::read_dir(staging_root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && entry.file_name().to_string_lossy().starts_with(".tmp") {
            debug!("Cleaning up update staging dir: {}", path.display());
            let _ = std::fs::remove_dir_all(&path);
        }
    }
}
