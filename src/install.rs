use crate::catalog::{DOWNLOAD_BASE, USER_AGENT};
use crate::config;
use anyhow::{Context, Result};
use filetime::{set_file_mtime, FileTime};
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use time::{Date, Month, PrimitiveDateTime, Time as TimeOfDay};
use tracing::info;
use walkdir::WalkDir;

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("mod folder is not configured or does not exist")]
    ConfigurationMissing,
    #[error("download failed: {0}")]
    DownloadFailed(anyhow::Error),
    #[error("filesystem operation failed: {0}")]
    FilesystemFailure(anyhow::Error),
}

pub struct Installer {
    mod_root: PathBuf,
    download_base: String,
}

impl Installer {
    pub fn new(mod_root: &Path) -> Self {
        Self::with_download_base(mod_root, DOWNLOAD_BASE)
    }

    pub fn with_download_base(mod_root: &Path, download_base: &str) -> Self {
        Self {
            mod_root: mod_root.to_path_buf(),
            download_base: download_base.trim_end_matches('/').to_string(),
        }
    }

    // Every fault comes back as a tagged error value; nothing propagates as
    // a panic and the scratch directory is removed on all paths.
    pub fn install(
        &self,
        artifact_filename: &str,
        target_base_name: &str,
    ) -> Result<(), InstallError> {
        if !self.mod_root.is_dir() {
            return Err(InstallError::ConfigurationMissing);
        }

        let scratch = ScratchDir::create().map_err(InstallError::FilesystemFailure)?;

        let url = format!("{}/{}", self.download_base, artifact_filename);
        let archive_path = scratch.path().join(artifact_filename);
        download(&url, &archive_path).map_err(InstallError::DownloadFailed)?;

        let destination = self.mod_root.join(target_base_name);
        replace_with_archive(&archive_path, scratch.path(), &destination)
            .map_err(InstallError::FilesystemFailure)?;

        info!("installed {target_base_name} from {artifact_filename}");
        Ok(())
    }
}

struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create() -> Result<Self> {
        let temp_root = config::default_data_dir()?.join("tmp");
        fs::create_dir_all(&temp_root).context("create temp root")?;

        let counter = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = temp_root.join(format!("install-{nanos}-{counter}"));
        fs::create_dir_all(&path).context("create scratch dir")?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn download(url: &str, path: &Path) -> Result<()> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .timeout_read(Duration::from_secs(60))
        .timeout_write(Duration::from_secs(60))
        .build();
    let response = agent
        .get(url)
        .set("User-Agent", USER_AGENT)
        .call()
        .context("download artifact")?;
    let mut reader = response.into_reader();
    let mut file = File::create(path).context("create artifact file")?;
    io::copy(&mut reader, &mut file).context("write artifact file")?;
    Ok(())
}

// The installed directory is removed before unpacking; a failure past that
// point leaves the mod uninstalled until the next attempt.
fn replace_with_archive(archive_path: &Path, scratch: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive_path).context("open archive")?;
    let mut archive = zip::ZipArchive::new(file).context("read archive")?;

    if destination.exists() {
        fs::remove_dir_all(destination).context("remove installed mod")?;
    }

    let unpacked = scratch.join("unpacked");
    extract_archive(&mut archive, &unpacked)?;
    let source_root = flatten_root(&unpacked)?;
    move_dir(&source_root, destination)?;
    Ok(())
}

fn extract_archive(archive: &mut zip::ZipArchive<File>, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).context("create unpack dir")?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).context("zip entry")?;
        let Some(out_path) = file.enclosed_name() else {
            continue;
        };

        let out_path = dest.join(out_path);
        if file.is_dir() {
            fs::create_dir_all(&out_path).context("create zip dir")?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).context("create zip dir")?;
        }

        let mut out_file = File::create(&out_path).context("write zip entry")?;
        io::copy(&mut file, &mut out_file).context("extract zip entry")?;
        if let Some(dt) = file.last_modified() {
            if let Some(mtime) = zip_time_to_unix(dt) {
                let mtime = FileTime::from_unix_time(mtime, 0);
                let _ = set_file_mtime(&out_path, mtime);
            }
        }
    }

    Ok(())
}

fn zip_time_to_unix(dt: zip::DateTime) -> Option<i64> {
    let month = Month::try_from(dt.month()).ok()?;
    let date = Date::from_calendar_date(dt.year() as i32, month, dt.day()).ok()?;
    let time = TimeOfDay::from_hms(dt.hour(), dt.minute(), dt.second()).ok()?;
    let datetime = PrimitiveDateTime::new(date, time).assume_utc();
    Some(datetime.unix_timestamp())
}

// Archives are published both bare and with a single wrapping folder; when
// the top level holds exactly one directory, its children become the mod.
fn flatten_root(unpacked: &Path) -> Result<PathBuf> {
    let mut entries: Vec<_> = fs::read_dir(unpacked)
        .context("list unpacked archive")?
        .filter_map(Result::ok)
        .collect();
    if entries.len() == 1 {
        let entry = entries.remove(0);
        if entry.path().is_dir() {
            return Ok(entry.path());
        }
    }
    Ok(unpacked.to_path_buf())
}

fn move_dir(source: &Path, dest: &Path) -> Result<()> {
    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }
    // Rename fails across filesystems; fall back to a copy. The source sits
    // in the scratch directory and is removed with it.
    copy_dir(source, dest)
}

fn copy_dir(source: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.context("walk unpacked archive")?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .context("relativize unpacked path")?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).context("create mod dir")?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).context("create mod dir")?;
            }
            fs::copy(entry.path(), &target).context("copy mod file")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, contents) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn unpacks_wrapped_archive_flattened() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("ExampleMod_3.zip");
        write_zip(
            &archive,
            &[
                ("ExampleMod_3/mod.lua", "minorVersion = 9\n"),
                ("ExampleMod_3/res/textures/grass.dds", "pixels"),
            ],
        );

        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        let dest = tmp.path().join("mods").join("ExampleMod");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();

        replace_with_archive(&archive, &scratch, &dest).unwrap();

        assert!(dest.join("mod.lua").exists());
        assert!(dest.join("res/textures/grass.dds").exists());
        assert!(!dest.join("ExampleMod_3").exists());
    }

    #[test]
    fn unpacks_bare_archive_as_is() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("bare.zip");
        write_zip(
            &archive,
            &[("mod.lua", "minorVersion = 1\n"), ("readme.txt", "hello")],
        );

        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        let dest = tmp.path().join("mods").join("Bare");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();

        replace_with_archive(&archive, &scratch, &dest).unwrap();

        assert!(dest.join("mod.lua").exists());
        assert!(dest.join("readme.txt").exists());
    }

    #[test]
    fn single_file_archive_is_not_flattened() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("single.zip");
        write_zip(&archive, &[("mod.lua", "minorVersion = 1\n")]);

        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();
        let dest = tmp.path().join("mods").join("Single");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();

        replace_with_archive(&archive, &scratch, &dest).unwrap();

        assert!(dest.join("mod.lua").exists());
    }

    #[test]
    fn stale_destination_is_fully_replaced() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("fresh.zip");
        write_zip(&archive, &[("Wrapped/mod.lua", "minorVersion = 2\n")]);

        let dest = tmp.path().join("mods").join("ExampleMod");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.lua"), "old content").unwrap();

        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();

        replace_with_archive(&archive, &scratch, &dest).unwrap();

        assert!(dest.join("mod.lua").exists());
        assert!(!dest.join("stale.lua").exists());
    }

    #[test]
    fn corrupt_archive_fails_without_touching_destination() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("broken.zip");
        fs::write(&archive, "this is not a zip").unwrap();

        let dest = tmp.path().join("mods").join("Kept");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("mod.lua"), "minorVersion = 1\n").unwrap();

        let scratch = tmp.path().join("scratch");
        fs::create_dir_all(&scratch).unwrap();

        assert!(replace_with_archive(&archive, &scratch, &dest).is_err());
        // The archive never opened, so the installed mod is untouched.
        assert!(dest.join("mod.lua").exists());
    }

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scratch-drop");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("partial.zip"), "bytes").unwrap();

        drop(ScratchDir { path: path.clone() });
        assert!(!path.exists());
    }

    #[test]
    fn missing_mod_root_fails_before_any_network_use() {
        let tmp = TempDir::new().unwrap();
        let installer = Installer::new(&tmp.path().join("not-configured"));
        let result = installer.install("ExampleMod_3.zip", "ExampleMod");
        assert!(matches!(result, Err(InstallError::ConfigurationMissing)));
    }

    #[test]
    fn copy_fallback_preserves_tree_shape() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source");
        fs::create_dir_all(source.join("res/models")).unwrap();
        fs::write(source.join("mod.lua"), "minorVersion = 3\n").unwrap();
        fs::write(source.join("res/models/depot.mdl"), "mesh").unwrap();

        let dest = tmp.path().join("dest");
        copy_dir(&source, &dest).unwrap();

        assert!(dest.join("mod.lua").exists());
        assert!(dest.join("res/models/depot.mdl").exists());
    }
}
