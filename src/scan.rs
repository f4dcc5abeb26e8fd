use regex::Regex;
use std::{
    fs,
    path::Path,
    sync::OnceLock,
};
use tracing::{debug, warn};

pub const METADATA_FILE: &str = "mod.lua";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMod {
    pub folder_name: String,
    pub version: String,
}

fn minor_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)minorversion\s*=\s*(\d+)").expect("minor version pattern"))
}

pub fn scan_local_mods(root: &Path) -> Vec<LocalMod> {
    let mut mods = Vec::new();

    if !root.exists() {
        warn!("mod folder {} does not exist", root.display());
        return mods;
    }
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("cannot read mod folder {}: {err}", root.display());
            return mods;
        }
    };

    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let metadata_path = path.join(METADATA_FILE);
        if !metadata_path.exists() {
            continue;
        }

        let folder_name = entry.file_name().to_string_lossy().into_owned();
        // Major version is any trailing digit run on the raw folder name, a
        // looser rule than the `_<digits>` suffix split used for matching.
        let Some(major) = trailing_digits(&folder_name) else {
            debug!("skipping {folder_name}: no trailing version digits");
            continue;
        };
        let Some(minor) = read_minor_version(&metadata_path) else {
            debug!("skipping {folder_name}: no minorVersion in {METADATA_FILE}");
            continue;
        };

        mods.push(LocalMod {
            folder_name,
            version: format!("{major}.{minor}"),
        });
    }

    mods
}

fn trailing_digits(name: &str) -> Option<u64> {
    let digits_start = name
        .as_bytes()
        .iter()
        .rposition(|b| !b.is_ascii_digit())
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let digits = &name[digits_start..];
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok()
}

// First matching line wins, the rest of the file is never read.
fn read_minor_version(path: &Path) -> Option<u64> {
    let contents = fs::read_to_string(path).ok()?;
    for line in contents.lines() {
        if let Some(captures) = minor_version_pattern().captures(line) {
            return captures[1].parse::<u64>().ok();
        }
    }
    None
}
