use crate::naming::split_suffix;
use crate::scan::LocalMod;
use crate::version;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};
use tracing::debug;

pub const CATALOG_URL: &str = "https://modwerkstatt.com/tpfmm";
pub const DOWNLOAD_BASE: &str = "https://modwerkstatt.com/download";
pub const USER_AGENT: &str = "ModWerkstatt";

#[derive(Debug, Deserialize)]
struct Catalog {
    mods: Vec<RemoteMod>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteMod {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub timecreated: Option<i64>,
    #[serde(default)]
    pub timechanged: Option<i64>,
    #[serde(default)]
    pub files: Vec<RemoteFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    #[serde(default)]
    pub foldername: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReconciledMod {
    pub remote: RemoteMod,
    pub base_name: String,
    pub local_version: String,
    pub remote_version: String,
    pub created: i64,
    pub changed: i64,
}

impl ReconciledMod {
    pub fn display_name(&self) -> &str {
        self.remote.name.as_deref().unwrap_or("N/A")
    }

    pub fn artifact_filename(&self) -> Option<&str> {
        self.remote.files.first()?.filename.as_deref()
    }

    pub fn needs_update(&self) -> bool {
        version::needs_update(&self.local_version, &self.remote_version)
    }
}

pub fn fetch_catalog() -> Result<Vec<RemoteMod>> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .timeout_read(Duration::from_secs(10))
        .timeout_write(Duration::from_secs(10))
        .build();
    let response = agent
        .get(CATALOG_URL)
        .set("User-Agent", USER_AGENT)
        .call()
        .context("fetch mod catalog")?;
    let catalog: Catalog = response.into_json().context("decode mod catalog")?;
    Ok(catalog.mods)
}

// Join the catalog against the local inventory by stripped base name. Only
// mods that are installed locally survive; everything else is dropped.
pub fn reconcile(remote_mods: Vec<RemoteMod>, local_mods: &[LocalMod]) -> Vec<ReconciledMod> {
    let mut local_versions: HashMap<String, String> = HashMap::new();
    for record in local_mods {
        let (base_name, _) = split_suffix(&record.folder_name);
        // Later folders with the same base name overwrite earlier ones.
        local_versions.insert(base_name.to_string(), record.version.clone());
    }

    let mut combined = Vec::new();
    for entry in remote_mods {
        let Some(folder_fullname) = entry
            .files
            .first()
            .and_then(|file| file.foldername.as_deref())
        else {
            debug!("catalog entry {:?} has no file folder name", entry.name);
            continue;
        };
        let (base_name, _) = split_suffix(folder_fullname);
        let Some(local_version) = local_versions.get(base_name) else {
            continue;
        };

        let base_name = base_name.to_string();
        combined.push(ReconciledMod {
            base_name,
            local_version: local_version.clone(),
            remote_version: entry.version.clone().unwrap_or_else(|| "N/A".to_string()),
            created: entry.timecreated.unwrap_or(0),
            changed: entry.timechanged.unwrap_or(0),
            remote: entry,
        });
    }

    combined
}
