mod catalog;
mod config;
mod install;
mod naming;
mod scan;
mod update;
mod version;

use anyhow::{bail, Result};
use config::AppConfig;
use std::path::PathBuf;
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

enum Command {
    Refresh,
    SetModFolder(PathBuf),
    Install(String),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let mut command = Command::Refresh;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mod-folder" | "-m" => {
                if let Some(path) = args.next() {
                    command = Command::SetModFolder(PathBuf::from(path));
                } else {
                    bail!("--mod-folder requires a path");
                }
            }
            "--install" | "-i" => {
                if let Some(name) = args.next() {
                    command = Command::Install(name);
                } else {
                    bail!("--install requires a mod base name");
                }
            }
            "--help" | "-h" => {
                println!("ModWerkstatt mod updater");
                println!("  (no arguments)          Refresh the catalog and list installed mods");
                println!("  --mod-folder <path>     Remember <path> as the local mod folder");
                println!("  --install <base-name>   Download and install the update for one mod");
                return Ok(());
            }
            other => bail!("unknown argument {other}"),
        }
    }

    let data_dir = config::default_data_dir()?;
    let mut config = AppConfig::load_or_create(&data_dir)?;

    match command {
        Command::SetModFolder(path) => {
            config.mod_folder = Some(path.clone());
            config.save(&data_dir)?;
            println!("Mod folder saved: {}", path.display());
            Ok(())
        }
        Command::Refresh => cmd_refresh(&config),
        Command::Install(base_name) => cmd_install(&config, &base_name),
    }
}

fn cmd_refresh(config: &AppConfig) -> Result<()> {
    if let Some(notice) = update::check_for_update(env!("CARGO_PKG_VERSION")) {
        println!(
            "A new release {} is available: {}",
            notice.version, notice.url
        );
    }

    let combined = refresh(config)?;
    if combined.is_empty() {
        println!("No installed mods matched the catalog.");
        return Ok(());
    }

    for entry in &combined {
        let marker = if entry.needs_update() {
            "update available"
        } else {
            "up to date"
        };
        println!(
            "{}  local {}  remote {}  created {}  changed {}  [{marker}]",
            entry.display_name(),
            entry.local_version,
            entry.remote_version,
            format_timestamp(entry.created).as_deref().unwrap_or("N/A"),
            format_timestamp(entry.changed).as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn cmd_install(config: &AppConfig, base_name: &str) -> Result<()> {
    let Some(mod_root) = config.mod_root() else {
        bail!("no mod folder configured; set one with --mod-folder");
    };

    let combined = refresh(config)?;
    let Some(entry) = combined.iter().find(|entry| entry.base_name == base_name) else {
        bail!("no installed mod matches {base_name}");
    };
    let Some(artifact) = entry.artifact_filename() else {
        bail!("catalog entry for {base_name} has no downloadable file");
    };
    if !entry.needs_update() {
        println!(
            "{base_name} is already up to date (local {}, remote {})",
            entry.local_version, entry.remote_version
        );
        return Ok(());
    }

    let installer = install::Installer::new(mod_root);
    match installer.install(artifact, base_name) {
        Ok(()) => {
            println!("Installed {base_name} {}", entry.remote_version);
            Ok(())
        }
        Err(err) => bail!("installing {base_name} failed: {err}"),
    }
}

// Fetch, scan, and join anew on every refresh; nothing is cached.
fn refresh(config: &AppConfig) -> Result<Vec<catalog::ReconciledMod>> {
    let remote = catalog::fetch_catalog()?;
    let local = match config.mod_root() {
        Some(root) => scan::scan_local_mods(root),
        None => {
            warn!("no mod folder configured; set one with --mod-folder");
            Vec::new()
        }
    };
    Ok(catalog::reconcile(remote, &local))
}

fn format_timestamp(stamp: i64) -> Option<String> {
    if stamp == 0 {
        return None;
    }
    let datetime = OffsetDateTime::from_unix_timestamp(stamp).ok()?;
    datetime.format(TIMESTAMP_FORMAT).ok()
}
