use crate::catalog::USER_AGENT;
use crate::version;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const RELEASES_URL: &str = "https://api.github.com/repos/ModWerkstatt/modloader/releases/latest";

#[derive(Debug, Clone)]
pub struct UpdateNotice {
    pub version: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    html_url: String,
}

// A failed check is not an error, the notice is simply absent.
pub fn check_for_update(current_version: &str) -> Option<UpdateNotice> {
    let release = match fetch_latest_release() {
        Ok(release) => release,
        Err(err) => {
            debug!("release check failed: {err:#}");
            return None;
        }
    };

    if !version::is_newer_release(&release.tag_name, current_version) {
        return None;
    }

    Some(UpdateNotice {
        version: release.tag_name.trim_start_matches('v').to_string(),
        url: release.html_url,
    })
}

fn fetch_latest_release() -> Result<Release> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .timeout_read(Duration::from_secs(10))
        .timeout_write(Duration::from_secs(10))
        .build();
    let response = agent
        .get(RELEASES_URL)
        .set("User-Agent", USER_AGENT)
        .call()
        .context("fetch latest release")?;
    let release: Release = response.into_json().context("decode release")?;
    Ok(release)
}
