use std::cmp::Ordering;
use tracing::warn;

pub fn parse_dotted(raw: &str) -> Option<Vec<u64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

// Numeric per component, missing components count as zero ("1.2" == "1.2.0").
fn compare(left: &[u64], right: &[u64]) -> Ordering {
    let len = left.len().max(right.len());
    for idx in 0..len {
        let a = left.get(idx).copied().unwrap_or(0);
        let b = right.get(idx).copied().unwrap_or(0);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

pub fn needs_update(local_version: &str, remote_version: &str) -> bool {
    let remote_version = if remote_version.trim().is_empty() {
        "0.0"
    } else {
        remote_version
    };
    match (parse_dotted(local_version), parse_dotted(remote_version)) {
        (Some(local), Some(remote)) => compare(&remote, &local) == Ordering::Greater,
        _ => {
            warn!("cannot compare versions {local_version:?} and {remote_version:?}, treating as up to date");
            false
        }
    }
}

pub fn is_newer_release(tag: &str, current_version: &str) -> bool {
    let tag = tag.trim_start_matches('v');
    match (parse_dotted(tag), parse_dotted(current_version)) {
        (Some(latest), Some(current)) => compare(&latest, &current) == Ordering::Greater,
        _ => false,
    }
}
