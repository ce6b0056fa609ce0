//! Launch profile resolution: reads `Properties/launchSettings.json` the way
//! `dotnet run`/`dotnet watch` does, so launched sessions inherit the same
//! environment variables and URLs a developer running from the CLI would get.

use crate::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const MAX_WALK_UP: usize = 5;
const LAUNCH_SETTINGS_RELATIVE_PATH: &str = "Properties/launchSettings.json";

#[derive(Debug, Deserialize)]
struct LaunchSettings {
    #[serde(default)]
    profiles: BTreeMap<String, LaunchProfileRaw>,
}

#[derive(Debug, Deserialize)]
struct LaunchProfileRaw {
    #[serde(default, rename = "environmentVariables")]
    environment_variables: BTreeMap<String, String>,
    #[serde(default, rename = "applicationUrl")]
    application_url: Option<String>,
}

/// A single resolved profile from `launchSettings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchProfile {
    pub name: String,
    pub environment_variables: BTreeMap<String, String>,
    pub application_url: Option<String>,
}

impl LaunchProfile {
    /// Ports parsed out of `applicationUrl`'s semicolon-delimited URL list.
    pub fn ports(&self) -> Vec<u16> {
        let Some(url) = &self.application_url else {
            return Vec::new();
        };
        url.split(';')
            .filter_map(|part| {
                let part = part.trim();
                let after_scheme = part.split("://").nth(1)?;
                let host_port = after_scheme.split('/').next()?;
                let port_str = host_port.rsplit(':').next()?;
                port_str.parse::<u16>().ok()
            })
            .collect()
    }
}

/// Walks up from `start_dir` (inclusive) looking for
/// `Properties/launchSettings.json`, stopping after [`MAX_WALK_UP`]
/// ancestor directories if nothing is found.
pub fn find_launch_settings(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = Some(start_dir);
    for _ in 0..=MAX_WALK_UP {
        let candidate = dir?.join(LAUNCH_SETTINGS_RELATIVE_PATH);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = dir.and_then(Path::parent);
    }
    None
}

/// Reads and parses a named profile out of `launchSettings.json`. Returns
/// `Ok(None)` if the file exists but the named profile is absent, and also
/// if the file's contents are not valid JSON — a malformed launch profile is
/// treated the same as a missing one rather than failing the launch.
pub fn read_launch_profile(
    launch_settings_path: &Path,
    profile_name: &str,
) -> Result<Option<LaunchProfile>> {
    let content = std::fs::read_to_string(launch_settings_path)?;
    let settings: LaunchSettings = match serde_json::from_str(&content) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(
                path = %launch_settings_path.display(),
                error = %e,
                "malformed launchSettings.json, treating as absent"
            );
            return Ok(None);
        }
    };

    Ok(settings.profiles.get(profile_name).map(|raw| LaunchProfile {
        name: profile_name.to_string(),
        environment_variables: raw.environment_variables.clone(),
        application_url: raw.application_url.clone(),
    }))
}

/// Convenience wrapper combining [`find_launch_settings`] and
/// [`read_launch_profile`] starting from a project directory.
pub fn resolve_launch_profile(
    project_dir: &Path,
    profile_name: &str,
) -> Result<Option<LaunchProfile>> {
    match find_launch_settings(project_dir) {
        Some(path) => read_launch_profile(&path, profile_name),
        None => Ok(None),
    }
}
