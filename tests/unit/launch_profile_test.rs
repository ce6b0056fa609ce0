//! External-facing launch profile scenarios not already covered by
//! `profile.rs`'s in-module tests: multi-profile files, malformed JSON, and
//! a full `Session::launch` picking up a profile's resolved environment.

#[path = "../helpers/mod.rs"]
mod helpers;

use dotnet_debugger_mcp::session::Session;
use std::collections::BTreeMap;
use std::fs;
use tempfile::tempdir;

fn write_launch_settings(dir: &std::path::Path, content: &str) {
    let props_dir = dir.join("Properties");
    fs::create_dir_all(&props_dir).unwrap();
    fs::write(props_dir.join("launchSettings.json"), content).unwrap();
}

#[test]
fn picks_the_requested_profile_out_of_several() {
    let dir = tempdir().unwrap();
    write_launch_settings(
        dir.path(),
        r#"{
            "profiles": {
                "http": {
                    "environmentVariables": { "ASPNETCORE_ENVIRONMENT": "Development" },
                    "applicationUrl": "http://localhost:5151"
                },
                "https": {
                    "environmentVariables": { "ASPNETCORE_ENVIRONMENT": "Production" },
                    "applicationUrl": "https://localhost:7179"
                }
            }
        }"#,
    );

    let profile = dotnet_debugger_mcp::profile::resolve_launch_profile(dir.path(), "https")
        .unwrap()
        .unwrap();
    assert_eq!(profile.name, "https");
    assert_eq!(
        profile.environment_variables.get("ASPNETCORE_ENVIRONMENT"),
        Some(&"Production".to_string())
    );
    assert_eq!(profile.ports(), vec![7179]);
}

#[test]
fn malformed_launch_settings_is_treated_as_absent() {
    let dir = tempdir().unwrap();
    write_launch_settings(dir.path(), "{not valid json");

    let profile = dotnet_debugger_mcp::profile::resolve_launch_profile(dir.path(), "http").unwrap();
    assert_eq!(profile, None);
}

#[tokio::test]
async fn session_launch_inherits_profile_environment_and_url() {
    helpers::install_fake_command_env();
    let dir = tempdir().unwrap();
    write_launch_settings(
        dir.path(),
        r#"{
            "profiles": {
                "api": {
                    "environmentVariables": { "ASPNETCORE_ENVIRONMENT": "Development" },
                    "applicationUrl": "http://localhost:5151"
                }
            }
        }"#,
    );

    let session = Session::new("profile-session".to_string());
    let (_, resolved_env) = session
        .launch(
            "/app/bin/Debug/net8.0/App.dll".to_string(),
            vec![],
            Some(dir.path().to_string_lossy().to_string()),
            false,
            BTreeMap::new(),
            Some("api".to_string()),
        )
        .await
        .expect("launch failed");

    assert_eq!(resolved_env.get("ASPNETCORE_ENVIRONMENT"), Some(&"Development".to_string()));
    assert_eq!(resolved_env.get("ASPNETCORE_URLS"), Some(&"http://localhost:5151".to_string()));
}
