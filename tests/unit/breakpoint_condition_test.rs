//! Exercises `Session`'s per-file breakpoint/condition bookkeeping end to
//! end against the fake DAP adapter: setting, updating, and removing
//! conditional breakpoints, and replaying the full per-file set on change.

#[path = "../helpers/mod.rs"]
mod helpers;

use dotnet_debugger_mcp::session::Session;
use std::collections::BTreeMap;

async fn launched_session(id: &str) -> Session {
    helpers::install_fake_command_env();
    let session = Session::new(id.to_string());
    session
        .launch(
            "/app/bin/Debug/net8.0/App.dll".to_string(),
            vec![],
            None,
            false,
            BTreeMap::new(),
            None,
        )
        .await
        .expect("launch failed");
    session
}

#[tokio::test]
async fn set_breakpoint_with_condition_is_echoed_back() {
    let session = launched_session("cond-basic").await;

    let bp = session
        .set_breakpoint("/src/Program.cs", 10, Some("x > 5".to_string()))
        .await
        .expect("set_breakpoint failed");

    assert_eq!(bp.line, 10);
    assert!(bp.verified);
    assert_eq!(bp.condition.as_deref(), Some("x > 5"));
}

#[tokio::test]
async fn two_breakpoints_in_same_file_both_survive_replay() {
    let session = launched_session("cond-multi").await;

    session
        .set_breakpoint("/src/Program.cs", 10, Some("x > 5".to_string()))
        .await
        .expect("first set_breakpoint failed");
    session
        .set_breakpoint("/src/Program.cs", 20, None)
        .await
        .expect("second set_breakpoint failed");

    let mut breakpoints = session.list_breakpoints().await;
    breakpoints.sort_by_key(|bp| bp.line);

    assert_eq!(breakpoints.len(), 2);
    assert_eq!(breakpoints[0].line, 10);
    assert_eq!(breakpoints[0].condition.as_deref(), Some("x > 5"));
    assert_eq!(breakpoints[1].line, 20);
    assert_eq!(breakpoints[1].condition, None);
}

#[tokio::test]
async fn removing_a_breakpoint_drops_only_that_line() {
    let session = launched_session("cond-remove").await;

    session.set_breakpoint("/src/Program.cs", 10, None).await.unwrap();
    session.set_breakpoint("/src/Program.cs", 20, None).await.unwrap();

    session.remove_breakpoint("/src/Program.cs", 10).await.expect("remove_breakpoint failed");

    let breakpoints = session.list_breakpoints().await;
    assert_eq!(breakpoints.len(), 1);
    assert_eq!(breakpoints[0].line, 20);
}

#[tokio::test]
async fn removing_an_unset_breakpoint_errors() {
    let session = launched_session("cond-remove-missing").await;
    session.set_breakpoint("/src/Program.cs", 10, None).await.unwrap();

    let err = session.remove_breakpoint("/src/Program.cs", 99).await.unwrap_err();
    assert!(matches!(err, dotnet_debugger_mcp::Error::InvalidRequest(_)));
}

#[tokio::test]
async fn re_setting_a_breakpoint_updates_its_condition_without_duplicating() {
    let session = launched_session("cond-update").await;

    session.set_breakpoint("/src/Program.cs", 10, Some("x > 5".to_string())).await.unwrap();
    let updated = session
        .set_breakpoint("/src/Program.cs", 10, Some("x > 10".to_string()))
        .await
        .expect("re-set_breakpoint failed");

    assert_eq!(updated.condition.as_deref(), Some("x > 10"));
    let breakpoints = session.list_breakpoints().await;
    assert_eq!(breakpoints.len(), 1);
}

#[tokio::test]
async fn breakpoints_in_different_files_are_tracked_independently() {
    let session = launched_session("cond-files").await;

    session.set_breakpoint("/src/A.cs", 1, None).await.unwrap();
    session.set_breakpoint("/src/B.cs", 2, Some("y == 0".to_string())).await.unwrap();

    let mut breakpoints = session.list_breakpoints().await;
    breakpoints.sort_by_key(|bp| bp.line);
    assert_eq!(breakpoints.len(), 2);
    assert_eq!(breakpoints[0].condition, None);
    assert_eq!(breakpoints[1].condition.as_deref(), Some("y == 0"));
}
