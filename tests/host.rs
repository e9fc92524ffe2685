//! End-to-end runs against the real git binary through the loopback bridge.
//! Skipped when git is not installed.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::FakePicker;
use gitbridge_core::git::*;
use gitbridge_core::host::{loopback, NativeGitHost};
use gitbridge_core::repository::RepositoryFacade;
use gitbridge_core::GitBridgeConfig;

fn git_available() -> bool {
    if which::which("git").is_ok() {
        true
    } else {
        eprintln!("git not found on PATH, skipping");
        false
    }
}

fn native_facade(dir: &Path) -> RepositoryFacade {
    let host = Arc::new(NativeGitHost::new(dir));
    let context = HostContext::default().with_native(loopback::connect(host));
    let dispatcher = GitDispatcher::new(context, &GitBridgeConfig::default())
        .ok()
        .unwrap();
    RepositoryFacade::new(
        Arc::new(dispatcher),
        FakePicker::choosing(&dir.to_string_lossy()),
    )
}

#[tokio::test]
async fn test_open_folder_init_and_commit() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let facade = native_facade(tmp.path());

    let opened = facade.open_folder().await;
    assert!(opened.success, "{:?}", opened.message);
    assert!(opened.data.is_none());

    let init = facade.init_repository().await;
    assert!(init.success, "{:?}", init.message);
    let repo = facade.current_repository().expect("repository");
    assert_eq!(
        Path::new(&repo.path).canonicalize().unwrap(),
        tmp.path().canonicalize().unwrap()
    );

    fs::write(tmp.path().join("README.md"), "hello\n").unwrap();
    let d = facade.dispatcher();
    let status = d.status(None).await.unwrap();
    assert_eq!(status.kind_of("README.md"), Some(StatusKind::Untracked));

    d.add(&["README.md".to_string()], None).await.unwrap();
    let status = d.status(None).await.unwrap();
    assert_eq!(status.kind_of("README.md"), Some(StatusKind::Added));

    let oid = d
        .commit("Initial commit\n\nWith a body", None, &CommitOptions::default())
        .await
        .unwrap();
    assert_eq!(oid.len(), 40);

    let log = d.log(None, &LogOptions::default()).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].id, oid);
    assert_eq!(log[0].message, "Initial commit\n\nWith a body");
    assert_eq!(log[0].author, "GitBridge User");
    assert_eq!(log[0].email, "user@gitbridge.local");

    let branches = d.list_branches(None).await.unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name, "main");
    assert!(branches[0].current);
    assert_eq!(branches[0].commit, oid);

    let status = facade.refresh_status().await;
    assert!(status.success);
    assert!(status.data.unwrap().is_clean());
}

#[tokio::test]
async fn test_native_only_operations() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let facade = native_facade(tmp.path());
    assert!(facade.open_folder().await.success);
    assert!(facade.init_repository().await.success);
    let d = facade.dispatcher();

    fs::write(tmp.path().join("a.txt"), "one\n").unwrap();
    d.add(&["a.txt".to_string()], None).await.unwrap();
    let first = d.commit("first", None, &CommitOptions::default()).await.unwrap();

    // tags
    d.create_tag("v1.0", None, &TagOptions::default()).await.unwrap();
    let tags = d.list_tags(None).await.unwrap();
    assert_eq!(tags, vec![TagInfo { name: "v1.0".into(), commit: first.clone() }]);

    // diff + stash
    fs::write(tmp.path().join("a.txt"), "two\n").unwrap();
    let diff = d.diff(None, &DiffOptions::default()).await.unwrap();
    assert!(diff.contains("+two"));

    d.stash_save(None, &StashOptions { message: Some("wip".into()), include_untracked: false })
        .await
        .unwrap();
    let stashes = d.stash_list(None).await.unwrap();
    assert_eq!(stashes.len(), 1);
    assert!(stashes[0].message.contains("wip"));
    assert!(d.status(None).await.unwrap().is_clean());
    d.stash_pop(None, None).await.unwrap();
    assert_eq!(
        d.status(None).await.unwrap().kind_of("a.txt"),
        Some(StatusKind::Modified)
    );

    // show
    let shown = d.show(&first, None).await.unwrap();
    assert_eq!(shown.commit.id, first);
    assert!(shown.diff.contains("a.txt"));

    // remotes
    d.add_remote("origin", "https://github.com/org/repo.git", None).await.unwrap();
    d.rename_remote("origin", "upstream", None).await.unwrap();
    let remotes = d.list_remotes(None).await.unwrap();
    assert_eq!(remotes.len(), 1);
    assert_eq!(remotes[0].name, "upstream");

    // clean dry run
    fs::write(tmp.path().join("junk.tmp"), "x").unwrap();
    let cleaned = d
        .clean(None, &CleanOptions { dry_run: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(cleaned, vec!["junk.tmp".to_string()]);
    assert!(tmp.path().join("junk.tmp").exists());

    let info = d.get_repository_info(None).await.unwrap();
    assert_eq!(info.current_branch.as_deref(), Some("main"));
    assert_eq!(info.head.as_deref(), Some(first.as_str()));
    assert!(!info.is_clean);
}

#[tokio::test]
async fn test_merge_conflict_is_reported_structurally() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let facade = native_facade(tmp.path());
    assert!(facade.open_folder().await.success);
    assert!(facade.init_repository().await.success);
    let d = facade.dispatcher();

    fs::write(tmp.path().join("f.txt"), "base\n").unwrap();
    d.add(&["f.txt".to_string()], None).await.unwrap();
    d.commit("base", None, &CommitOptions::default()).await.unwrap();

    d.create_branch("other", None, &BranchOptions { start_point: None, checkout: true })
        .await
        .unwrap();
    fs::write(tmp.path().join("f.txt"), "theirs\n").unwrap();
    d.add(&["f.txt".to_string()], None).await.unwrap();
    d.commit("theirs", None, &CommitOptions::default()).await.unwrap();

    d.checkout("main", None).await.unwrap();
    fs::write(tmp.path().join("f.txt"), "ours\n").unwrap();
    d.add(&["f.txt".to_string()], None).await.unwrap();
    d.commit("ours", None, &CommitOptions::default()).await.unwrap();

    let result = d.merge("other", None, &MergeOptions::default()).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.conflicts, vec!["f.txt".to_string()]);
}

#[tokio::test]
async fn test_errors_carry_operation_context() {
    if !git_available() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let facade = native_facade(tmp.path());
    assert!(facade.open_folder().await.success);

    let err = facade.dispatcher().status(None).await.unwrap_err();
    assert!(err.to_string().starts_with("Failed to get status: Not a git repository"));
    assert_eq!(err.code(), "git_error");

    let result = facade.fetch_repository(&RemoteOptions::default()).await;
    assert!(!result.success);
}
