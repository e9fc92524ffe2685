mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{FakeEngine, FakePicker};
use gitbridge_core::git::{GitDispatcher, HostContext, RemoteOptions};
use gitbridge_core::repository::{RepositoryDescriptor, RepositoryFacade};
use gitbridge_core::GitBridgeConfig;

fn facade_with(engine: Arc<FakeEngine>, picker: Arc<FakePicker>) -> RepositoryFacade {
    let host = HostContext::default()
        .with_browser_globals(true)
        .with_browser_engine(engine);
    let dispatcher = GitDispatcher::new(host, &GitBridgeConfig::default())
        .ok()
        .unwrap();
    RepositoryFacade::new(Arc::new(dispatcher), picker)
}

/// Collects every notification.
fn record(facade: &RepositoryFacade) -> Arc<Mutex<Vec<Option<RepositoryDescriptor>>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _subscription = facade.on_repository_change(move |repo| {
        sink.lock().unwrap().push(repo.cloned());
    });
    seen
}

#[tokio::test]
async fn test_clone_success_notifies_once() {
    let engine = FakeEngine::new();
    let facade = facade_with(engine.clone(), FakePicker::cancelled());
    let seen = record(&facade);

    let result = facade
        .clone_repository("https://github.com/org/repo.git")
        .await;
    assert!(result.success, "{:?}", result.message);
    assert_eq!(result.message.as_deref(), Some("Repository cloned successfully"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let repo = seen[0].clone().expect("descriptor");
    assert!(repo.is_repository);
    assert_eq!(repo.path, "/");
    assert_eq!(facade.current_repository(), Some(repo.clone()));
    assert_eq!(result.data, Some(repo));

    let clone = engine.state.lock().unwrap().last_clone.clone().unwrap();
    assert_eq!(clone.cors_proxy, "https://cors.isomorphic-git.org");
    assert_eq!(clone.dir, "/");
}

#[tokio::test]
async fn test_clone_failure_reports_and_keeps_state() {
    let engine = FakeEngine::new();
    engine.fail("clone_repo", "HTTP Error: 401 Unauthorized");
    let facade = facade_with(engine, FakePicker::cancelled());
    let seen = record(&facade);

    let result = facade
        .clone_repository("https://github.com/org/private.git")
        .await;
    assert!(!result.success);
    assert_eq!(
        result.message.as_deref(),
        Some("Failed to clone repository: HTTP Error: 401 Unauthorized")
    );
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(facade.current_repository(), None);
}

#[tokio::test]
async fn test_clone_requires_url() {
    let engine = FakeEngine::new();
    let facade = facade_with(engine.clone(), FakePicker::cancelled());
    let result = facade.clone_repository("   ").await;
    assert!(!result.success);
    assert_eq!(result.message.as_deref(), Some("Repository URL is required"));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_open_folder_then_init() {
    let engine = FakeEngine::new();
    let facade = facade_with(engine, FakePicker::choosing("/projects/demo"));
    let seen = record(&facade);

    let opened = facade.open_folder().await;
    assert!(opened.success);
    assert!(opened.data.is_none(), "not a repository yet");
    assert_eq!(facade.current_repository(), None);

    let init = facade.init_repository().await;
    assert!(init.success);
    let repo = facade.current_repository().expect("repository after init");
    assert!(repo.is_repository);
    assert_eq!(repo.path, "/projects/demo");
    assert_eq!(repo.name, "demo");
    assert_eq!(init.data, Some(repo.clone()));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], None);
    assert_eq!(seen[1], Some(repo));
}

#[tokio::test]
async fn test_open_folder_on_existing_repository() {
    let engine = FakeEngine::with_repo("/projects/demo");
    let facade = facade_with(engine.clone(), FakePicker::choosing("/projects/demo"));

    let opened = facade.open_folder().await;
    assert!(opened.success);
    let repo = opened.data.expect("opened folder is a repository");
    assert_eq!(repo.path, "/projects/demo");
    assert_eq!(repo.name, "demo");
    assert_eq!(facade.current_repository(), Some(repo));

    // 之后的隐式目录操作落在打开的文件夹里
    facade.init_repository().await;
    assert!(engine.state.lock().unwrap().repos.contains("/projects/demo"));
    assert!(!engine.state.lock().unwrap().repos.contains("/"));
}

#[tokio::test]
async fn test_open_folder_cancelled() {
    let facade = facade_with(FakeEngine::new(), FakePicker::cancelled());
    let seen = record(&facade);

    let opened = facade.open_folder().await;
    assert!(!opened.success);
    assert_eq!(opened.message.as_deref(), Some("Folder selection cancelled"));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_checks_are_coalesced() {
    let engine = FakeEngine::with_repo("/");
    engine.state.lock().unwrap().find_root_delay = Some(Duration::from_millis(50));
    let facade = facade_with(engine.clone(), FakePicker::cancelled());

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let _sub = facade.on_repository_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // 第一个调用开始检测，后两个共享其后的一次补充检测
    let (a, b, c) = tokio::join!(
        facade.check_repository(),
        facade.check_repository(),
        facade.check_repository()
    );
    assert!(a.is_some());
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(fired.load(Ordering::SeqCst), 2);
    assert_eq!(engine.calls(), vec!["find_root", "find_root"]);

    // 结束后的调用重新检测
    facade.check_repository().await;
    assert_eq!(fired.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_clone_during_refresh_sees_new_repository() {
    let engine = FakeEngine::new();
    engine.state.lock().unwrap().find_root_delay = Some(Duration::from_millis(50));
    let facade = facade_with(engine.clone(), FakePicker::cancelled());

    let background = facade.clone();
    let refresh = tokio::spawn(async move { background.check_repository().await });
    // 让后台检测先取样（此时还没有仓库）
    tokio::task::yield_now().await;
    assert_eq!(engine.calls(), vec!["find_root"]);

    let cloned = facade
        .clone_repository("https://github.com/org/repo.git")
        .await;
    assert!(cloned.success);
    let repo = cloned.data.expect("descriptor derived after the clone");
    assert_eq!(repo.path, "/");
    assert_eq!(facade.current_repository(), Some(repo));

    // 早先的检测按其取样时刻给出结果
    assert_eq!(refresh.await.unwrap(), None);
    assert_eq!(engine.calls(), vec!["find_root", "clone_repo", "find_root"]);
}

#[tokio::test]
async fn test_unsubscribe_stops_notifications() {
    let facade = facade_with(FakeEngine::with_repo("/"), FakePicker::cancelled());
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let sub = facade.on_repository_change(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(facade.listener_count(), 1);

    facade.check_repository().await;
    sub.unsubscribe();
    facade.check_repository().await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(facade.listener_count(), 0);
}

#[tokio::test]
async fn test_no_replay_on_subscribe() {
    let facade = facade_with(FakeEngine::with_repo("/"), FakePicker::cancelled());
    facade.check_repository().await;
    assert!(facade.current_repository().is_some());

    let seen = record(&facade);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_remote_workflows_and_status() {
    let engine = FakeEngine::with_repo("/");
    let facade = facade_with(engine.clone(), FakePicker::cancelled());
    let seen = record(&facade);

    let fetched = facade.fetch_repository(&RemoteOptions::default()).await;
    assert!(fetched.success);
    assert_eq!(fetched.message.as_deref(), Some("Fetched from origin"));
    assert!(seen.lock().unwrap().is_empty(), "fetch does not re-check");

    let pulled = facade.pull_repository(&RemoteOptions::default()).await;
    assert!(pulled.success);
    assert_eq!(seen.lock().unwrap().len(), 1);

    engine.fail("push", "rejected: non-fast-forward");
    let pushed = facade.push_repository(&RemoteOptions::default()).await;
    assert!(!pushed.success);
    assert_eq!(
        pushed.message.as_deref(),
        Some("Failed to push: rejected: non-fast-forward")
    );

    let status = facade.refresh_status().await;
    assert!(status.success);
    assert_eq!(status.message.as_deref(), Some("Working tree clean"));
    assert!(status.data.unwrap().is_clean());
}

#[tokio::test]
async fn test_refresh_status_outside_repository() {
    let facade = facade_with(FakeEngine::new(), FakePicker::cancelled());
    let status = facade.refresh_status().await;
    assert!(!status.success);
    assert_eq!(status.message.as_deref(), Some("Not a git repository"));
}

#[test]
fn test_url_validation() {
    let facade = facade_with(FakeEngine::new(), FakePicker::cancelled());
    assert!(facade.is_valid_git_url("https://github.com/org/repo.git"));
    assert!(facade.is_valid_git_url("git@gitlab.com:org/repo.git"));
    assert!(!facade.is_valid_git_url("not-a-url"));
    assert!(!facade.is_valid_git_url("ftp://example.com/repo"));
    assert!(!facade.is_valid_git_url(""));
}
