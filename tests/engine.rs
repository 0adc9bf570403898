// ABOUTME: Integration tests for engine orchestration.
// ABOUTME: Per-name serialization, persisted state across restarts, lock files, and apply.

use productionapp::diagnostics::{Diagnostics, WarningKind};
use productionapp::engine::{DeployLock, Engine, EngineError, LockError, LockInfo, plan_apply};
use productionapp::platform::{MemoryPlatform, PlatformError};
use productionapp::resource::{Action, DeploymentArgs, DeploymentSpec, ResourceErrorKind};
use productionapp::store::{FileStateStore, MemoryStateStore, StateStore};
use productionapp::types::DeploymentName;
use std::sync::Arc;
use std::time::Duration;

fn name(s: &str) -> DeploymentName {
    DeploymentName::new(s).unwrap()
}

fn spec(n: &str, image: &str) -> DeploymentSpec {
    DeploymentSpec::from_args(n, &DeploymentArgs::new(image, 80)).unwrap()
}

fn memory_engine(platform: &Arc<MemoryPlatform>) -> (MemoryStateStore, Engine) {
    let store = MemoryStateStore::new();
    let engine = Engine::new(platform.clone(), Arc::new(store.clone()));
    (store, engine)
}

mod serialization {
    use super::*;

    #[tokio::test]
    async fn concurrent_ups_for_one_name_create_once() {
        let platform = Arc::new(MemoryPlatform::new().with_latency(Duration::from_millis(20)));
        let (_, engine) = memory_engine(&platform);
        let engine = Arc::new(engine);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    let mut diag = Diagnostics::default();
                    engine
                        .up("web", &DeploymentArgs::new("nginx", 80), &mut diag)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut outcomes = Vec::new();
        for task in tasks {
            outcomes.push(task.await.unwrap());
        }

        assert_eq!(platform.create_calls(), 1);
        assert_eq!(platform.update_calls(), 0);
        assert_eq!(platform.live_count(&name("web")), 1);
        assert_eq!(
            outcomes.iter().filter(|o| o.action == Action::Create).count(),
            1
        );
        let urls: Vec<_> = outcomes
            .iter()
            .map(|o| o.state.as_ref().unwrap().url.clone())
            .collect();
        assert!(urls.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn different_names_do_not_block_each_other() {
        let platform = Arc::new(MemoryPlatform::new().with_latency(Duration::from_millis(20)));
        let (_, engine) = memory_engine(&platform);
        let engine = Arc::new(engine);

        let tasks: Vec<_> = ["alpha", "beta", "gamma"]
            .into_iter()
            .map(|n| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    let mut diag = Diagnostics::default();
                    engine
                        .up(n, &DeploymentArgs::new("nginx", 80), &mut diag)
                        .await
                        .unwrap()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(platform.create_calls(), 3);
        assert_eq!(platform.workloads().len(), 3);
    }

    #[tokio::test]
    async fn cancelled_up_keeps_record_and_next_run_adopts() {
        let platform = Arc::new(MemoryPlatform::new());
        let (store, engine) = memory_engine(&platform);
        let mut diag = Diagnostics::default();

        let first = engine
            .up("web", &DeploymentArgs::new("nginx:1", 80), &mut diag)
            .await
            .unwrap();

        let slow = Arc::new(MemoryPlatform::new().with_latency(Duration::from_millis(200)));
        let slow_engine = Engine::new(slow.clone(), Arc::new(store.clone()));
        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            slow_engine.up("web", &DeploymentArgs::new("nginx:2", 80), &mut diag),
        )
        .await;
        assert!(cancelled.is_err());

        // Record still describes the first successful run
        let stored = store.load(&name("web")).await.unwrap().unwrap();
        assert_eq!(Some(stored), first.state);
    }
}

mod persistence {
    use super::*;

    #[tokio::test]
    async fn state_survives_engine_restart() {
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(MemoryPlatform::new());
        let mut diag = Diagnostics::default();

        let first = Engine::new(platform.clone(), Arc::new(FileStateStore::new(dir.path())))
            .with_lock_dir(dir.path())
            .up("web", &DeploymentArgs::new("nginx", 80), &mut diag)
            .await
            .unwrap();

        let second = Engine::new(platform.clone(), Arc::new(FileStateStore::new(dir.path())))
            .with_lock_dir(dir.path())
            .up("web", &DeploymentArgs::new("nginx", 80), &mut diag)
            .await
            .unwrap();

        assert_eq!(first.action, Action::Create);
        assert_eq!(second.action, Action::NoOp);
        assert_eq!(second.state, first.state);
        assert_eq!(platform.create_calls(), 1);
        assert!(!dir.path().join("web.lock").exists());
        assert!(!diag.has_warnings());
    }

    #[tokio::test]
    async fn failed_update_keeps_previous_record() {
        let platform = Arc::new(MemoryPlatform::new());
        let (store, engine) = memory_engine(&platform);
        let mut diag = Diagnostics::default();

        let first = engine
            .up("web", &DeploymentArgs::new("nginx:1", 80), &mut diag)
            .await
            .unwrap();
        platform.fail_next_update(PlatformError::Rejected("insufficient capacity".to_string()));

        let err = engine
            .up("web", &DeploymentArgs::new("nginx:2", 80), &mut diag)
            .await
            .unwrap_err();
        assert_eq!(err.resource_kind(), Some(ResourceErrorKind::Provision));
        assert_eq!(store.load(&name("web")).await.unwrap(), first.state);
    }

    #[tokio::test]
    async fn destroy_forgets_record_and_workload() {
        let platform = Arc::new(MemoryPlatform::new());
        let (store, engine) = memory_engine(&platform);
        let mut diag = Diagnostics::default();

        engine
            .up("web", &DeploymentArgs::new("nginx", 80), &mut diag)
            .await
            .unwrap();
        let outcome = engine.destroy("web", &mut diag).await.unwrap();

        assert_eq!(outcome.action, Action::Delete);
        assert!(outcome.state.is_none());
        assert!(store.load(&name("web")).await.unwrap().is_none());
        assert!(platform.workloads().is_empty());
    }

    #[tokio::test]
    async fn failed_destroy_keeps_record() {
        let platform = Arc::new(MemoryPlatform::new());
        let (store, engine) = memory_engine(&platform);
        let mut diag = Diagnostics::default();

        engine
            .up("web", &DeploymentArgs::new("nginx", 80), &mut diag)
            .await
            .unwrap();
        platform.fail_next_delete(PlatformError::Connection("socket closed".to_string()));

        let err = engine.destroy("web", &mut diag).await.unwrap_err();
        assert_eq!(err.resource_kind(), Some(ResourceErrorKind::Teardown));
        assert!(store.load(&name("web")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn destroy_without_record_removes_strays() {
        let platform = Arc::new(MemoryPlatform::new());
        let (_, engine) = memory_engine(&platform);
        platform.insert_orphan(&spec("web", "nginx").to_workload());

        let mut diag = Diagnostics::default();
        let outcome = engine.destroy("web", &mut diag).await.unwrap();

        assert_eq!(outcome.action, Action::Delete);
        assert!(platform.workloads().is_empty());
        assert_eq!(diag.warnings()[0].kind, WarningKind::OrphansRemoved);
    }
}

mod lock_files {
    use super::*;

    fn write_foreign_lock(dir: &std::path::Path, n: &str) {
        let mut info = LockInfo::new(&name(n));
        info.holder = "other-host".to_string();
        info.pid = 4242;
        std::fs::write(
            LockInfo::lock_path(dir, &name(n)),
            serde_json::to_string(&info).unwrap(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn held_lock_blocks_without_touching_platform() {
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(MemoryPlatform::new());
        let engine = Engine::new(platform.clone(), Arc::new(FileStateStore::new(dir.path())))
            .with_lock_dir(dir.path());
        write_foreign_lock(dir.path(), "web");

        let mut diag = Diagnostics::default();
        let err = engine
            .up("web", &DeploymentArgs::new("nginx", 80), &mut diag)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Lock(LockError::Held { pid: 4242, .. })));
        assert!(err.to_string().contains("other-host"));
        assert_eq!(platform.create_calls(), 0);
    }

    #[tokio::test]
    async fn force_breaks_lock_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(MemoryPlatform::new());
        let engine = Engine::new(platform.clone(), Arc::new(FileStateStore::new(dir.path())))
            .with_lock_dir(dir.path())
            .with_force(true);
        write_foreign_lock(dir.path(), "web");

        let mut diag = Diagnostics::default();
        engine
            .up("web", &DeploymentArgs::new("nginx", 80), &mut diag)
            .await
            .unwrap();

        assert_eq!(diag.warnings().len(), 1);
        assert_eq!(diag.warnings()[0].kind, WarningKind::LockBroken);
        assert!(diag.warnings()[0].message.contains("other-host"));
        assert!(!dir.path().join("web.lock").exists());
    }

    #[tokio::test]
    async fn taken_over_lock_is_not_released_by_previous_holder() {
        let dir = tempfile::tempdir().unwrap();
        let first = DeployLock::acquire(dir.path(), &name("web"), false)
            .await
            .unwrap();

        let platform = Arc::new(MemoryPlatform::new().with_latency(Duration::from_millis(200)));
        let engine = Engine::new(platform.clone(), Arc::new(FileStateStore::new(dir.path())))
            .with_lock_dir(dir.path())
            .with_force(true);

        let forced = tokio::spawn(async move {
            let mut diag = Diagnostics::default();
            engine
                .up("web", &DeploymentArgs::new("nginx", 80), &mut diag)
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The forced run still holds the file; the old holder must leave it alone.
        first.release().await.unwrap();
        let err = DeployLock::acquire(dir.path(), &name("web"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Held { .. }));

        forced.await.unwrap().unwrap();
        assert!(!dir.path().join("web.lock").exists());
    }
}

mod apply {
    use super::*;

    #[tokio::test]
    async fn apply_creates_updates_and_removes_undeclared() {
        let platform = Arc::new(MemoryPlatform::new());
        let (store, engine) = memory_engine(&platform);
        let mut diag = Diagnostics::default();

        let report = engine
            .apply(&[spec("alpha", "nginx"), spec("beta", "nginx")], false, &mut diag)
            .await
            .unwrap();
        assert!(report.is_success());
        assert_eq!(platform.workloads().len(), 2);

        let report = engine
            .apply(&[spec("beta", "nginx:1.25")], false, &mut diag)
            .await
            .unwrap();
        assert!(report.is_success());

        let mut actions: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| (o.name.to_string(), o.action))
            .collect();
        actions.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            actions,
            vec![
                ("alpha".to_string(), Action::Delete),
                ("beta".to_string(), Action::Update)
            ]
        );
        assert_eq!(platform.workloads().len(), 1);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_reports_plan_without_side_effects() {
        let platform = Arc::new(MemoryPlatform::new());
        let (_, engine) = memory_engine(&platform);
        let mut diag = Diagnostics::default();

        engine
            .apply(&[spec("alpha", "nginx")], false, &mut diag)
            .await
            .unwrap();

        let report = engine
            .apply(&[spec("beta", "nginx")], true, &mut diag)
            .await
            .unwrap();
        let actions: Vec<_> = report.outcomes.iter().map(|o| o.action).collect();
        assert_eq!(actions, vec![Action::Create, Action::Delete]);
        assert_eq!(platform.create_calls(), 1);
        assert_eq!(platform.delete_calls(), 0);
    }

    #[tokio::test]
    async fn planning_needs_only_the_store() {
        let store = MemoryStateStore::new();
        let platform = Arc::new(MemoryPlatform::new());
        let engine = Engine::new(platform.clone(), Arc::new(store.clone()));
        let mut diag = Diagnostics::default();
        engine
            .apply(&[spec("alpha", "nginx"), spec("beta", "nginx")], false, &mut diag)
            .await
            .unwrap();

        let report = plan_apply(&store, &[spec("alpha", "nginx"), spec("gamma", "httpd")])
            .await
            .unwrap();
        let actions: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| (o.name.to_string(), o.action))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("alpha".to_string(), Action::NoOp),
                ("gamma".to_string(), Action::Create),
                ("beta".to_string(), Action::Delete),
            ]
        );
        assert_eq!(platform.create_calls(), 2);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let platform = Arc::new(MemoryPlatform::new());
        let (_, engine) = memory_engine(&platform);
        platform.mark_image_missing("nginx:missing");
        let mut diag = Diagnostics::default();

        let report = engine
            .apply(
                &[spec("alpha", "nginx:missing"), spec("beta", "nginx")],
                false,
                &mut diag,
            )
            .await
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0.as_str(), "alpha");
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].name.as_str(), "beta");
    }
}
