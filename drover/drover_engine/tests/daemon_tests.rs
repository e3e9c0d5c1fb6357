//! Daemon pool tests against the real worker executable.

use drover_core::{ContextKey, DaemonError, Error, ParamValue, WorkItemId};
use drover_engine::daemon::{DaemonPool, DaemonPoolConfig, DaemonRequest, LaunchSpec, RemoteOutcome};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn worker_launch() -> LaunchSpec {
    LaunchSpec::resolve(
        None,
        Some(&PathBuf::from(env!("CARGO_BIN_EXE_drover-worker"))),
    )
    .unwrap()
}

fn key(label: &str) -> ContextKey {
    ContextKey::for_classpath(&[PathBuf::from(label)])
}

fn pool(configure: impl FnOnce(&mut DaemonPoolConfig)) -> Arc<DaemonPool> {
    let mut config = DaemonPoolConfig {
        max_daemons: 4,
        max_retained: 4,
        idle_timeout: Duration::from_secs(60),
        reap_interval: Duration::from_secs(60),
        acquire_timeout: Duration::from_secs(10),
        default_executable: None,
    };
    configure(&mut config);
    DaemonPool::start(config)
}

fn pid_request() -> DaemonRequest {
    DaemonRequest {
        item_id: WorkItemId::new(),
        action: "pid".into(),
        params: vec![],
    }
}

#[test]
fn test_dispatch_round_trip() {
    let pool = pool(|_| {});
    let launch = worker_launch();

    let mut lease = pool.acquire(key("a"), &launch).unwrap();
    let rendered = format!("{:?}", lease);
    assert!(rendered.contains("DaemonLease"));
    assert!(rendered.contains("Idle"));

    let response = lease.dispatch(&pid_request()).unwrap();
    assert_eq!(response.worker_pid, lease.pid());
    match response.outcome {
        RemoteOutcome::Success { value } => {
            assert_eq!(value.as_int().unwrap(), lease.pid() as i64);
        }
        other => panic!("expected success, got {:?}", other),
    }

    drop(lease);
    pool.shutdown();
}

#[test]
fn test_released_daemon_is_reused_for_its_key() {
    let pool = pool(|_| {});
    let launch = worker_launch();

    let first = pool.acquire(key("reuse"), &launch).unwrap();
    let pid = first.pid();
    drop(first);

    let second = pool.acquire(key("reuse"), &launch).unwrap();
    assert_eq!(second.pid(), pid);
    assert_eq!(pool.stats().spawned, 1);

    drop(second);
    pool.shutdown();
}

#[test]
fn test_different_keys_never_share_a_daemon() {
    let pool = pool(|_| {});
    let launch = worker_launch();

    let a = pool.acquire(key("a"), &launch).unwrap();
    let pid_a = a.pid();
    drop(a);

    // Key "a" has an idle daemon, but key "b" must not receive it.
    let b = pool.acquire(key("b"), &launch).unwrap();
    assert_ne!(b.pid(), pid_a);
    assert_eq!(pool.stats().spawned, 2);

    drop(b);
    pool.shutdown();
}

#[test]
fn test_idle_timeout_reaps_oldest_first() {
    let pool = pool(|c| c.idle_timeout = Duration::from_millis(50));
    let launch = worker_launch();

    drop(pool.acquire(key("a"), &launch).unwrap());
    assert_eq!(pool.stats().live, 1);

    thread::sleep(Duration::from_millis(100));
    pool.reap();

    let stats = pool.stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.retired, 1);
    pool.shutdown();
}

#[test]
fn test_busy_daemon_is_never_reaped() {
    let pool = pool(|c| c.idle_timeout = Duration::from_millis(10));
    let launch = worker_launch();

    let lease = pool.acquire(key("busy"), &launch).unwrap();
    thread::sleep(Duration::from_millis(50));
    pool.reap();

    let stats = pool.stats();
    assert_eq!(stats.live, 1);
    assert_eq!(stats.retired, 0);

    drop(lease);
    pool.shutdown();
}

#[test]
fn test_retained_ceiling_is_enforced() {
    let pool = pool(|c| c.max_retained = 1);
    let launch = worker_launch();

    let a = pool.acquire(key("a"), &launch).unwrap();
    let b = pool.acquire(key("b"), &launch).unwrap();
    drop(a);
    drop(b);
    assert_eq!(pool.stats().idle, 2);

    pool.reap();
    let stats = pool.stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.retired, 1);
    pool.shutdown();
}

#[test]
fn test_ceiling_holds_under_contention() {
    let pool = pool(|c| c.max_daemons = 4);
    let launch = worker_launch();
    let leased: Arc<Mutex<HashSet<u32>>> = Arc::new(Mutex::new(HashSet::new()));

    let mut threads = Vec::new();
    for _ in 0..100 {
        let pool = Arc::clone(&pool);
        let launch = launch.clone();
        let leased = Arc::clone(&leased);
        threads.push(thread::spawn(move || {
            let lease = pool.acquire(key("contended"), &launch).unwrap();
            {
                let mut held = leased.lock().unwrap();
                // A daemon must never be assigned to two leases at once.
                assert!(held.insert(lease.pid()), "daemon double-assigned");
                assert!(held.len() <= 4, "ceiling exceeded");
            }
            thread::sleep(Duration::from_millis(2));
            leased.lock().unwrap().remove(&lease.pid());
        }));
    }
    for t in threads {
        t.join().unwrap();
    }

    let stats = pool.stats();
    assert!(stats.spawned <= 4, "spawned {} daemons", stats.spawned);
    assert!(stats.live <= 4);
    pool.shutdown();
}

#[test]
fn test_slot_retired_across_keys_at_ceiling() {
    let pool = pool(|c| {
        c.max_daemons = 1;
        c.max_retained = 1;
    });
    let launch = worker_launch();

    let a = pool.acquire(key("a"), &launch).unwrap();
    let pid_a = a.pid();
    drop(a);

    // The only slot holds an idle daemon for "a"; acquiring "b" retires it.
    let b = pool.acquire(key("b"), &launch).unwrap();
    assert_ne!(b.pid(), pid_a);

    let stats = pool.stats();
    assert_eq!(stats.live, 1);
    assert_eq!(stats.retired, 1);

    drop(b);
    pool.shutdown();
}

#[test]
fn test_acquire_times_out_when_all_busy() {
    let pool = pool(|c| {
        c.max_daemons = 1;
        c.acquire_timeout = Duration::from_millis(200);
    });
    let launch = worker_launch();

    let held = pool.acquire(key("a"), &launch).unwrap();
    let err = pool.acquire(key("a"), &launch).unwrap_err();
    assert!(matches!(
        err,
        Error::Daemon(DaemonError::AcquireTimeout(_))
    ));

    drop(held);
    pool.shutdown();
}

#[test]
fn test_crashed_daemon_is_discarded_not_pooled() {
    let pool = pool(|_| {});
    let launch = worker_launch();

    let mut lease = pool.acquire(key("crash"), &launch).unwrap();
    let crashed_pid = lease.pid();
    let request = DaemonRequest {
        item_id: WorkItemId::new(),
        action: "exit".into(),
        params: vec![ParamValue::Int(3)],
    };
    let err = lease.dispatch(&request).unwrap_err();
    assert!(matches!(err, Error::Daemon(DaemonError::Crashed(_, _))));
    drop(lease);

    assert_eq!(pool.stats().live, 0);

    // A fresh acquire launches a replacement.
    let next = pool.acquire(key("crash"), &launch).unwrap();
    assert_ne!(next.pid(), crashed_pid);
    drop(next);
    pool.shutdown();
}

#[test]
fn test_startup_failure_frees_the_slot() {
    let pool = pool(|c| c.max_daemons = 1);
    let bad = LaunchSpec::resolve(
        None,
        Some(&PathBuf::from("/nonexistent/drover-worker")),
    )
    .unwrap();

    let err = pool.acquire(key("a"), &bad).unwrap_err();
    assert!(matches!(
        err,
        Error::Daemon(DaemonError::StartupFailed(_))
    ));

    // The failed launch must not leak its claimed slot.
    let lease = pool.acquire(key("a"), &worker_launch()).unwrap();
    drop(lease);
    pool.shutdown();
}

#[test]
fn test_shutdown_terminates_idle_daemons() {
    let pool = pool(|_| {});
    let launch = worker_launch();

    drop(pool.acquire(key("a"), &launch).unwrap());
    drop(pool.acquire(key("b"), &launch).unwrap());
    assert_eq!(pool.stats().live, 2);

    pool.shutdown();
    let stats = pool.stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.retired, 2);

    let err = pool.acquire(key("a"), &launch).unwrap_err();
    assert!(matches!(err, Error::Daemon(DaemonError::PoolShutDown)));
}
