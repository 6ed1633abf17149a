//! Context pool behavior seen through the engine.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use pretty_assertions::assert_eq;
use weave::{CurrentThread, PoolError, TaskScope};

use crate::support::{widget, Harness, Logging};

#[test]
fn concurrent_borrowers_never_share_a_context() {
    let harness = Harness::new();
    let engine = harness.engine(3, vec![], &[]);
    let pool = engine.pool();
    let in_use: Vec<AtomicBool> = (0..pool.capacity()).map(|_| AtomicBool::new(false)).collect();
    let peak = AtomicUsize::new(0);
    let current = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for task in 0..8 {
            let (in_use, peak, current) = (&in_use, &peak, &current);
            s.spawn(move || {
                let scope = TaskScope(task);
                for _ in 0..20 {
                    let handle = pool.borrow(&scope).unwrap_or_else(|e| panic!("{e}"));
                    assert!(!in_use[handle.id()].swap(true, Ordering::SeqCst), "context shared");
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::yield_now();
                    current.fetch_sub(1, Ordering::SeqCst);
                    in_use[handle.id()].store(false, Ordering::SeqCst);
                    pool.return_context(&scope, handle).unwrap_or_else(|e| panic!("{e}"));
                }
            });
        }
    });

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(pool.available(), 3);
}

#[test]
fn borrow_all_hands_out_every_context_once() {
    let harness = Harness::new();
    let engine = harness.engine(3, vec![], &[]);
    let pool = engine.pool();

    let handles = pool.borrow_all().unwrap_or_else(|e| panic!("{e}"));
    let mut ids: Vec<_> = handles.iter().map(|h| h.id()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(pool.available(), 0);

    pool.return_all(handles).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(pool.available(), 3);
}

#[test]
fn assembly_waits_for_a_free_context() {
    let harness = Harness::new();
    let engine = harness.engine(1, vec![Logging::shared()], &[]);
    let handles = engine.pool().borrow_all().unwrap_or_else(|e| panic!("{e}"));
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        let worker = s.spawn(|| {
            let ty = engine.get_or_create(&widget());
            done.store(true, Ordering::SeqCst);
            ty
        });
        std::thread::sleep(Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst));

        engine.pool().return_all(handles).unwrap_or_else(|e| panic!("{e}"));
        let ty = worker
            .join()
            .unwrap_or_else(|_| panic!("worker panicked"))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(ty.name().as_str(), "Widget_Proxy_1");
    });
}

#[test]
fn current_thread_reuses_its_context() {
    let harness = Harness::new();
    let engine = harness.engine(2, vec![], &[]);
    let pool = engine.pool();

    let outer = pool.borrow(&CurrentThread).unwrap_or_else(|e| panic!("{e}"));
    let inner = pool.borrow(&CurrentThread).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(outer, inner);
    assert_eq!(pool.depth(&CurrentThread), 2);
    assert_eq!(pool.available(), 1);

    pool.return_context(&CurrentThread, inner).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(pool.available(), 1);
    pool.return_context(&CurrentThread, outer).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(pool.depth(&CurrentThread), 0);
    assert_eq!(pool.available(), 2);
}

#[test]
fn return_from_another_thread_is_rejected() {
    let harness = Harness::new();
    let engine = harness.engine(1, vec![], &[]);
    let pool = engine.pool();
    let handle = pool.borrow(&CurrentThread).unwrap_or_else(|e| panic!("{e}"));

    let stray = handle.clone();
    let result = std::thread::scope(|s| {
        s.spawn(|| pool.return_context(&CurrentThread, stray))
            .join()
            .unwrap_or_else(|_| panic!("returning thread panicked"))
    });
    assert_eq!(result, Err(PoolError::CrossScopeReturn { context: 0 }));
    assert_eq!(pool.available(), 0);

    pool.return_context(&CurrentThread, handle).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(pool.available(), 1);
}
