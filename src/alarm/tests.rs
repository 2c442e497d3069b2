//! 闹钟管理器测试
//! Alarm manager tests

use super::*;
use crate::error::Error;
use crate::queue::QueueItem;
use crate::testing::{CallCounter, TEST_GRANULARITY, test_config};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_zero_timeout_fires_once_on_await() {
    let manager = AlarmManager::with_config(test_config()).unwrap();
    let counter = CallCounter::new();

    manager
        .register(Duration::ZERO, counter.callback(), ())
        .unwrap();
    manager.await_all();

    assert_eq!(counter.get(), 1);
    assert!(manager.is_empty());
    assert_eq!(manager.state(), ManagerState::Terminated);
}

#[test]
fn test_callback_receives_registered_data() {
    let manager = AlarmManager::with_config(test_config()).unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let data = Arc::new(String::from("payload"));

    let sink = received.clone();
    manager
        .register(
            Duration::from_millis(30),
            move |data: Arc<String>| sink.lock().unwrap().push(data),
            data.clone(),
        )
        .unwrap();
    manager.await_all();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert!(Arc::ptr_eq(&received[0], &data));
}

#[test]
fn test_natural_expiry_is_reaped_while_running() {
    let manager = AlarmManager::with_config(test_config()).unwrap();
    let counter = CallCounter::new();

    let handle = manager
        .register(Duration::from_millis(40), counter.callback(), ())
        .unwrap();
    assert!(manager.contains(&handle));

    assert!(wait_until(|| manager.stats().reaped == 1));
    assert!(manager.is_empty());
    assert_eq!(counter.get(), 1);
    assert_eq!(manager.state(), ManagerState::Running);

    let stats = manager.stats();
    assert_eq!(stats.fired, 1);
    assert_eq!(stats.reaped, 1);
}

#[test]
fn test_cancel_prevents_callback() {
    let manager = AlarmManager::with_config(test_config()).unwrap();
    let counter = CallCounter::new();

    let handle = manager
        .register(Duration::from_secs(5), counter.callback(), ())
        .unwrap();
    manager.cancel(&handle).unwrap();
    manager.await_all();

    assert_eq!(counter.get(), 0);
    assert!(manager.is_empty());
    assert_eq!(manager.stats().cancelled, 1);
}

#[test]
fn test_cancel_after_fire_is_harmless() {
    let manager = AlarmManager::with_config(test_config()).unwrap();
    let counter = CallCounter::new();

    let handle = manager
        .register(Duration::ZERO, counter.callback(), ())
        .unwrap();
    assert!(wait_until(|| manager.stats().reaped == 1));

    handle.cancel().unwrap();
    manager.await_all();

    assert_eq!(counter.get(), 1);
    assert_eq!(manager.stats().reaped, 1);
}

#[test]
fn test_terminate_all_joins_every_worker() {
    let manager = AlarmManager::with_config(test_config()).unwrap();
    let counter = CallCounter::new();

    for i in 0..10u64 {
        let timeout = Duration::from_secs(i % 2);
        manager.register(timeout, counter.callback(), ()).unwrap();
    }
    manager.terminate_all();

    let stats = manager.stats();
    assert!(manager.is_empty());
    assert_eq!(stats.registered, 10);
    assert_eq!(stats.reaped, 10);
    assert_eq!(stats.fired + stats.cancelled, 10);
    assert_eq!(counter.get() as u64, stats.fired);
}

#[test]
fn test_terminate_is_bounded_by_granularity() {
    let manager = AlarmManager::with_config(test_config()).unwrap();
    let counter = CallCounter::new();
    for _ in 0..5 {
        manager
            .register(Duration::from_secs(60), counter.callback(), ())
            .unwrap();
    }

    let started = Instant::now();
    manager.terminate_all();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(counter.get(), 0);
    assert_eq!(manager.stats().cancelled, 5);
}

#[test]
fn test_register_after_drain_is_rejected() {
    let manager = AlarmManager::with_config(test_config()).unwrap();
    manager.terminate_all();

    let counter = CallCounter::new();
    let result = manager.register(Duration::ZERO, counter.callback(), ());
    assert!(matches!(result, Err(Error::ManagerClosed)));
    assert!(manager.is_empty());
    assert_eq!(manager.stats().registered, 0);
}

#[test]
fn test_shutdown_is_idempotent() {
    let manager = AlarmManager::with_config(test_config()).unwrap();
    manager.await_all();
    manager.terminate_all();
    manager.await_all();
    assert_eq!(manager.state(), ManagerState::Terminated);
}

#[test]
fn test_unknown_control_message_is_dropped() {
    let manager = AlarmManager::with_config(test_config()).unwrap();
    let counter = CallCounter::new();

    manager
        .control_tx()
        .push_item(QueueItem::new("Reschedule", None))
        .unwrap();
    manager
        .control_tx()
        .push_item(QueueItem::new(
            ControlMessage::DESTROY,
            Some(Bytes::from_static(&[0xff; 3])),
        ))
        .unwrap();

    manager
        .register(Duration::ZERO, counter.callback(), ())
        .unwrap();
    manager.await_all();

    assert_eq!(counter.get(), 1);
    assert_eq!(manager.stats().dropped_messages, 2);
}

#[test]
fn test_active_alarms_in_registration_order() {
    let manager = AlarmManager::with_config(test_config()).unwrap();
    let counter = CallCounter::new();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            manager
                .register(Duration::from_secs(30), counter.callback(), ())
                .unwrap()
        })
        .collect();

    let ids: Vec<_> = handles.iter().map(AlarmHandle::id).collect();
    assert_eq!(manager.active_alarms(), ids);

    manager.destroy();
    assert_eq!(counter.get(), 0);
}

/// Raises its flag when the alarm data is released.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_drop_terminates_pending_alarms() {
    let counter = CallCounter::new();
    let released = Arc::new(AtomicBool::new(false));
    let manager = AlarmManager::with_config(test_config()).unwrap();

    let callback = counter.callback();
    manager
        .register(
            Duration::from_secs(30),
            move |_flag: DropFlag| callback(()),
            DropFlag(released.clone()),
        )
        .unwrap();
    assert!(!released.load(Ordering::SeqCst));

    let started = Instant::now();
    drop(manager);

    // The worker was cancelled and joined before drop returned.
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(counter.get(), 0);
}

#[test]
fn test_cancel_is_served_while_awaiting() {
    let manager = Arc::new(AlarmManager::with_config(test_config()).unwrap());
    let counter = CallCounter::new();
    let handle = manager
        .register(Duration::from_secs(3), counter.callback(), ())
        .unwrap();

    let waiter = {
        let manager = manager.clone();
        thread::spawn(move || {
            let started = Instant::now();
            manager.await_all();
            started.elapsed()
        })
    };
    assert!(wait_until(|| manager.state() == ManagerState::Draining));
    manager.cancel(&handle).unwrap();

    let waited = waiter.join().unwrap();
    assert!(waited < Duration::from_secs(2));
    assert_eq!(counter.get(), 0);
    assert!(manager.is_empty());
    assert_eq!(manager.stats().cancelled, 1);
    assert_eq!(manager.state(), ManagerState::Terminated);
}

#[test]
fn test_cancel_racing_expiry_fires_at_most_once() {
    let timeout = TEST_GRANULARITY * 2;
    for round in 0..20u64 {
        let manager = AlarmManager::with_config(test_config()).unwrap();
        let counter = CallCounter::new();
        let handle = manager.register(timeout, counter.callback(), ()).unwrap();

        // Land the cancel just before, at, and just after the deadline.
        thread::sleep(timeout + Duration::from_millis(round % 10) - Duration::from_millis(5));
        manager.cancel(&handle).unwrap();
        manager.await_all();

        let stats = manager.stats();
        assert!(counter.get() <= 1, "round {round} fired {} times", counter.get());
        assert_eq!(counter.get() as u64, stats.fired);
        assert_eq!(stats.fired + stats.cancelled, 1);
        assert_eq!(stats.reaped, 1);
        assert!(manager.is_empty());
    }
}

#[test]
fn test_callback_may_drop_last_manager_reference() {
    let manager = Arc::new(AlarmManager::with_config(test_config()).unwrap());
    let returned = Arc::new(AtomicBool::new(false));

    let flag = returned.clone();
    manager
        .register(
            Duration::from_millis(200),
            move |manager: Arc<AlarmManager>| {
                drop(manager);
                flag.store(true, Ordering::SeqCst);
            },
            manager.clone(),
        )
        .unwrap();
    drop(manager);

    assert!(wait_until(|| returned.load(Ordering::SeqCst)));
}

#[test]
fn test_shutdown_from_callback_does_not_block() {
    let manager = Arc::new(AlarmManager::with_config(test_config()).unwrap());
    let counter = CallCounter::new();
    let pending = manager
        .register(Duration::from_secs(30), counter.callback(), ())
        .unwrap();

    let returned = Arc::new(AtomicBool::new(false));
    let flag = returned.clone();
    manager
        .register(
            Duration::from_millis(20),
            move |manager: Arc<AlarmManager>| {
                manager.terminate_all();
                manager.await_all();
                flag.store(true, Ordering::SeqCst);
            },
            manager.clone(),
        )
        .unwrap();

    assert!(wait_until(|| returned.load(Ordering::SeqCst)));
    manager.await_all();

    assert_eq!(manager.state(), ManagerState::Terminated);
    assert!(!manager.contains(&pending));
    assert!(manager.is_empty());
    assert_eq!(counter.get(), 0);
}
