// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Timing based scenarios: a blocked call is one that hasn't returned after `SETTLE`.

#![cfg(not(loom))]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use priority_rwlock::{LockState, RawPriorityRwLock};

const SETTLE: Duration = Duration::from_secs(1);

fn spawn_writer(
    lock: &Arc<RawPriorityRwLock>,
    acquired: &Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    let lock = lock.clone();
    let acquired = acquired.clone();
    thread::spawn(move || {
        lock.lock();
        acquired.store(true, Ordering::SeqCst);
        lock.unlock();
    })
}

fn spawn_reader(
    lock: &Arc<RawPriorityRwLock>,
    admitted: &Arc<AtomicUsize>,
) -> thread::JoinHandle<()> {
    let lock = lock.clone();
    let admitted = admitted.clone();
    thread::spawn(move || {
        lock.rlock();
        admitted.fetch_add(1, Ordering::SeqCst);
        lock.runlock();
    })
}

#[test]
fn writer_excludes_writers_and_readers() {
    let lock = Arc::new(RawPriorityRwLock::new());
    lock.lock();

    let writer_acquired = Arc::new(AtomicBool::new(false));
    let readers_admitted = Arc::new(AtomicUsize::new(0));

    let writer = spawn_writer(&lock, &writer_acquired);
    let reader = spawn_reader(&lock, &readers_admitted);

    thread::sleep(SETTLE);
    assert!(!writer_acquired.load(Ordering::SeqCst));
    assert_eq!(readers_admitted.load(Ordering::SeqCst), 0);

    lock.unlock();
    writer.join().unwrap();
    reader.join().unwrap();

    assert!(writer_acquired.load(Ordering::SeqCst));
    assert_eq!(readers_admitted.load(Ordering::SeqCst), 1);
    assert_eq!(lock.state(), LockState::Free);
}

#[test]
fn reader_excludes_writer() {
    let lock = Arc::new(RawPriorityRwLock::new());
    lock.rlock();

    let writer_acquired = Arc::new(AtomicBool::new(false));
    let writer = spawn_writer(&lock, &writer_acquired);

    thread::sleep(SETTLE);
    assert!(!writer_acquired.load(Ordering::SeqCst));
    assert_eq!(lock.state(), LockState::WriteRequested { draining: 1 });

    lock.runlock();
    writer.join().unwrap();

    assert!(writer_acquired.load(Ordering::SeqCst));
    assert_eq!(lock.state(), LockState::Free);
}

#[test]
fn readers_share_the_lock() {
    let lock = Arc::new(RawPriorityRwLock::new());
    lock.rlock();

    let inside = Arc::new(AtomicUsize::new(1));
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let lock = lock.clone();
            let inside = inside.clone();
            thread::spawn(move || {
                lock.rlock();
                inside.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    for reader in readers {
        reader.join().unwrap();
    }

    // nobody has released yet, all three readers are inside at the same time
    assert_eq!(inside.load(Ordering::SeqCst), 3);
    assert_eq!(lock.state(), LockState::ReadShared(3));

    for _ in 0..3 {
        lock.runlock();
    }
    assert_eq!(lock.state(), LockState::Free);
}

#[test]
fn waiting_writer_is_not_bypassed_by_later_readers() {
    let lock = Arc::new(RawPriorityRwLock::new());
    lock.rlock();

    let writer_acquired = Arc::new(AtomicBool::new(false));
    let readers_admitted = Arc::new(AtomicUsize::new(1));

    let writer = {
        let lock = lock.clone();
        let writer_acquired = writer_acquired.clone();
        let readers_admitted = readers_admitted.clone();
        thread::spawn(move || {
            lock.lock();
            writer_acquired.store(true, Ordering::SeqCst);
            // the first reader has left and the late readers are still locked out
            let admitted = readers_admitted.load(Ordering::SeqCst);
            lock.unlock();
            admitted
        })
    };

    thread::sleep(SETTLE);

    let late_readers = [
        spawn_reader(&lock, &readers_admitted),
        spawn_reader(&lock, &readers_admitted),
    ];

    thread::sleep(SETTLE);

    assert!(!writer_acquired.load(Ordering::SeqCst));
    assert_eq!(readers_admitted.load(Ordering::SeqCst), 1);

    lock.runlock();

    assert_eq!(writer.join().unwrap(), 1, "a late reader got in ahead of the writer");
    for reader in late_readers {
        reader.join().unwrap();
    }

    assert_eq!(readers_admitted.load(Ordering::SeqCst), 3);
    assert_eq!(lock.state(), LockState::Free);
}

#[test]
fn next_acquirer_only_sees_readers_admitted_after_release() {
    let lock = Arc::new(RawPriorityRwLock::new());

    lock.rlock();
    lock.rlock();
    lock.runlock();
    lock.runlock();

    lock.lock();
    assert_eq!(lock.state(), LockState::WriteExclusive);
    lock.unlock();

    lock.rlock();
    assert_eq!(lock.state(), LockState::ReadShared(1));

    let writer_acquired = Arc::new(AtomicBool::new(false));
    let writer = spawn_writer(&lock, &writer_acquired);

    thread::sleep(SETTLE);
    assert_eq!(lock.state(), LockState::WriteRequested { draining: 1 });

    lock.runlock();
    writer.join().unwrap();
    assert!(writer_acquired.load(Ordering::SeqCst));
    assert_eq!(lock.state(), LockState::Free);
}

#[test]
fn independent_instances() {
    let a = RawPriorityRwLock::new();
    let b = RawPriorityRwLock::with_spin_limit(10);

    a.lock();
    assert!(b.try_rlock());
    assert_eq!(a.state(), LockState::WriteExclusive);
    assert_eq!(b.state(), LockState::ReadShared(1));

    a.unlock();
    b.runlock();
}
