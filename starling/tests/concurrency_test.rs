mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use starling::RuntimeConfig;
use starling_api::{Command, Handle};

use common::{fixture, sent_by, system, wait_until};

fn workers(n: usize) -> RuntimeConfig {
    RuntimeConfig {
        worker_threads: n,
        tick: Duration::from_millis(1),
        idle_sleep: Duration::from_millis(2),
        ..RuntimeConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_per_sender_order_with_many_workers() {
    let fixture = fixture();
    let system = Arc::new(system(fixture.registry, workers(4)));
    system.start().unwrap();

    let target = system.create_actor("collector", "").unwrap();
    let senders = [Handle::new(0x1000), Handle::new(0x2000), Handle::new(0x3000)];
    const PER_SENDER: i32 = 300;

    let threads: Vec<_> = senders
        .iter()
        .map(|&source| {
            let system = Arc::clone(&system);
            thread::spawn(move || {
                for session in 1..=PER_SENDER {
                    system
                        .send(Some(source), &target.into(), session, Vec::new())
                        .unwrap();
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    let total = senders.len() * PER_SENDER as usize;
    let log = Arc::clone(&fixture.log);
    assert!(wait_until(|| log.lock().unwrap().len() == total).await);

    for source in senders {
        let sessions: Vec<i32> = sent_by(&fixture.log, source)
            .iter()
            .map(|m| m.session)
            .collect();
        let expected: Vec<i32> = (1..=PER_SENDER).collect();
        assert_eq!(sessions, expected, "order broken for {}", source);
    }

    system.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_actor_is_single_flight() {
    let fixture = fixture();
    let system = Arc::new(system(fixture.registry, workers(4)));
    system.start().unwrap();

    let guarded = system.create_actor("guarded", "").unwrap();

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let system = Arc::clone(&system);
            thread::spawn(move || {
                for i in 0..250 {
                    system.send(None, &guarded.into(), i, Vec::new()).unwrap();
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    let log = Arc::clone(&fixture.log);
    assert!(wait_until(|| log.lock().unwrap().len() == 1000).await);
    assert_eq!(fixture.overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.in_flight.load(Ordering::SeqCst), 0);

    system.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_fires_with_running_workers() {
    let fixture = fixture();
    let system = system(fixture.registry, workers(2));
    system.start().unwrap();

    let handle = system.create_actor("collector", "").unwrap();
    let before = system.now();
    system
        .command(handle, Command::Timeout { ticks: 3, session: 55 })
        .unwrap();

    let log = Arc::clone(&fixture.log);
    assert!(wait_until(|| log.lock().unwrap().iter().any(|m| m.session == 55)).await);

    let fired = fixture.log.lock().unwrap()[0].clone();
    assert!(fired.is_system());
    assert!(fired.payload.is_empty());
    assert!(system.now() >= before + 3);
    assert_eq!(system.metrics().pending_timers, 0);

    system.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_with_queued_work() {
    let fixture = fixture();
    let system = system(fixture.registry, workers(1));
    let dead_letters = system.dead_letters();

    let handle = system.create_actor("collector", "").unwrap();
    for session in 0..10 {
        system.send(None, &handle.into(), session, Vec::new()).unwrap();
    }

    // Never started: every queued message becomes a dead letter
    system.shutdown().unwrap();
    assert!(fixture.log.lock().unwrap().is_empty());
    assert_eq!(dead_letters.try_iter().count(), 10);
}
