use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use traffic_admission::{
    AdmissionError, AgentId, IntersectionCoordinator, IntersectionId, LightScheduler, Phase,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn started(initial: Phase) -> Arc<IntersectionCoordinator> {
    let coordinator =
        IntersectionCoordinator::with_scheduler(IntersectionId(0), LightScheduler::manual(initial));
    coordinator.start().unwrap();
    Arc::new(coordinator)
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Entered(u64),
    Departed(u64),
}

// ── FIFO ──────────────────────────────────────────────────────────────────────

#[test]
fn three_agents_on_green_cross_in_order_one_at_a_time() {
    let coordinator = started(Phase::Green);
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut releases = Vec::new();
    let mut agents = Vec::new();

    for k in 1..=3u64 {
        let (release, leave) = mpsc::channel::<()>();
        releases.push(release);
        agents.push({
            let (coordinator, events) = (Arc::clone(&coordinator), Arc::clone(&events));
            thread::spawn(move || {
                coordinator.request_entry(AgentId(k)).unwrap();
                events.lock().unwrap().push(Event::Entered(k));
                assert_eq!(coordinator.admitted_agent(), Some(AgentId(k)));
                leave.recv().unwrap();
                events.lock().unwrap().push(Event::Departed(k));
                coordinator.notify_departure(AgentId(k)).unwrap();
            })
        });
        // Pin the enqueue order: 1 is inside, then 2 and 3 line up behind it.
        let expected_waiting = (k - 1) as usize;
        wait_until("agent to enqueue", || {
            if k == 1 {
                coordinator.admitted_agent() == Some(AgentId(1))
            } else {
                coordinator.queue_len() == expected_waiting
            }
        });
    }

    for release in releases {
        release.send(()).unwrap();
    }
    for agent in agents {
        agent.join().unwrap();
    }

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            Event::Entered(1),
            Event::Departed(1),
            Event::Entered(2),
            Event::Departed(2),
            Event::Entered(3),
            Event::Departed(3),
        ]
    );
    assert!(!coordinator.is_blocked());
    assert_eq!(coordinator.stats().granted, 3);
}

#[test]
fn grants_follow_enqueue_order_regardless_of_work_time() {
    let coordinator = started(Phase::Red);
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut agents = Vec::new();

    for k in 1..=8u64 {
        agents.push({
            let (coordinator, order) = (Arc::clone(&coordinator), Arc::clone(&order));
            thread::spawn(move || {
                coordinator.request_entry(AgentId(k)).unwrap();
                order.lock().unwrap().push(k);
                // Earlier agents take longer to clear the intersection.
                thread::sleep(Duration::from_millis(9 - k));
                coordinator.notify_departure(AgentId(k)).unwrap();
            })
        });
        if k == 1 {
            wait_until("first admission", || coordinator.is_blocked());
        } else {
            let expected = (k - 1) as usize;
            wait_until("queue growth", || coordinator.queue_len() == expected);
        }
    }
    assert_eq!(
        coordinator.waiting_agents(),
        (2..=8).map(AgentId).collect::<Vec<_>>()
    );

    coordinator.light().set_phase(Phase::Green);
    for agent in agents {
        agent.join().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), (1..=8).collect::<Vec<_>>());
}

// ── Light gating ──────────────────────────────────────────────────────────────

#[test]
fn admitted_agent_waits_for_green() {
    let coordinator = started(Phase::Red);
    let green_forced = Arc::new(AtomicBool::new(false));

    let agent = {
        let (coordinator, green_forced) = (Arc::clone(&coordinator), Arc::clone(&green_forced));
        thread::spawn(move || {
            coordinator.request_entry(AgentId(1)).unwrap();
            green_forced.load(Ordering::SeqCst)
        })
    };

    wait_until("ticket grant", || coordinator.admitted_agent() == Some(AgentId(1)));
    thread::sleep(Duration::from_millis(50));
    assert!(!agent.is_finished(), "agent crossed on red");

    green_forced.store(true, Ordering::SeqCst);
    coordinator.light().set_phase(Phase::Green);
    assert!(agent.join().unwrap(), "agent returned before the green transition");
    coordinator.notify_departure(AgentId(1)).unwrap();
}

#[test]
fn queued_agents_are_not_admitted_while_first_waits_on_red() {
    let coordinator = started(Phase::Red);
    let first = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.request_entry(AgentId(1)))
    };
    wait_until("first admission", || coordinator.is_blocked());
    let second = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.request_entry(AgentId(2)))
    };
    wait_until("second queued", || coordinator.queue_len() == 1);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(coordinator.admitted_agent(), Some(AgentId(1)));

    coordinator.light().set_phase(Phase::Green);
    first.join().unwrap().unwrap();
    assert!(!second.is_finished());
    coordinator.notify_departure(AgentId(1)).unwrap();
    second.join().unwrap().unwrap();
    assert_eq!(coordinator.admitted_agent(), Some(AgentId(2)));
}

// ── Mutual exclusion & liveness ───────────────────────────────────────────────

#[test]
fn never_two_agents_inside_and_queue_drains() {
    const AGENTS: u64 = 8;
    const ROUNDS: u64 = 5;
    let coordinator = started(Phase::Green);
    let inside = Arc::new(AtomicUsize::new(0));

    let agents: Vec<_> = (0..AGENTS)
        .map(|k| {
            let (coordinator, inside) = (Arc::clone(&coordinator), Arc::clone(&inside));
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    coordinator.request_entry(AgentId(k)).unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    assert!(coordinator.is_blocked());
                    thread::sleep(Duration::from_millis(1));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    coordinator.notify_departure(AgentId(k)).unwrap();
                }
            })
        })
        .collect();
    for agent in agents {
        agent.join().unwrap();
    }

    let stats = coordinator.stats();
    assert_eq!(stats.granted, AGENTS * ROUNDS);
    assert_eq!(stats.departed, AGENTS * ROUNDS);
    assert_eq!(stats.waiting, 0);
    assert!(!coordinator.is_blocked());
}

// ── Shutdown ──────────────────────────────────────────────────────────────────

#[test]
fn shutdown_turns_away_queued_agents() {
    let coordinator = started(Phase::Green);
    coordinator.request_entry(AgentId(1)).unwrap();

    let waiters: Vec<_> = (2..=3u64)
        .map(|k| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || coordinator.request_entry(AgentId(k)))
        })
        .collect();
    wait_until("both queued", || coordinator.queue_len() == 2);

    coordinator.shutdown();
    for waiter in waiters {
        assert!(matches!(waiter.join().unwrap(), Err(AdmissionError::Shutdown)));
    }
    // The agent already inside can still leave.
    coordinator.notify_departure(AgentId(1)).unwrap();
}

#[test]
fn shutdown_releases_agent_waiting_on_red() {
    let coordinator = started(Phase::Red);
    let agent = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.request_entry(AgentId(1)))
    };
    wait_until("admission", || coordinator.is_blocked());

    coordinator.shutdown();
    assert!(matches!(agent.join().unwrap(), Err(AdmissionError::ChannelClosed)));
    assert!(!coordinator.is_blocked());
    assert_eq!(coordinator.stats().released, 1);
}
