//! Tests for per-entity notification batching
//!
//! Listeners see one batch per entity per action, only after the action
//! completes; job batches mirror the job's lifecycle transitions.

use queueing_simulator_core_rs::{
    discipline::{Fcfs, Sink},
    EntityRef, Job, NotificationBatch, NotificationKind, Simulation, SimulationConfig, Time,
};
use std::cell::RefCell;
use std::rc::Rc;

type Seen = Rc<RefCell<Vec<NotificationBatch>>>;

fn collector(seen: &Seen) -> impl FnMut(&NotificationBatch) + 'static {
    let seen = seen.clone();
    move |batch: &NotificationBatch| seen.borrow_mut().push(batch.clone())
}

fn kinds(batch: &NotificationBatch) -> Vec<NotificationKind> {
    batch.notifications.iter().map(|n| n.kind).collect()
}

#[test]
fn test_one_batch_per_entity_per_action() {
    let mut sim = Simulation::default();
    let queue = sim.add_queue("fcfs", Box::new(Fcfs::single_server()));
    let job = sim.add_job(Job::new("j").with_service_time(0.0)).unwrap();
    let seen: Seen = Rc::default();
    sim.listen_all(collector(&seen));

    sim.arrive(1.0, queue, job).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].entity, EntityRef::Queue(queue));
    assert_eq!(
        kinds(&seen[0]),
        vec![
            NotificationKind::Update,
            NotificationKind::Arrival,
            NotificationKind::Start,
            NotificationKind::Departure
        ]
    );
    assert_eq!(seen[1].entity, EntityRef::Job(job));
    assert_eq!(
        kinds(&seen[1]),
        vec![
            NotificationKind::Arrival,
            NotificationKind::Start,
            NotificationKind::Departure
        ]
    );
    assert!(seen.iter().all(|b| b.time() == Some(1.0)));
}

#[test]
fn test_flag_flips_are_reported_in_order() {
    let mut sim = Simulation::default();
    let queue = sim.add_queue("fcfs", Box::new(Fcfs::single_server()));
    let job = sim.add_job(Job::new("j").with_service_time(2.0)).unwrap();
    let seen: Seen = Rc::default();
    sim.listen(queue, collector(&seen));

    sim.arrive(0.0, queue, job).unwrap();
    sim.run().unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2, "the arrival and the departure are two actions");
    assert_eq!(
        kinds(&seen[0]),
        vec![
            NotificationKind::Update,
            NotificationKind::Arrival,
            NotificationKind::Start,
            NotificationKind::StartArmed(false),
            NotificationKind::NoWaitArmed(false)
        ]
    );
    assert_eq!(
        kinds(&seen[1]),
        vec![
            NotificationKind::Update,
            NotificationKind::Departure,
            NotificationKind::StartArmed(true),
            NotificationKind::NoWaitArmed(true)
        ]
    );
}

#[test]
fn test_listener_sees_only_its_entity() {
    let mut sim = Simulation::default();
    let a = sim.add_queue("a", Box::new(Sink));
    let b = sim.add_queue("b", Box::new(Sink));
    let ja = sim.add_job(Job::new("ja")).unwrap();
    let jb = sim.add_job(Job::new("jb")).unwrap();
    let on_a: Seen = Rc::default();
    let on_jb: Seen = Rc::default();
    sim.listen(a, collector(&on_a));
    sim.listen(jb, collector(&on_jb));

    sim.arrive(0.0, a, ja).unwrap();
    sim.arrive(0.0, b, jb).unwrap();

    assert_eq!(on_a.borrow().len(), 1);
    assert!(on_a.borrow().iter().all(|batch| batch.entity == EntityRef::Queue(a)));
    assert_eq!(on_jb.borrow().len(), 1);
    assert_eq!(kinds(&on_jb.borrow()[0]), vec![NotificationKind::Arrival]);
}

#[test]
fn test_no_partial_batches_inside_an_action() {
    let mut sim = Simulation::default();
    let queue = sim.add_queue("sink", Box::new(Sink));
    let jobs: Vec<_> = (0..3)
        .map(|i| sim.add_job(Job::new(format!("j{}", i))).unwrap())
        .collect();
    let seen: Seen = Rc::default();
    sim.listen(queue, collector(&seen));

    let observed = seen.clone();
    sim.schedule(2.0, move |sim, time| {
        for job in &jobs {
            sim.arrive(time, queue, *job)?;
            assert!(observed.borrow().is_empty(), "flushed mid-action");
        }
        Ok(())
    })
    .unwrap();
    sim.run().unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].of_kind(NotificationKind::Arrival).count(), 3);
}

#[test]
fn test_unlisten_stops_delivery() {
    let mut sim = Simulation::default();
    let queue = sim.add_queue("sink", Box::new(Sink));
    let first = sim.add_job(Job::new("first")).unwrap();
    let second = sim.add_job(Job::new("second")).unwrap();
    let seen: Seen = Rc::default();
    let id = sim.listen_all(collector(&seen));

    sim.arrive(0.0, queue, first).unwrap();
    assert!(sim.unlisten(id));
    assert!(!sim.unlisten(id));
    sim.arrive(0.0, queue, second).unwrap();

    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn test_reset_batches_and_listener_hook() {
    struct Recorder {
        resets: Rc<RefCell<Vec<Time>>>,
        batches: Seen,
    }

    impl queueing_simulator_core_rs::Listener for Recorder {
        fn notify(&mut self, batch: &NotificationBatch) {
            self.batches.borrow_mut().push(batch.clone());
        }

        fn reset(&mut self, time: Time) {
            self.resets.borrow_mut().push(time);
        }
    }

    let mut sim = Simulation::default();
    let a = sim.add_queue("a", Box::new(Sink));
    let b = sim.add_queue("b", Box::new(Fcfs::single_server()));
    let job = sim.add_job(Job::new("j")).unwrap();
    sim.arrive(0.0, a, job).unwrap();

    let resets = Rc::new(RefCell::new(Vec::new()));
    let batches: Seen = Rc::default();
    sim.listen_all(Recorder {
        resets: resets.clone(),
        batches: batches.clone(),
    });
    sim.reset(10.0).unwrap();

    assert_eq!(*resets.borrow(), vec![10.0]);
    let batches = batches.borrow();
    let entities: Vec<_> = batches.iter().map(|b| b.entity).collect();
    assert_eq!(entities, vec![EntityRef::Queue(a), EntityRef::Queue(b)]);
    assert!(batches
        .iter()
        .all(|b| kinds(b) == vec![NotificationKind::Reset] && b.time() == Some(10.0)));
    assert!(sim.job(job).unwrap().current_queue().is_none());
    assert_eq!(sim.queue(a).unwrap().number_of_jobs(), 0);
}

#[test]
fn test_failed_argument_check_discards_nothing_visible() {
    let mut sim = Simulation::default();
    let queue = sim.add_queue("sink", Box::new(Sink));
    let job = sim.add_job(Job::new("j")).unwrap();
    let seen: Seen = Rc::default();
    sim.listen_all(collector(&seen));

    sim.arrive(1.0, queue, job).unwrap();
    assert!(sim.arrive(1.0, queue, job).is_err());

    assert_eq!(seen.borrow().len(), 2);
    assert!(sim.poisoned().is_none());
}

#[test]
fn test_trace_fingerprint_is_replayable() {
    fn play(sim: &mut Simulation) -> String {
        let queue = sim.queue_by_name("fcfs").unwrap();
        let jobs: Vec<_> = sim.job_ids().collect();
        for (i, job) in jobs.into_iter().enumerate() {
            sim.schedule_arrival(i as f64 * 0.5, queue, job).unwrap();
        }
        sim.run().unwrap();
        sim.trace().unwrap().fingerprint()
    }

    let mut sim = Simulation::new(SimulationConfig {
        record_trace: true,
        ..Default::default()
    })
    .unwrap();
    sim.add_queue("fcfs", Box::new(Fcfs::single_server()));
    for i in 0..5 {
        sim.add_job(Job::new(format!("j{}", i)).with_service_time(1.0 + i as f64))
            .unwrap();
    }

    let first = play(&mut sim);
    sim.reset(0.0).unwrap();
    let reset_batches = sim.trace().unwrap().len();
    assert_eq!(reset_batches, 1, "one reset batch for the single queue");

    let mut replay = Simulation::new(sim.config().clone()).unwrap();
    replay.add_queue("fcfs", Box::new(Fcfs::single_server()));
    for i in 0..5 {
        replay
            .add_job(Job::new(format!("j{}", i)).with_service_time(1.0 + i as f64))
            .unwrap();
    }
    assert_eq!(play(&mut replay), first);
    assert_eq!(first.len(), 64);
}
