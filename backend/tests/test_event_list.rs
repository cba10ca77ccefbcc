//! Tests for the event list and run control
//!
//! Ordering of simultaneous events, cancellation, reset, and the
//! same-instant livelock guard.

use queueing_simulator_core_rs::{
    core::event_list::EventList, SimError, Simulation, SimulationConfig,
};
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

fn record(log: &Log, entry: &str) -> impl FnOnce(&mut Simulation, f64) -> Result<(), SimError> {
    let log = log.clone();
    let entry = entry.to_string();
    move |_, time| {
        log.borrow_mut().push(format!("{}@{}", entry, time));
        Ok(())
    }
}

#[test]
fn test_events_run_in_time_then_insertion_order() {
    let mut sim = Simulation::default();
    let log: Log = Rc::default();

    sim.schedule(2.0, record(&log, "c")).unwrap();
    sim.schedule(1.0, record(&log, "a")).unwrap();
    sim.schedule(1.0, record(&log, "b")).unwrap();
    sim.run().unwrap();

    assert_eq!(*log.borrow(), vec!["a@1", "b@1", "c@2"]);
    assert_eq!(sim.now(), 2.0);
}

#[test]
fn test_same_time_event_scheduled_during_run_goes_last() {
    let mut sim = Simulation::default();
    let log: Log = Rc::default();

    let inner = log.clone();
    sim.schedule(1.0, move |sim, time| {
        inner.borrow_mut().push(format!("first@{}", time));
        let nested = inner.clone();
        sim.schedule(time, move |_, t| {
            nested.borrow_mut().push(format!("nested@{}", t));
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();
    sim.schedule(1.0, record(&log, "second")).unwrap();
    sim.run().unwrap();

    assert_eq!(*log.borrow(), vec!["first@1", "second@1", "nested@1"]);
}

#[test]
fn test_schedule_in_past_is_rejected() {
    let mut sim = Simulation::default();
    sim.schedule(5.0, |sim, _| {
        match sim.schedule(4.0, |_, _| Ok(())) {
            Err(SimError::PastTime { time, now }) => {
                assert_eq!(time, 4.0);
                assert_eq!(now, 5.0);
                Ok(())
            }
            other => panic!("expected PastTime, got {:?}", other.map(|_| ())),
        }
    })
    .unwrap();
    sim.run().unwrap();
}

#[test]
fn test_cancel_before_and_after_execution() {
    let mut sim = Simulation::default();
    let log: Log = Rc::default();

    let cancelled = sim.schedule(1.0, record(&log, "cancelled")).unwrap();
    let kept = sim.schedule(2.0, record(&log, "kept")).unwrap();

    assert!(sim.cancel(cancelled));
    assert!(!sim.cancel(cancelled));
    sim.run().unwrap();

    assert!(!sim.is_pending(kept));
    assert!(!sim.cancel(kept), "cancelling an executed event reports false");
    assert_eq!(*log.borrow(), vec!["kept@2"]);
}

#[test]
fn test_run_until_stops_at_boundary() {
    let mut sim = Simulation::default();
    let log: Log = Rc::default();
    for t in [1.0, 2.0, 3.0] {
        sim.schedule(t, record(&log, "e")).unwrap();
    }

    sim.run_until(2.0).unwrap();
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(sim.next_event_time(), Some(3.0));

    assert_eq!(sim.step(), Ok(true));
    assert_eq!(sim.step(), Ok(false));
}

#[test]
fn test_reset_clears_pending_and_sets_time() {
    let mut sim = Simulation::default();
    sim.schedule(10.0, |_, _| Ok(())).unwrap();
    sim.reset(3.0).unwrap();

    assert_eq!(sim.pending_events(), 0);
    assert_eq!(sim.now(), 3.0);
    assert!(matches!(
        sim.schedule(2.0, |_, _| Ok(())),
        Err(SimError::PastTime { .. })
    ));

    assert!(matches!(sim.reset(f64::NAN), Err(SimError::IllegalArgument(_))));
}

#[test]
fn test_start_time_from_config() {
    let sim = Simulation::new(SimulationConfig {
        start_time: Some(-2.5),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(sim.now(), -2.5);
    assert_eq!(Simulation::default().now(), f64::NEG_INFINITY);
}

#[test]
fn test_infinite_time_events_run_last() {
    let mut sim = Simulation::default();
    let log: Log = Rc::default();
    sim.schedule(f64::INFINITY, record(&log, "end")).unwrap();
    sim.schedule(1000.0, record(&log, "late")).unwrap();
    sim.run().unwrap();

    assert_eq!(*log.borrow(), vec!["late@1000", "end@inf"]);
    assert_eq!(sim.now(), f64::INFINITY);
}

#[test]
fn test_plain_event_list_sequence_restarts_after_reset() {
    let mut events = EventList::new(0.0);
    let first = events.schedule(1.0, 'a').unwrap();
    events.reset(0.0).unwrap();
    let again = events.schedule(1.0, 'b').unwrap();
    assert_eq!(first.sequence(), again.sequence());
    assert_eq!(first, again);
}
