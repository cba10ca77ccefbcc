//! End-to-end tests for JSON scenarios

use queueing_simulator_core_rs::{
    Credits, JobPhase, NotificationKind, Scenario, ScenarioConfig, SimError, StartModel,
};

fn departures(scenario: &Scenario, queue: &str) -> Vec<f64> {
    let queue = scenario.queue(queue).unwrap();
    scenario
        .simulation()
        .trace()
        .unwrap()
        .for_queue(queue)
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Departure)
        .map(|n| n.time)
        .collect()
}

/// Jobs 1..=10 requesting service i, arriving at time i at `queue`
fn stream_json(queue: &str) -> (String, String) {
    let jobs: Vec<String> = (1..=10)
        .map(|i| format!(r#"{{"name": "j{}", "service_time": {}.0}}"#, i, i))
        .collect();
    let stimuli: Vec<String> = (1..=10)
        .map(|i| {
            format!(
                r#"{{"at": {}.0, "event": {{"type": "arrival", "queue": "{}", "job": "j{}"}}}}"#,
                i, queue, i
            )
        })
        .collect();
    (jobs.join(","), stimuli.join(","))
}

#[test]
fn test_fcfs_scenario() {
    let (jobs, stimuli) = stream_json("desk");
    let json = format!(
        r#"{{
            "simulation": {{ "record_trace": true }},
            "queues": [{{ "name": "desk", "type": "fcfs" }}],
            "jobs": [{}],
            "stimuli": [{}]
        }}"#,
        jobs, stimuli
    );

    let mut scenario = Scenario::from_json(&json).unwrap();
    scenario.simulation_mut().run().unwrap();

    assert_eq!(
        departures(&scenario, "desk"),
        vec![2.0, 4.0, 7.0, 11.0, 16.0, 22.0, 29.0, 37.0, 46.0, 56.0]
    );
}

#[test]
fn test_compressed_tandem_scenario() {
    let (jobs, stimuli) = stream_json("ct");
    let json = format!(
        r#"{{
            "simulation": {{ "record_trace": true }},
            "queues": [
                {{ "name": "wait", "type": "lifo", "servers": null }},
                {{ "name": "serve", "type": "fcfs" }},
                {{ "name": "ct", "type": "compressed_tandem", "wait": "wait", "serve": "serve" }}
            ],
            "jobs": [{}],
            "stimuli": [{}]
        }}"#,
        jobs, stimuli
    );

    let mut scenario = Scenario::from_json(&json).unwrap();
    let ct = scenario.queue("ct").unwrap();
    assert_eq!(
        scenario.simulation().start_model(ct),
        Some(StartModel::CompressedTandem2)
    );
    scenario.simulation_mut().run().unwrap();

    let serve_departures = departures(&scenario, "serve");
    assert_eq!(
        serve_departures,
        vec![2.0, 4.0, 8.0, 16.0, 26.0, 35.0, 42.0, 48.0, 53.0, 56.0]
    );
    assert_eq!(departures(&scenario, "ct"), serve_departures);
}

#[test]
fn test_vacation_and_credit_stimuli() {
    let json = r#"{
        "simulation": { "record_trace": true },
        "queues": [{ "name": "sink", "type": "sink" }, { "name": "desk", "type": "fcfs" }],
        "jobs": [
            { "name": "early", "service_time": 1.0 },
            { "name": "during", "service_time": 1.0 },
            { "name": "late", "service_time": 1.0, "per_queue": { "desk": 4.0 } }
        ],
        "stimuli": [
            { "at": 1.0, "event": { "type": "access_vacation", "queue": "sink", "on": true } },
            { "at": 0.5, "event": { "type": "arrival", "queue": "sink", "job": "early" } },
            { "at": 2.0, "event": { "type": "arrival", "queue": "sink", "job": "during" } },
            { "at": 3.0, "event": { "type": "access_vacation", "queue": "sink", "on": false } },
            { "at": 0.0, "event": { "type": "server_access_credits", "queue": "desk", "credits": { "finite": 0 } } },
            { "at": 4.0, "event": { "type": "arrival", "queue": "desk", "job": "late" } },
            { "at": 6.0, "event": { "type": "server_access_credits", "queue": "desk", "credits": "infinite" } }
        ]
    }"#;

    let mut scenario = Scenario::from_json(json).unwrap();
    scenario.simulation_mut().run().unwrap();

    let sim = scenario.simulation();
    let sink = scenario.queue("sink").unwrap();
    let drops = sim.trace().unwrap().of_kind(NotificationKind::Drop);
    assert_eq!(drops.len(), 1);
    assert_eq!(drops[0].job, scenario.job("during"));
    assert!(sim.queue(sink).unwrap().contains(scenario.job("early").unwrap()));

    assert_eq!(departures(&scenario, "desk"), vec![10.0]);
    let desk = scenario.queue("desk").unwrap();
    assert_eq!(sim.queue(desk).unwrap().server_access_credits(), Credits::Infinite);
}

#[test]
fn test_revocation_and_auto_revocation_config() {
    let json = r#"{
        "queues": [
            { "name": "slow", "type": "fcfs" },
            { "name": "instant", "type": "fcfs", "auto_revocation": "upon_start" }
        ],
        "jobs": [{ "name": "a", "service_time": 100.0 }, { "name": "b", "service_time": 100.0 }],
        "stimuli": [
            { "at": 0.0, "event": { "type": "arrival", "queue": "slow", "job": "a" } },
            { "at": 1.0, "event": { "type": "revocation", "queue": "slow", "job": "a" } },
            { "at": 2.0, "event": { "type": "revocation", "queue": "slow", "job": "a", "interrupt_service": true } },
            { "at": 3.0, "event": { "type": "arrival", "queue": "instant", "job": "b" } }
        ]
    }"#;

    let mut scenario = Scenario::from_json(json).unwrap();
    let slow = scenario.queue("slow").unwrap();
    let a = scenario.job("a").unwrap();

    scenario.simulation_mut().run_until(1.5).unwrap();
    assert_eq!(
        scenario.simulation().queue(slow).unwrap().phase(a),
        Some(JobPhase::InService)
    );

    scenario.simulation_mut().run().unwrap();
    let sim = scenario.into_simulation();
    assert_eq!(sim.queue(slow).unwrap().number_of_jobs(), 0);
    assert!(sim.job(a).unwrap().current_queue().is_none());
    assert_eq!(sim.now(), 3.0);
    assert_eq!(sim.pending_events(), 0);
}

#[test]
fn test_gate_and_network_scenario() {
    let json = r#"{
        "simulation": { "record_trace": true },
        "queues": [
            { "name": "gate", "type": "gate" },
            { "name": "a", "type": "infinite_server" },
            { "name": "b", "type": "infinite_server" },
            { "name": "split", "type": "parallel", "sub_queues": ["a", "b"] },
            { "name": "loop_body", "type": "zero" },
            { "name": "loop", "type": "feedback", "sub_queue": "loop_body", "visits": 4 }
        ],
        "jobs": [{ "name": "x", "service_time": 2.0 }, { "name": "y", "service_time": 3.0 }],
        "stimuli": [
            { "at": 0.0, "event": { "type": "gate_passage_credits", "queue": "gate", "credits": { "finite": 0 } } },
            { "at": 1.0, "event": { "type": "arrival", "queue": "gate", "job": "x" } },
            { "at": 5.0, "event": { "type": "gate_passage_credits", "queue": "gate", "credits": { "finite": 1 } } },
            { "at": 6.0, "event": { "type": "arrival", "queue": "split", "job": "x" } },
            { "at": 6.0, "event": { "type": "arrival", "queue": "split", "job": "y" } },
            { "at": 10.0, "event": { "type": "arrival", "queue": "loop", "job": "x" } }
        ]
    }"#;

    let mut scenario = Scenario::from_json(json).unwrap();
    scenario.simulation_mut().run().unwrap();

    assert_eq!(departures(&scenario, "gate"), vec![5.0]);
    assert_eq!(departures(&scenario, "split"), vec![8.0, 9.0]);
    assert_eq!(departures(&scenario, "a"), vec![8.0]);
    assert_eq!(departures(&scenario, "b"), vec![9.0]);
    assert_eq!(departures(&scenario, "loop_body").len(), 4);
    assert_eq!(departures(&scenario, "loop"), vec![10.0]);
}

#[test]
fn test_config_round_trips_through_serde() {
    let json = r#"{
        "simulation": { "start_time": 0.0, "max_transitions_per_instant": 10 },
        "queues": [{ "name": "q", "type": "random_order", "servers": 2, "seed": 9 }],
        "jobs": [{ "name": "j" }]
    }"#;
    let config: ScenarioConfig = serde_json::from_str(json).unwrap();
    let again: ScenarioConfig =
        serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
    assert_eq!(config, again);

    let scenario = Scenario::build(&config).unwrap();
    assert_eq!(scenario.simulation().now(), 0.0);
    assert_eq!(scenario.simulation().config().max_transitions_per_instant, 10);
}

#[test]
fn test_bad_stimuli_are_config_errors() {
    let unknown_job = r#"{
        "queues": [{ "name": "q", "type": "sink" }],
        "stimuli": [{ "at": 1.0, "event": { "type": "arrival", "queue": "q", "job": "ghost" } }]
    }"#;
    match Scenario::from_json(unknown_job) {
        Err(SimError::Config(msg)) => assert!(msg.contains("unknown job 'ghost'"), "{}", msg),
        other => panic!("expected config error, got {:?}", other.map(|_| ())),
    }

    let sub_queue_target = r#"{
        "queues": [{ "name": "a", "type": "sink" }, { "name": "t", "type": "tandem", "sub_queues": ["a"] }],
        "jobs": [{ "name": "j" }],
        "stimuli": [{ "at": 1.0, "event": { "type": "arrival", "queue": "a", "job": "j" } }]
    }"#;
    match Scenario::from_json(sub_queue_target) {
        Err(SimError::Config(msg)) => assert!(msg.starts_with("stimulus at 1"), "{}", msg),
        other => panic!("expected config error, got {:?}", other.map(|_| ())),
    }

    let not_a_gate = r#"{
        "queues": [{ "name": "q", "type": "fcfs" }],
        "stimuli": [{ "at": 0.0, "event": { "type": "gate_passage_credits", "queue": "q", "credits": "infinite" } }]
    }"#;
    assert!(matches!(Scenario::from_json(not_a_gate), Err(SimError::Config(_))));

    let bad_config = r#"{ "simulation": { "max_transitions_per_instant": 0 }, "queues": [] }"#;
    assert!(matches!(Scenario::from_json(bad_config), Err(SimError::Config(_))));
}
