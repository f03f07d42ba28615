//! Single-node scenarios: async sends, sync calls, call deadlines, and
//! the naming rules.

use hive_actors::System;
use hive_codec::Codec;
use hive_e2e_tests::fixtures::{json, AddReq, AddResp, Auth, Calc, Greet, GreetStats, Greeter};
use hive_types::{HiveError, Pid};
use std::time::Duration;

fn caller() -> Pid {
    Pid::local(1, 999)
}

#[tokio::test]
async fn async_send_mutates_actor_state() {
    let system = System::new(1, Codec::Json);
    let pid = system.spawn(Greeter::default(), Some("greeter")).unwrap();

    system
        .send(caller(), pid.clone(), "greet", json(&Greet { who: "mia".into() }))
        .await
        .unwrap();
    system
        .send(caller(), pid.clone(), "greet", json(&Greet { who: "noah".into() }))
        .await
        .unwrap();

    // same sender, same mailbox: the call drains after both sends
    let out = system
        .call(caller(), pid, "stats", json(&Greet::default()), None)
        .await
        .unwrap();
    let stats: GreetStats = serde_json::from_slice(&out).unwrap();
    assert_eq!(stats.greeted, 2);
    assert_eq!(stats.last, "noah");
}

#[tokio::test]
async fn sync_call_returns_the_handler_reply() {
    let system = System::new(1, Codec::Json);
    let pid = system.spawn(Calc, Some("calc")).unwrap();

    let out = system
        .call(caller(), pid, "add", json(&AddReq { a: 2, b: 3 }), None)
        .await
        .unwrap();
    let resp: AddResp = serde_json::from_slice(&out).unwrap();
    assert_eq!(resp.sum, 5);

    // name-only addressing hits the same process
    let out = system
        .call(
            caller(),
            Pid::named(0, "calc"),
            "add",
            json(&AddReq { a: 40, b: 2 }),
            None,
        )
        .await
        .unwrap();
    let resp: AddResp = serde_json::from_slice(&out).unwrap();
    assert_eq!(resp.sum, 42);
}

#[tokio::test]
async fn call_deadline_fires_before_a_slow_handler() {
    let system = System::new(1, Codec::Json);
    let pid = system.spawn(Calc, None).unwrap();

    let err = system
        .call(
            caller(),
            pid.clone(),
            "slow_add",
            json(&AddReq { a: 1, b: 1 }),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert!(err.is_deadline());

    // the late reply is dropped; the actor stays responsive
    let out = system
        .call(caller(), pid, "add", json(&AddReq { a: 1, b: 1 }), None)
        .await
        .unwrap();
    let resp: AddResp = serde_json::from_slice(&out).unwrap();
    assert_eq!(resp.sum, 2);
}

#[tokio::test]
async fn registration_names_are_unique_per_node() {
    let system = System::new(1, Codec::Json);
    let first = system.spawn(Auth::default(), Some("@auth")).unwrap();

    let err = system.spawn(Auth::default(), Some("@auth")).unwrap_err();
    assert!(matches!(err, HiveError::NameAlreadyRegistered { .. }));
    // the plain spelling collides with the marked one
    let err = system.spawn(Auth::default(), Some("auth")).unwrap_err();
    assert!(matches!(err, HiveError::NameAlreadyRegistered { .. }));

    // the original binding is untouched and write-once
    assert_eq!(
        system.pid_of("auth").unwrap().service_id,
        first.service_id
    );
    let err = system.register_name(&first, "auth2").unwrap_err();
    assert!(matches!(err, HiveError::NameChangeNotAllowed { .. }));
}

#[tokio::test]
async fn stopped_process_is_unreachable() {
    let system = System::new(1, Codec::Json);
    let pid = system.spawn(Calc, Some("calc")).unwrap();

    system.stop(&pid).await.unwrap();
    assert!(system.pid_of("calc").is_none());

    let err = system
        .call(caller(), pid, "add", json(&AddReq::default()), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HiveError::ProcessNotFound { .. } | HiveError::ProcessExiting { .. }
    ));
}
