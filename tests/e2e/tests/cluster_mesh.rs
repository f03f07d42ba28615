//! Multi-node scenarios: service-name routing across the mesh, envelope
//! forwarding, codec variants, and node teardown.

use hive_codec::Codec;
use hive_e2e_tests::fixtures::{
    json, settle, Auth, Gate, Inspection, LoginReq, LoginResp, Mesh,
};
use hive_types::{ActorMessage, HiveError, Pid, SessionInfo};
use std::time::Duration;

fn caller(node: u64) -> Pid {
    Pid::local(node, 999)
}

#[tokio::test]
async fn cross_node_call_by_global_name() {
    let mesh = Mesh::new();
    let client = mesh.node(1, "gate").await;
    let server = mesh.node(2, "game").await;

    server.system.spawn(Auth::default(), Some("@auth")).unwrap();
    settle().await;

    let pid = client.cluster.gen_pid("auth", None).await.unwrap();
    assert_eq!(pid.node_id, 2);

    let out = client
        .system
        .call(
            caller(1),
            pid,
            "login",
            json(&LoginReq {
                user: "mia".into(),
                pass: "secret".into(),
            }),
            None,
        )
        .await
        .unwrap();
    let resp: LoginResp = serde_json::from_slice(&out).unwrap();
    assert_eq!(resp.token, "token-mia-1");
}

#[tokio::test]
async fn unknown_service_has_no_nodes() {
    let mesh = Mesh::new();
    let client = mesh.node(1, "gate").await;

    let err = client.cluster.gen_pid("mail", None).await.unwrap_err();
    assert!(matches!(err, HiveError::NoNodesForService { .. }));
}

#[tokio::test]
async fn forward_preserves_the_envelope_locally() {
    let mesh = Mesh::new();
    let node = mesh.node(1, "gate").await;

    let auth = node.system.spawn(Auth::default(), None).unwrap();
    let gate = node.system.spawn(Gate { upstream: auth }, None).unwrap();

    // "check" on the gate becomes "inspect" upstream; the report proves
    // the rewritten method ran with the original envelope intact
    let mut msg = ActorMessage::call(caller(1), gate, "check", b"payload".to_vec(), 0);
    msg.session = Some(SessionInfo::new(5, 66, 2));

    let out = node.system.call_message(msg).await.unwrap();
    let report: Inspection = serde_json::from_slice(&out).unwrap();
    assert_eq!(report.from, caller(1).to_string());
    assert_eq!(report.session, Some(SessionInfo::new(5, 66, 2)));
    assert_eq!(report.data, b"payload");
}

#[tokio::test]
async fn forward_preserves_the_envelope_across_nodes() {
    let mesh = Mesh::new();
    let edge = mesh.node(1, "gate").await;
    let core = mesh.node(2, "game").await;

    core.system.spawn(Auth::default(), Some("@auth")).unwrap();
    settle().await;

    let upstream = edge.cluster.gen_pid("auth", None).await.unwrap();
    let gate = edge.system.spawn(Gate { upstream }, None).unwrap();

    let mut msg = ActorMessage::call(caller(1), gate, "check", b"hop".to_vec(), 0);
    msg.session = Some(SessionInfo::new(9, 31, 7));

    let out = edge.system.call_message(msg).await.unwrap();
    let report: Inspection = serde_json::from_slice(&out).unwrap();
    // the original sender identity survived the bus hop
    assert_eq!(report.from, caller(1).to_string());
    assert_eq!(report.session, Some(SessionInfo::new(9, 31, 7)));
    assert_eq!(report.data, b"hop");
}

#[tokio::test]
async fn binary_codecs_carry_cluster_traffic() {
    for (base, codec) in [(10u64, Codec::MessagePack), (20u64, Codec::Bincode)] {
        let mesh = Mesh::new();
        let client = mesh.node_with_codec(base + 1, "gate", codec).await;
        let server = mesh.node_with_codec(base + 2, "game", codec).await;

        server.system.spawn(Auth::default(), Some("@auth")).unwrap();
        settle().await;

        let pid = client.cluster.gen_pid("auth", None).await.unwrap();
        let req = codec
            .marshal(&LoginReq {
                user: "kai".into(),
                pass: "pw".into(),
            })
            .unwrap();
        let out = client
            .system
            .call(caller(base + 1), pid, "login", req, None)
            .await
            .unwrap();
        let resp: LoginResp = codec.unmarshal(&out).unwrap();
        assert_eq!(resp.token, "token-kai-1", "codec {}", codec.name());
    }
}

#[tokio::test]
async fn shut_down_node_rejects_inbound_calls() {
    let mesh = Mesh::new();
    let client = mesh.node(1, "gate").await;
    let server = mesh.node(2, "game").await;

    let auth = server.system.spawn(Auth::default(), Some("@auth")).unwrap();
    server.system.shutdown(None).await;

    let err = client
        .system
        .call(caller(1), auth, "login", json(&LoginReq::default()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, HiveError::Remote { .. }));
    assert!(err.to_string().contains("shutting down"));
}

#[tokio::test]
async fn departed_node_is_a_transport_error() {
    let mesh = Mesh::new();
    let client = mesh.node(1, "gate").await;
    let server = mesh.node(2, "game").await;

    let auth = server.system.spawn(Auth::default(), Some("@auth")).unwrap();
    server.cluster.stop().await.unwrap();

    let err = client
        .system
        .call(
            caller(1),
            auth,
            "login",
            json(&LoginReq::default()),
            Some(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.category(), "transport");
}
