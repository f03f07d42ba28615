//! Boot a node the production way: settings file in, running overlay out.

use hive_actors::System;
use hive_cluster::{bus_from_settings, discovery_from_settings, Cluster, ClusterOptions};
use hive_codec::Codec;
use hive_config::load_settings;
use hive_e2e_tests::fixtures::{settle, Auth, LoginReq, LoginResp};
use hive_types::Pid;
use std::fs;

#[tokio::test]
async fn node_boots_from_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("node.toml");
    fs::write(
        &path,
        r#"
[node]
id = 5
kind = "game"
address = "127.0.0.1"
port = 7105

[logger]
level = "warn"

[cluster]
name = "dev"
codec = "messagepack"

[cluster.discovery]
provider = "memory"

[cluster.message_queue]
provider = "memory"
"#,
    )
    .unwrap();

    let settings = load_settings(Some(&path)).unwrap();
    let cluster_settings = settings.cluster.clone().unwrap();
    assert_eq!(cluster_settings.codec, Codec::MessagePack);

    let system = System::new(settings.node.id, cluster_settings.codec);
    let cluster = Cluster::start(
        system.clone(),
        settings.node.to_member(),
        discovery_from_settings(&cluster_settings.discovery).unwrap(),
        bus_from_settings(&cluster_settings.message_queue).unwrap(),
        ClusterOptions::from_settings(&cluster_settings),
    )
    .await
    .unwrap();

    system.spawn(Auth::default(), Some("@auth")).unwrap();
    settle().await;

    // a single-node mesh resolves its own service tag
    let pid = cluster.gen_pid("auth", None).await.unwrap();
    assert_eq!(pid.node_id, 5);

    let codec = system.codec();
    let req = codec
        .marshal(&LoginReq {
            user: "solo".into(),
            pass: "pw".into(),
        })
        .unwrap();
    let out = system
        .call(Pid::local(5, 999), pid, "login", req, None)
        .await
        .unwrap();
    let resp: LoginResp = codec.unmarshal(&out).unwrap();
    assert_eq!(resp.token, "token-solo-1");

    system.shutdown(None).await;
}
