//! Behaviour of the simulated BLDS as seen through the client contract.

use std::sync::Arc;
use std::time::Duration;

use blds_client::{
    AddressSource, BldsClient, ClientError, Connector, ParamValue, ServerAddress, ServerParam,
    SimConfig, SimulatedServer, SourceParam, SourceType,
};

fn server() -> SimulatedServer {
    SimulatedServer::with_config(SimConfig {
        hosts: vec!["localhost".into()],
        latency: Duration::from_millis(10),
    })
}

async fn connect(server: &SimulatedServer) -> Arc<dyn BldsClient> {
    let addr = ServerAddress::parse("localhost", AddressSource::UserInput).unwrap();
    server.connector().connect(&addr).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn unknown_host_is_unreachable() {
    let server = server();
    let addr = ServerAddress::parse("nowhere.invalid", AddressSource::UserInput).unwrap();
    let err = server.connector().connect(&addr).await.err().unwrap();
    assert!(matches!(err, ClientError::Connection(_)));
    assert!(err.is_session_error());
}

#[tokio::test(start_paused = true)]
async fn source_and_recording_lifecycle() {
    let server = server();
    let client = connect(&server).await;

    let status = client.server_status().await.unwrap();
    assert!(!status.source_exists);
    assert_eq!(status.recording_length, 1000);

    client.create_source(SourceType::File, "/tmp/x.h5").await.unwrap();
    let status = client.server_status().await.unwrap();
    assert!(status.source_exists);
    assert_eq!(status.source_type, Some(SourceType::File));
    assert_eq!(status.source_location, "/tmp/x.h5");

    client.start_recording().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    let position = client.get(ServerParam::RecordingPosition).await.unwrap();
    assert!(position.as_f64().unwrap() >= 3.0);
    assert_eq!(
        client.get(ServerParam::RecordingExists).await.unwrap(),
        ParamValue::Bool(true)
    );

    client.stop_recording().await.unwrap();
    let status = client.server_status().await.unwrap();
    assert!(!status.recording_exists);
    assert_eq!(status.recording_position, 0.0);

    client.delete_source().await.unwrap();
    assert_eq!(
        client.get(ServerParam::SourceExists).await.unwrap(),
        ParamValue::Bool(false)
    );
}

#[tokio::test(start_paused = true)]
async fn recording_ends_at_its_length() {
    let server = server();
    let client = connect(&server).await;
    client.create_source(SourceType::Mcs, "").await.unwrap();
    client
        .set(ServerParam::RecordingLength, ParamValue::Int(2))
        .await
        .unwrap();
    client.start_recording().await.unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(
        client.get(ServerParam::RecordingExists).await.unwrap(),
        ParamValue::Bool(false)
    );
    assert!(client.server_status().await.unwrap().source_exists);
}

#[tokio::test(start_paused = true)]
async fn explicit_save_file_applies_to_one_recording() {
    let server = server();
    let client = connect(&server).await;
    client.create_source(SourceType::File, "/data/a.h5").await.unwrap();
    client
        .set(ServerParam::SaveFile, ParamValue::from("run-1.h5"))
        .await
        .unwrap();
    client.start_recording().await.unwrap();
    assert_eq!(
        client.get(ServerParam::SaveFile).await.unwrap(),
        ParamValue::from("run-1.h5")
    );
    client.stop_recording().await.unwrap();

    let next = client.get(ServerParam::SaveFile).await.unwrap();
    assert_ne!(next, ParamValue::from("run-1.h5"));
    assert!(next.as_text().unwrap().ends_with(".h5"));
}

#[tokio::test(start_paused = true)]
async fn server_rejects_illegal_requests() {
    let server = server();
    let client = connect(&server).await;

    let err = client.start_recording().await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)));

    let err = client.create_source(SourceType::Hidens, "  ").await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)));

    client.create_source(SourceType::File, "/tmp/x.h5").await.unwrap();
    let err = client.create_source(SourceType::File, "/tmp/y.h5").await.unwrap_err();
    assert_eq!(err, ClientError::Rejected("A data source already exists".into()));

    for bad in [0, 50_001, -3] {
        let err = client
            .set(ServerParam::RecordingLength, ParamValue::Int(bad))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected(_)), "length {bad}");
    }

    let err = client
        .set(ServerParam::RecordingExists, ParamValue::Bool(true))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("read-only"));

    client.start_recording().await.unwrap();
    assert!(matches!(
        client.delete_source().await,
        Err(ClientError::Rejected(_))
    ));
    assert!(matches!(
        client
            .set(ServerParam::RecordingLength, ParamValue::Int(10))
            .await,
        Err(ClientError::Rejected(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn save_directory_must_exist() {
    let server = server();
    let client = connect(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().display().to_string();

    client
        .set(ServerParam::SaveDirectory, ParamValue::Text(path.clone()))
        .await
        .unwrap();
    assert_eq!(server.status().await.save_directory, path);

    let missing = dir.path().join("missing").display().to_string();
    let err = client
        .set(ServerParam::SaveDirectory, ParamValue::Text(missing))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)));
}

#[tokio::test(start_paused = true)]
async fn source_parameters_depend_on_source_type() {
    let server = server();
    let client = connect(&server).await;

    assert!(!client.source_status().await.unwrap().exists);
    assert!(client.get_source(SourceParam::AdcRange).await.is_err());

    client.create_source(SourceType::File, "/tmp/x.h5").await.unwrap();
    let status = client.source_status().await.unwrap();
    assert!(status.exists);
    assert!(status.adc_range.is_some());
    assert_eq!(status.plug, None);
    assert!(client
        .set_source(SourceParam::Plug, ParamValue::Int(2))
        .await
        .is_err());

    client
        .set_source(SourceParam::AdcRange, ParamValue::Float(1.5))
        .await
        .unwrap();
    assert!(client
        .set_source(SourceParam::AdcRange, ParamValue::Float(11.0))
        .await
        .is_err());
    client
        .set_source(SourceParam::Trigger, ParamValue::from("photodiode"))
        .await
        .unwrap();
    client
        .set_source(SourceParam::AnalogOutput, ParamValue::Samples(vec![0.0, 0.5, 1.0]))
        .await
        .unwrap();

    let status = client.source_status().await.unwrap();
    assert_eq!(status.adc_range, Some(1.5));
    assert_eq!(status.trigger, Some(blds_client::Trigger::Photodiode));
    assert!(status.has_analog_output);

    client
        .set_source(SourceParam::AnalogOutput, ParamValue::Samples(Vec::new()))
        .await
        .unwrap();
    assert!(!client.source_status().await.unwrap().has_analog_output);
}

#[tokio::test(start_paused = true)]
async fn hidens_source_has_plug_and_configuration() {
    let server = server();
    let client = connect(&server).await;
    client.create_source(SourceType::Hidens, "hidens-rig").await.unwrap();

    client
        .set_source(SourceParam::Plug, ParamValue::Int(3))
        .await
        .unwrap();
    assert!(client
        .set_source(SourceParam::Plug, ParamValue::Int(5))
        .await
        .is_err());
    client
        .set_source(SourceParam::ConfigurationFile, ParamValue::from("/cfg/a.cmdraw.nrk2"))
        .await
        .unwrap();

    let status = client.source_status().await.unwrap();
    assert_eq!(status.plug, Some(3));
    assert_eq!(status.configuration_file.as_deref(), Some("/cfg/a.cmdraw.nrk2"));
}

#[tokio::test(start_paused = true)]
async fn sessions_share_server_state() {
    let server = server();
    let main = connect(&server).await;
    let settings = connect(&server).await;

    main.create_source(SourceType::File, "/tmp/x.h5").await.unwrap();
    assert!(settings.source_status().await.unwrap().exists);

    server.remove_source().await;
    assert_eq!(
        main.get(ServerParam::SourceExists).await.unwrap(),
        ParamValue::Bool(false)
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_broadcast_to_every_session() {
    let server = server();
    let a = connect(&server).await;
    let b = connect(&server).await;
    let mut errors_a = a.subscribe_errors();
    let mut errors_b = b.subscribe_errors();

    server.shutdown("BLDS restarting").await;

    assert_eq!(errors_a.recv().await.unwrap(), "BLDS restarting");
    assert_eq!(errors_b.recv().await.unwrap(), "BLDS restarting");
    let err = a.server_status().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}

#[tokio::test(start_paused = true)]
async fn disconnected_session_refuses_requests() {
    let server = server();
    let client = connect(&server).await;
    client.disconnect().await.unwrap();
    assert_eq!(
        client.get(ServerParam::SourceExists).await.unwrap_err(),
        ClientError::Disconnected
    );
}
