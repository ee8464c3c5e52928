use doorsync_core::{GatewayId, LockId, LockStatus};
use doorsync_proto::{TelemetryEvent, TopicScheme};
use doorsync_server::{MqttTransport, TransportConfig};
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

fn parse_mqtt_url(url: &str) -> (String, u16) {
    let url = url
        .strip_prefix("tcp://")
        .or_else(|| url.strip_prefix("mqtt://"))
        .unwrap_or(url);

    let parts: Vec<&str> = url.split(':').collect();

    let host = parts.first().copied().unwrap_or("localhost").to_string();
    let port = parts.get(1).and_then(|p| p.parse().ok()).unwrap_or(1883);

    (host, port)
}

async fn spawn_eventloop(mut eventloop: EventLoop) {
    loop {
        if eventloop.poll().await.is_err() {
            break;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn telemetry_roundtrip_through_broker() {
    if std::env::var("DOORSYNC_INTEGRATION").is_err() {
        eprintln!("Skipping integration test; set DOORSYNC_INTEGRATION=1 to run");
        return;
    }

    let broker =
        std::env::var("DOORSYNC_MQTT_BROKER").unwrap_or_else(|_| "tcp://localhost:1883".to_string());
    let (host, port) = parse_mqtt_url(&broker);

    let scheme = TopicScheme::default();
    let gateway = GatewayId::new(format!("it-{}", Uuid::new_v4())).unwrap();

    // Server side: transport subscribed to the fleet-wide wildcard.
    let config = TransportConfig {
        broker_url: broker.clone(),
        client_id: format!("doorsync-it-{}", Uuid::new_v4()),
        ..TransportConfig::default()
    };
    let (transport, eventloop) = MqttTransport::connect(&config).unwrap();
    transport
        .subscribe(&scheme.telemetry_wildcard())
        .await
        .unwrap();
    let mut inbound = transport.start(eventloop);

    // Device side: plain MQTT client publishing one telemetry event.
    let mut pub_opts = MqttOptions::new(format!("device-{}", Uuid::new_v4()), host, port);
    pub_opts.set_keep_alive(Duration::from_secs(5));
    let (pub_client, pub_eventloop) = AsyncClient::new(pub_opts, 10);
    tokio::spawn(spawn_eventloop(pub_eventloop));

    tokio::time::sleep(Duration::from_millis(200)).await;

    let event = TelemetryEvent::lock_state_changed(
        LockId(7),
        LockStatus::Unlocked,
        chrono::Utc::now(),
    );
    pub_client
        .publish(
            scheme.telemetry(&gateway),
            QoS::AtLeastOnce,
            false,
            event.to_json().unwrap(),
        )
        .await
        .unwrap();

    let received = timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("timeout waiting for MQTT message")
        .expect("transport stopped");

    let (parsed_gateway, _) = scheme.parse(&received.topic).unwrap();
    assert_eq!(parsed_gateway, gateway);

    let decoded = TelemetryEvent::from_json(&received.payload).unwrap();
    assert_eq!(decoded.lock_id, Some(LockId(7)));
    assert_eq!(decoded.status, Some(LockStatus::Unlocked));
}
