use crate::config::AppConfig;
use crate::db::LocationStore;
use crate::presentation::UiEvent;
use crate::processor::message_processor;
use anyhow::anyhow;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

/// Subscription link to the broker. The event loop is the delivery context:
/// payloads are processed there, in arrival order, and only handed to the UI
/// through the channel.
pub struct MqttSubscriber {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
    state: LinkState,
}

impl MqttSubscriber {
    pub fn new(config: &AppConfig) -> Self {
        let client_id = format!("location-tracker-{}", Uuid::new_v4());
        let mut mqttoptions = MqttOptions::new(client_id, &config.mqtt_broker, config.mqtt_port);
        mqttoptions.set_keep_alive(Duration::from_secs(config.mqtt_keep_alive_secs));
        if let (Some(user), Some(pass)) = (&config.mqtt_username, &config.mqtt_password) {
            mqttoptions.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(mqttoptions, config.mqtt_channel_capacity);

        Self {
            client,
            eventloop,
            topic: config.mqtt_topic.clone(),
            state: LinkState::Disconnected,
        }
    }

    /// Handle used to request a disconnect from outside the delivery task.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Runs until the link is closed. There is no reconnect: a failed connect
    /// or a dropped connection ends the loop.
    pub async fn run(mut self, store: LocationStore, ui: mpsc::Sender<UiEvent>) -> anyhow::Result<()> {
        self.client.subscribe(&self.topic, QoS::AtLeastOnce).await?;
        info!("Subscribing to {}", self.topic);

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Err(e) =
                        message_processor::process_message(&store, &publish.payload, &ui).await
                    {
                        warn!("Stopping subscriber: {:#}", e);
                        return Ok(());
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.state = LinkState::Connected;
                    info!("Connected to broker");
                    notify(&ui, UiEvent::LinkUp).await;
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    info!("Subscription to {} confirmed", self.topic);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    self.state = LinkState::Disconnected;
                    info!("Disconnected from broker");
                    notify(&ui, UiEvent::LinkDown).await;
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => {
                    return match self.state {
                        LinkState::Disconnected => {
                            error!("Error connecting to broker: {}", e);
                            notify(&ui, UiEvent::Notice(format!("Unable to reach broker: {}", e)))
                                .await;
                            Err(anyhow!("connect failed: {}", e))
                        }
                        LinkState::Connected => {
                            self.state = LinkState::Disconnected;
                            error!("MQTT connection lost: {}", e);
                            notify(&ui, UiEvent::LinkDown).await;
                            Err(anyhow!("connection lost: {}", e))
                        }
                    };
                }
            }
        }
    }
}

async fn notify(ui: &mpsc::Sender<UiEvent>, event: UiEvent) {
    if ui.send(event).await.is_err() {
        warn!("Presentation channel closed, dropping link event");
    }
}

/// Requests an orderly disconnect and waits for the subscriber task to end.
/// A task that already ended (e.g. the connect failed) has no link left to
/// close, so no disconnect is sent. Returns whether one was requested.
pub async fn shutdown(client: &AsyncClient, delivery: &mut JoinHandle<anyhow::Result<()>>) -> bool {
    let requested = !delivery.is_finished();
    if requested {
        if let Err(e) = client.disconnect().await {
            error!("Error disconnecting from broker: {}", e);
        }
    }

    match tokio::time::timeout(Duration::from_secs(5), &mut *delivery).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => warn!("Subscriber ended with error: {:#}", e),
        Ok(Err(e)) => error!("Subscriber task failed: {}", e),
        Err(_) => {
            warn!("Timed out waiting for disconnect");
            delivery.abort();
        }
    }
    requested
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memory_pool, migrate};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const TOPIC: &str = "assignment/location";
    const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

    fn config(port: u16) -> AppConfig {
        AppConfig {
            mqtt_broker: "127.0.0.1".to_string(),
            mqtt_port: port,
            mqtt_topic: TOPIC.to_string(),
            mqtt_username: None,
            mqtt_password: None,
            mqtt_keep_alive_secs: 30,
            mqtt_channel_capacity: 10,
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            ui_channel_capacity: 8,
            log_level: "info".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failed_connect_sends_one_notice_and_stops() {
        // bind then drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let pool = memory_pool().await;
        migrate(&pool).await.unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let subscriber = MqttSubscriber::new(&config(port));
        let result = subscriber.run(LocationStore::new(pool), tx).await;
        assert!(result.is_err());

        match rx.recv().await {
            Some(UiEvent::Notice(text)) => assert!(text.starts_with("Unable to reach broker")),
            other => panic!("unexpected event {:?}", other),
        }
        // sender dropped with the subscriber, nothing else queued
        assert_eq!(rx.recv().await, None);
    }

    async fn store() -> LocationStore {
        let pool = memory_pool().await;
        migrate(&pool).await.unwrap();
        LocationStore::new(pool)
    }

    /// Reads one MQTT control packet, returning its first header byte and body.
    async fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let header = stream.read_u8().await.unwrap();
        let mut len = 0usize;
        let mut shift = 0;
        loop {
            let byte = stream.read_u8().await.unwrap();
            len |= ((byte & 0x7f) as usize) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0; len];
        stream.read_exact(&mut body).await.unwrap();
        (header, body)
    }

    /// QoS 0 PUBLISH
    fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
        let mut remaining = 2 + topic.len() + payload.len();
        let mut packet = vec![0x30];
        loop {
            let mut byte = (remaining % 128) as u8;
            remaining /= 128;
            if remaining > 0 {
                byte |= 0x80;
            }
            packet.push(byte);
            if remaining == 0 {
                break;
            }
        }
        packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
        packet.extend_from_slice(topic.as_bytes());
        packet.extend_from_slice(payload);
        packet
    }

    /// Accepts one client and answers CONNECT and SUBSCRIBE.
    async fn accept_and_subscribe(listener: &TcpListener) -> TcpStream {
        let (mut stream, _) = listener.accept().await.unwrap();

        let (header, _) = read_packet(&mut stream).await;
        assert_eq!(header, 0x10, "expected CONNECT");
        stream.write_all(&CONNACK).await.unwrap();

        let (header, body) = read_packet(&mut stream).await;
        assert_eq!(header, 0x82, "expected SUBSCRIBE");
        stream
            .write_all(&[0x90, 0x03, body[0], body[1], 0x01])
            .await
            .unwrap();
        stream
    }

    #[tokio::test]
    async fn test_publish_is_stored_and_forwarded_then_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let broker = tokio::spawn(async move {
            let mut stream = accept_and_subscribe(&listener).await;
            stream
                .write_all(&publish_packet(
                    TOPIC,
                    b"Latitude: 43.47, Longitude: -80.54, StudentID: abc123, MinSpeed: 10 km/h, MaxSpeed: 40 km/h",
                ))
                .await
                .unwrap();
            // hold the socket open until the client goes away
            let _ = stream.read_u8().await;
        });

        let store = store().await;
        let (tx, mut rx) = mpsc::channel(8);
        let subscriber = MqttSubscriber::new(&config(port));
        let client = subscriber.client();
        let mut delivery = tokio::spawn(subscriber.run(store.clone(), tx));

        assert_eq!(rx.recv().await, Some(UiEvent::LinkUp));
        match rx.recv().await {
            Some(UiEvent::Location { record, speed }) => {
                assert_eq!(record.id, Some(1));
                assert_eq!(record.latitude, 43.47);
                assert_eq!(record.longitude, -80.54);
                assert_eq!(record.student_id, "abc123");
                assert_eq!(speed.min_speed, "10 km/h");
                assert_eq!(speed.max_speed, "40 km/h");
            }
            other => panic!("unexpected event {:?}", other),
        }

        assert!(shutdown(&client, &mut delivery).await);
        assert_eq!(rx.recv().await, Some(UiEvent::LinkDown));
        assert_eq!(rx.recv().await, None);
        assert_eq!(store.count().await.unwrap(), 1);

        broker.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_lost_after_connect_sends_link_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let broker = tokio::spawn(async move {
            let stream = accept_and_subscribe(&listener).await;
            drop(stream);
        });

        let (tx, mut rx) = mpsc::channel(8);
        let subscriber = MqttSubscriber::new(&config(port));
        let result = subscriber.run(store().await, tx).await;
        broker.await.unwrap();

        assert!(result.is_err());
        assert_eq!(rx.recv().await, Some(UiEvent::LinkUp));
        assert_eq!(rx.recv().await, Some(UiEvent::LinkDown));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_shutdown_skips_disconnect_after_failed_connect() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let (tx, mut rx) = mpsc::channel(8);
        let subscriber = MqttSubscriber::new(&config(port));
        let client = subscriber.client();
        let mut delivery = tokio::spawn(subscriber.run(store().await, tx));

        // the notice arrives, then the channel closes when the task ends
        assert!(matches!(rx.recv().await, Some(UiEvent::Notice(_))));
        assert_eq!(rx.recv().await, None);
        while !delivery.is_finished() {
            tokio::task::yield_now().await;
        }

        assert!(!shutdown(&client, &mut delivery).await);
    }
}
