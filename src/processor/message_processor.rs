use crate::db::LocationStore;
use crate::models::{LocationRecord, SpeedSample, TelemetryMessage};
use crate::presentation::UiEvent;
use anyhow::Context;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

pub const UNKNOWN_STUDENT: &str = "Unknown";
pub const NO_SPEED: &str = "0";

/// Handles one payload from the subscription. Rejected payloads are logged
/// and dropped; the only error returned is a closed presentation channel.
pub async fn process_message(
    store: &LocationStore,
    payload: &[u8],
    ui: &mpsc::Sender<UiEvent>,
) -> anyhow::Result<()> {
    // 1. Decode
    let text = match std::str::from_utf8(payload) {
        Ok(t) => t,
        Err(e) => {
            warn!("Dropping payload that is not UTF-8: {}", e);
            return Ok(());
        }
    };
    if text.trim().is_empty() {
        warn!("Received empty payload");
        return Ok(());
    }
    debug!("Received message: {}", text);

    // 2. Parse
    let message = match TelemetryMessage::parse(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("Invalid location data ({}): {}", e, text);
            return Ok(());
        }
    };

    let (mut record, speed) = with_fallbacks(message, Utc::now().timestamp_millis());

    // 3. Persist, best effort
    match store.insert(&record).await {
        Ok(id) => record.id = Some(id),
        Err(e) => error!(
            "Failed to persist location for {}: {:#}",
            record.student_id, e
        ),
    }

    // 4. Hand off to the UI context
    ui.send(UiEvent::Location { record, speed })
        .await
        .context("presentation channel closed")?;

    Ok(())
}

fn with_fallbacks(message: TelemetryMessage, timestamp: i64) -> (LocationRecord, SpeedSample) {
    let student_id = message
        .student_id
        .unwrap_or_else(|| UNKNOWN_STUDENT.to_string());
    let speed = SpeedSample::new(
        student_id.clone(),
        message.min_speed.as_deref().unwrap_or(NO_SPEED),
        message.max_speed.as_deref().unwrap_or(NO_SPEED),
    );
    let record = LocationRecord::new(message.latitude, message.longitude, student_id, timestamp);
    (record, speed)
}
