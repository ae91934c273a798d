//! Display state for received locations.
//!
//! The delivery context never touches [`Dashboard`] directly: it sends
//! [`UiEvent`]s over a channel and the single UI loop in [`run`] applies them.
//! Rendering is done through log lines.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::{LocationRecord, SpeedSample};

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    LinkUp,
    LinkDown,
    /// One-shot user-visible message, e.g. the broker could not be reached.
    Notice(String),
    Location {
        record: LocationRecord,
        speed: SpeedSample,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Bounds {
    fn around<'a>(mut points: impl Iterator<Item = &'a LocationRecord>) -> Option<Self> {
        let first = points.next()?;
        let init = Bounds {
            min_lat: first.latitude,
            min_lon: first.longitude,
            max_lat: first.latitude,
            max_lon: first.longitude,
        };
        Some(points.fold(init, |b, p| Bounds {
            min_lat: b.min_lat.min(p.latitude),
            min_lon: b.min_lon.min(p.longitude),
            max_lat: b.max_lat.max(p.latitude),
            max_lon: b.max_lon.max(p.longitude),
        }))
    }
}

#[derive(Debug, Default)]
pub struct Dashboard {
    points: Vec<LocationRecord>,
    speed_samples: Vec<SpeedSample>,
    connected: bool,
    last_notice: Option<String>,
}

impl Dashboard {
    /// Shows previously stored locations. Speed samples are not stored, so
    /// only the map is populated.
    pub fn load_stored(&mut self, records: Vec<LocationRecord>) {
        info!("Loaded {} stored locations", records.len());
        for record in records {
            self.add_point(record);
        }
    }

    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::LinkUp => {
                self.connected = true;
                info!("Broker link up");
            }
            UiEvent::LinkDown => {
                self.connected = false;
                warn!("Broker link down");
            }
            UiEvent::Notice(text) => {
                warn!("Notice: {}", text);
                self.last_notice = Some(text);
            }
            UiEvent::Location { record, speed } => {
                self.add_point(record);
                self.add_speed_sample(speed);
            }
        }
    }

    fn add_point(&mut self, record: LocationRecord) {
        info!(
            "Marker at ({}, {}) Student: {} Timestamp: {}",
            record.latitude, record.longitude, record.student_id, record.timestamp
        );
        debug!("Camera focus ({}, {})", record.latitude, record.longitude);
        self.points.push(record);

        if self.points.len() > 1 {
            debug!("Track polyline redrawn with {} points", self.points.len());
            if let Some(b) = self.bounds() {
                debug!(
                    "Camera fit to ({}, {}) - ({}, {})",
                    b.min_lat, b.min_lon, b.max_lat, b.max_lon
                );
            }
        }
    }

    fn add_speed_sample(&mut self, sample: SpeedSample) {
        info!(
            "{} min speed: {} max speed: {}",
            sample.student_id, sample.min_speed, sample.max_speed
        );
        self.speed_samples.push(sample);
    }

    pub fn points(&self) -> &[LocationRecord] {
        &self.points
    }

    pub fn speed_samples(&self) -> &[SpeedSample] {
        &self.speed_samples
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_notice(&self) -> Option<&str> {
        self.last_notice.as_deref()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::around(self.points.iter())
    }

    /// "Record selected" notification from the speed list. Nothing acts on it yet.
    #[allow(dead_code)]
    pub fn select(&self, index: usize) -> Option<&SpeedSample> {
        let sample = self.speed_samples.get(index)?;
        debug!("View more clicked for: {}", sample.student_id);
        Some(sample)
    }
}

/// UI loop: the only place the dashboard is mutated after startup. Returns
/// once every sender is gone.
pub async fn run(dashboard: &mut Dashboard, mut events: mpsc::Receiver<UiEvent>) {
    while let Some(event) = events.recv().await {
        dashboard.apply(event);
    }
    info!("Presentation channel closed");
}
