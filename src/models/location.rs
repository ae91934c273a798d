use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct LocationRecord {
    pub id: Option<i64>, // assigned on insert
    pub latitude: f64,
    pub longitude: f64,
    pub student_id: String,
    pub timestamp: i64, // epoch millis
}

impl LocationRecord {
    pub fn new(latitude: f64, longitude: f64, student_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: None,
            latitude,
            longitude,
            student_id: student_id.into(),
            timestamp,
        }
    }
}
