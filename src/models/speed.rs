pub const SPEED_UNIT: &str = "km/h";

/// Min/max speed pair shown in the speed list. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedSample {
    pub student_id: String,
    pub min_speed: String,
    pub max_speed: String,
}

impl SpeedSample {
    /// Builds a sample from raw digit strings, appending the unit suffix.
    pub fn new(student_id: impl Into<String>, min_digits: &str, max_digits: &str) -> Self {
        Self {
            student_id: student_id.into(),
            min_speed: format!("{} {}", min_digits, SPEED_UNIT),
            max_speed: format!("{} {}", max_digits, SPEED_UNIT),
        }
    }
}
