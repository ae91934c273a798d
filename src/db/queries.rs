pub const CREATE_LOCATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    student_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);
"#;

pub const DROP_LOCATIONS: &str = r#"
DROP TABLE IF EXISTS locations;
"#;

pub const SELECT_USER_VERSION: &str = "PRAGMA user_version;";

pub const INSERT_LOCATION: &str = r#"
INSERT INTO locations (latitude, longitude, student_id, timestamp)
VALUES (?1, ?2, ?3, ?4);
"#;

pub const SELECT_ALL_LOCATIONS: &str = r#"
SELECT id, latitude, longitude, student_id, timestamp FROM locations ORDER BY id;
"#;

pub const COUNT_LOCATIONS: &str = r#"
SELECT COUNT(*) FROM locations;
"#;

pub const DELETE_ALL_LOCATIONS: &str = r#"
DELETE FROM locations;
"#;
