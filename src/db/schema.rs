//! Database schema definitions

// One row per calendar day that has seen a customer login
pub const CREATE_DAILY_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_login_stats (
    day_date TEXT PRIMARY KEY,                               -- YYYY-MM-DD, deployment timezone
    logins INTEGER NOT NULL DEFAULT 0 CHECK (logins >= 0),
    unique_logins INTEGER NOT NULL DEFAULT 0 CHECK (unique_logins >= 0)
)
"#;

// Last day each user earned a unique increment
pub const CREATE_LOGIN_MARKERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_login_markers (
    user_id TEXT PRIMARY KEY,
    last_login_day TEXT NOT NULL
)
"#;

// Host-owned user directory, read only. Roles are comma separated.
pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    login TEXT NOT NULL UNIQUE,
    roles TEXT NOT NULL DEFAULT ''
)
"#;

pub const DROP_DAILY_STATS_TABLE: &str = "DROP TABLE IF EXISTS daily_login_stats";

pub const DROP_LOGIN_MARKERS_TABLE: &str = "DROP TABLE IF EXISTS user_login_markers";
