//! Login sessions
//!
//! Validation reads the session and bumps its last-validated timestamp in
//! the same write scope, so concurrent validations cannot lose an update.

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Open a session for a user. Returns the session id.
pub fn create_login_session(conn: &Connection, user_id: i32, ip_address: Option<&str>) -> Result<Uuid> {
    let session_id = Uuid::new_v4();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO user_login (session_id, user_id, logged_in_utc, last_validated_utc, ip_address) \
         VALUES (?1, ?2, ?3, ?3, ?4)",
        params![session_id.to_string(), user_id, now, ip_address],
    )?;
    tracing::debug!("Created login session for user {}", user_id);
    Ok(session_id)
}

/// Whether the session is open and belongs to `user_id`. A valid session
/// gets its last-validated timestamp refreshed.
pub fn validate_login_session(conn: &Connection, user_id: i32, session_id: Uuid) -> Result<bool> {
    let row: Option<(i32, Option<DateTime<Utc>>)> = conn
        .query_row(
            "SELECT user_id, logged_out_utc FROM user_login WHERE session_id = ?1",
            params![session_id.to_string()],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    match row {
        Some((owner, None)) if owner == user_id => {
            conn.execute(
                "UPDATE user_login SET last_validated_utc = ?2 WHERE session_id = ?1",
                params![session_id.to_string(), Utc::now()],
            )?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Log a session out. Returns false when it was unknown or already closed.
pub fn clear_login_session(conn: &Connection, session_id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE user_login SET logged_out_utc = ?2 WHERE session_id = ?1 AND logged_out_utc IS NULL",
        params![session_id.to_string(), Utc::now()],
    )?;
    Ok(changed > 0)
}

/// Delete sessions not validated since `cutoff`. Returns how many.
pub fn clear_login_sessions_older_than(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM user_login WHERE last_validated_utc < ?1",
        params![cutoff],
    )?;
    if deleted > 0 {
        tracing::info!("Removed {} stale login session(s)", deleted);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::database::Database;
    use chrono::Duration;

    #[test]
    fn test_session_lifecycle() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        let session = create_login_session(conn, 7, Some("127.0.0.1")).unwrap();
        assert!(validate_login_session(conn, 7, session).unwrap());
        assert!(!validate_login_session(conn, 8, session).unwrap());
        assert!(!validate_login_session(conn, 7, Uuid::new_v4()).unwrap());

        assert!(clear_login_session(conn, session).unwrap());
        assert!(!clear_login_session(conn, session).unwrap());
        assert!(!validate_login_session(conn, 7, session).unwrap());
    }

    #[test]
    fn test_clear_old_sessions() {
        let db = Database::open_in_memory(EngineConfig::default()).unwrap();
        let conn = db.connection();
        create_login_session(conn, 1, None).unwrap();
        assert_eq!(clear_login_sessions_older_than(conn, Utc::now() - Duration::hours(1)).unwrap(), 0);
        assert_eq!(clear_login_sessions_older_than(conn, Utc::now() + Duration::hours(1)).unwrap(), 1);
    }
}
