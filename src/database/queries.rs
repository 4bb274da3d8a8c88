use rusqlite::{params, Connection};

use crate::database::tables::*;
use crate::database::types::{voice_actor_id, NewWork, Progress};
use crate::errors::HvcError;

/// Insert a circle
pub fn insert_circle(conn: &Connection, id: i64, name: &str) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!("INSERT INTO {DB_CIRCLE_NAME} (id, name) VALUES (?1, ?2)"),
        params![id, name],
    )?;
    Ok(rows)
}

/// Insert a work. Its circle must already exist.
pub fn insert_work(conn: &Connection, work: &NewWork) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!(
            "INSERT INTO {DB_WORK_NAME}
             (id, root_folder, dir, title, circle_id, nsfw, \"release\", dl_count, price,
              review_count, rate_count, rate_average_2dp, rate_count_detail, rank)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            work.id,
            work.root_folder,
            work.dir,
            work.title,
            work.circle_id,
            work.nsfw,
            work.release,
            work.dl_count,
            work.price,
            work.review_count,
            work.rate_count,
            work.rate_average_2dp,
            work.rate_count_detail,
            work.rank,
        ],
    )?;
    Ok(rows)
}

/// Stamp a work with the current time (needs the insert_time column)
pub fn touch_work_insert_time(conn: &Connection, work_id: i64) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!("UPDATE {DB_WORK_NAME} SET insert_time = CURRENT_TIMESTAMP WHERE id = ?1"),
        params![work_id],
    )?;
    Ok(rows)
}

/// Delete a work; voice actor links, reviews and history go with it
pub fn delete_work(conn: &Connection, work_id: i64) -> Result<usize, HvcError> {
    let rows = conn.execute(&format!("DELETE FROM {DB_WORK_NAME} WHERE id = ?1"), params![work_id])?;
    Ok(rows)
}

/// Insert a tag
pub fn insert_tag(conn: &Connection, id: i64, name: &str) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!("INSERT INTO {DB_TAG_NAME} (id, name) VALUES (?1, ?2)"),
        params![id, name],
    )?;
    Ok(rows)
}

/// Delete a tag. Fails while works still link to it.
pub fn delete_tag(conn: &Connection, tag_id: i64) -> Result<usize, HvcError> {
    let rows = conn.execute(&format!("DELETE FROM {DB_TAG_NAME} WHERE id = ?1"), params![tag_id])?;
    Ok(rows)
}

pub fn link_tag(conn: &Connection, tag_id: i64, work_id: i64) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!("INSERT OR IGNORE INTO {DB_TAG_WORK_NAME} (tag_id, work_id) VALUES (?1, ?2)"),
        params![tag_id, work_id],
    )?;
    Ok(rows)
}

pub fn unlink_tag(conn: &Connection, tag_id: i64, work_id: i64) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!("DELETE FROM {DB_TAG_WORK_NAME} WHERE tag_id = ?1 AND work_id = ?2"),
        params![tag_id, work_id],
    )?;
    Ok(rows)
}

/// Insert a voice actor under the id derived from its name, returning the id
pub fn insert_voice_actor(conn: &Connection, name: &str) -> Result<String, HvcError> {
    let id = voice_actor_id(name);
    conn.execute(
        &format!("INSERT OR IGNORE INTO {DB_VA_NAME} (id, name) VALUES (?1, ?2)"),
        params![id, name],
    )?;
    Ok(id)
}

/// Insert a voice actor with an explicit id
pub fn insert_voice_actor_with_id(conn: &Connection, id: &str, name: &str) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!("INSERT INTO {DB_VA_NAME} (id, name) VALUES (?1, ?2)"),
        params![id, name],
    )?;
    Ok(rows)
}

/// Delete a voice actor; its work links are pruned
pub fn delete_voice_actor(conn: &Connection, va_id: &str) -> Result<usize, HvcError> {
    let rows = conn.execute(&format!("DELETE FROM {DB_VA_NAME} WHERE id = ?1"), params![va_id])?;
    Ok(rows)
}

pub fn link_voice_actor(conn: &Connection, va_id: &str, work_id: i64) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!("INSERT OR IGNORE INTO {DB_VA_WORK_NAME} (va_id, work_id) VALUES (?1, ?2)"),
        params![va_id, work_id],
    )?;
    Ok(rows)
}

pub fn unlink_voice_actor(conn: &Connection, va_id: &str, work_id: i64) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!("DELETE FROM {DB_VA_WORK_NAME} WHERE va_id = ?1 AND work_id = ?2"),
        params![va_id, work_id],
    )?;
    Ok(rows)
}

/// Insert a series (needs the t_series table)
pub fn insert_series(conn: &Connection, id: i64, name: Option<&str>) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!("INSERT INTO {DB_SERIES_NAME} (id, name) VALUES (?1, ?2)"),
        params![id, name],
    )?;
    Ok(rows)
}

/// Attach a work to a series, or detach it with `None`
pub fn set_work_series(conn: &Connection, work_id: i64, series_id: Option<i64>) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!("UPDATE {DB_WORK_NAME} SET series_id = ?1 WHERE id = ?2"),
        params![series_id, work_id],
    )?;
    Ok(rows)
}

pub fn insert_user(conn: &Connection, name: &str, password: &str, group: &str) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!("INSERT INTO {DB_USER_NAME} (name, password, \"group\") VALUES (?1, ?2, ?3)"),
        params![name, password, group],
    )?;
    Ok(rows)
}

pub fn delete_user(conn: &Connection, name: &str) -> Result<usize, HvcError> {
    let rows = conn.execute(&format!("DELETE FROM {DB_USER_NAME} WHERE name = ?1"), params![name])?;
    Ok(rows)
}

/// Create or update a user's review of a work
pub fn upsert_review(
    conn: &Connection,
    user_name: &str,
    work_id: i64,
    rating: Option<u8>,
    review_text: Option<&str>,
    progress: Option<Progress>,
) -> Result<usize, HvcError> {
    if let Some(r) = rating {
        if !(1..=5).contains(&r) {
            return Err(HvcError::ConstraintViolation(format!("rating {r} is outside 1-5")));
        }
    }
    let rows = conn.execute(
        &format!(
            "INSERT INTO {DB_REVIEW_NAME} (user_name, work_id, rating, review_text, progress)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_name, work_id) DO UPDATE SET
                 rating = excluded.rating,
                 review_text = excluded.review_text,
                 progress = excluded.progress,
                 updated_at = CURRENT_TIMESTAMP"
        ),
        params![user_name, work_id, rating, review_text, progress.map(|p| p.as_str())],
    )?;
    Ok(rows)
}

/// Progress recorded by `user_name` for `work_id`, if reviewed
pub fn get_review_progress(
    conn: &Connection,
    user_name: &str,
    work_id: i64,
) -> Result<Option<Option<Progress>>, HvcError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT progress FROM {DB_REVIEW_NAME} WHERE user_name = ?1 AND work_id = ?2"
    ))?;
    let mut rows = stmt.query(params![user_name, work_id])?;
    match rows.next()? {
        Some(row) => {
            let raw: Option<String> = row.get(0)?;
            Ok(Some(raw.as_deref().map(str::parse::<Progress>).transpose()?))
        }
        None => Ok(None),
    }
}

/// Record playback position for one file of a work
pub fn upsert_history(
    conn: &Connection,
    user_name: &str,
    work_id: i64,
    file_index: i64,
    file_name: Option<&str>,
    play_time: Option<i64>,
    total_time: Option<i64>,
) -> Result<usize, HvcError> {
    let rows = conn.execute(
        &format!(
            "INSERT INTO {DB_HISTORY_NAME} (user_name, work_id, file_index, file_name, play_time, total_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (user_name, work_id, file_index) DO UPDATE SET
                 file_name = excluded.file_name,
                 play_time = excluded.play_time,
                 total_time = excluded.total_time,
                 updated_at = CURRENT_TIMESTAMP"
        ),
        params![user_name, work_id, file_index, file_name, play_time, total_time],
    )?;
    Ok(rows)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64, HvcError> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::migration::migrate;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn seed(conn: &Connection) -> String {
        insert_circle(conn, 1, "C").unwrap();
        insert_work(conn, &NewWork::new(1, 1, "T")).unwrap();
        insert_tag(conn, 1, "tag1").unwrap();
        link_tag(conn, 1, 1).unwrap();
        let va = insert_voice_actor(conn, "VA").unwrap();
        link_voice_actor(conn, &va, 1).unwrap();
        va
    }

    #[test]
    fn test_work_requires_existing_circle() {
        let conn = migrated();
        let err = insert_work(&conn, &NewWork::new(1, 42, "T")).unwrap_err();
        assert!(matches!(err, HvcError::ConstraintViolation(_)));
    }

    #[test]
    fn test_deleting_voice_actor_prunes_links() {
        let conn = migrated();
        let va = seed(&conn);
        assert_eq!(count_rows(&conn, DB_VA_WORK_NAME).unwrap(), 1);

        assert_eq!(delete_voice_actor(&conn, &va).unwrap(), 1);
        assert_eq!(count_rows(&conn, DB_VA_WORK_NAME).unwrap(), 0);
    }

    #[test]
    fn test_deleting_linked_tag_is_refused() {
        let conn = migrated();
        seed(&conn);

        let err = delete_tag(&conn, 1).unwrap_err();
        assert!(matches!(err, HvcError::ConstraintViolation(_)));
        assert_eq!(count_rows(&conn, DB_TAG_WORK_NAME).unwrap(), 1);

        // Manual cleanup first, then the tag can go
        unlink_tag(&conn, 1, 1).unwrap();
        assert_eq!(delete_tag(&conn, 1).unwrap(), 1);
    }

    #[test]
    fn test_deleting_linked_circle_is_refused() {
        let conn = migrated();
        seed(&conn);
        let err = conn.execute("DELETE FROM t_circle WHERE id = 1", []).unwrap_err();
        assert!(matches!(HvcError::from(err), HvcError::ConstraintViolation(_)));
    }

    #[test]
    fn test_deleting_user_or_work_cascades_to_reviews_and_history() {
        let conn = migrated();
        seed(&conn);
        insert_user(&conn, "alice", "pw", "user").unwrap();
        upsert_review(&conn, "alice", 1, Some(5), Some("good"), Some(Progress::Listened)).unwrap();
        upsert_history(&conn, "alice", 1, 0, Some("01.mp3"), Some(10), Some(300)).unwrap();

        delete_user(&conn, "alice").unwrap();
        assert_eq!(count_rows(&conn, DB_REVIEW_NAME).unwrap(), 0);
        assert_eq!(count_rows(&conn, DB_HISTORY_NAME).unwrap(), 0);

        insert_user(&conn, "bob", "pw", "admin").unwrap();
        upsert_review(&conn, "bob", 1, None, None, Some(Progress::Marked)).unwrap();
        upsert_history(&conn, "bob", 1, 0, None, None, None).unwrap();
        unlink_tag(&conn, 1, 1).unwrap();
        delete_work(&conn, 1).unwrap();
        assert_eq!(count_rows(&conn, DB_REVIEW_NAME).unwrap(), 0);
        assert_eq!(count_rows(&conn, DB_HISTORY_NAME).unwrap(), 0);
        assert_eq!(count_rows(&conn, DB_VA_WORK_NAME).unwrap(), 0);
    }

    #[test]
    fn test_history_is_unique_per_file() {
        let conn = migrated();
        seed(&conn);
        insert_user(&conn, "alice", "pw", "user").unwrap();
        upsert_history(&conn, "alice", 1, 3, Some("03.mp3"), Some(10), Some(300)).unwrap();
        upsert_history(&conn, "alice", 1, 3, Some("03.mp3"), Some(120), Some(300)).unwrap();
        upsert_history(&conn, "alice", 1, 4, Some("04.mp3"), Some(0), Some(200)).unwrap();
        assert_eq!(count_rows(&conn, DB_HISTORY_NAME).unwrap(), 2);

        let play_time: i64 = conn
            .query_row("SELECT play_time FROM t_history WHERE file_index = 3", [], |r| r.get(0))
            .unwrap();
        assert_eq!(play_time, 120);
    }

    #[test]
    fn test_review_upsert_and_rating_bounds() {
        let conn = migrated();
        seed(&conn);
        insert_user(&conn, "alice", "pw", "user").unwrap();

        assert!(upsert_review(&conn, "alice", 1, Some(6), None, None).is_err());
        upsert_review(&conn, "alice", 1, Some(3), None, Some(Progress::Listening)).unwrap();
        upsert_review(&conn, "alice", 1, Some(4), None, Some(Progress::Replay)).unwrap();

        assert_eq!(count_rows(&conn, DB_REVIEW_NAME).unwrap(), 1);
        assert_eq!(get_review_progress(&conn, "alice", 1).unwrap(), Some(Some(Progress::Replay)));
        assert_eq!(get_review_progress(&conn, "bob", 1).unwrap(), None);
    }

    #[test]
    fn test_unknown_stored_progress_is_reported() {
        let conn = migrated();
        seed(&conn);
        insert_user(&conn, "alice", "pw", "user").unwrap();
        conn.execute(
            "INSERT INTO t_review (user_name, work_id, progress) VALUES ('alice', 1, 'abandoned')",
            [],
        )
        .unwrap();

        let err = get_review_progress(&conn, "alice", 1).unwrap_err();
        assert!(matches!(err, HvcError::UnknownProgress(p) if p == "abandoned"));
    }
}
