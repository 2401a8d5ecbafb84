use crate::Database;
use crate::models::{ContentRow, NewContentRow, SessionRow, UserRow, ViewCounters};
use anyhow::Result;
use linkvault_types::models::ContentKind;
use rusqlite::{Connection, Row};

const CONTENT_COLUMNS: &str = "id, kind, text_content, original_name, file_size, file_mime, \
     password_hash, one_time, view_count, max_views, created_at, expires_at, owner_id, \
     delete_token_hash";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user.id, user.email, user.password_hash, user.created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
                [email],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        password_hash: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Sessions --

    pub fn create_session(
        &self,
        token_hash: &str,
        user_id: &str,
        created_at: i64,
        expires_at: i64,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![token_hash, user_id, created_at, expires_at],
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, token_hash: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT u.id, u.email, s.expires_at
                 FROM sessions s
                 JOIN users u ON s.user_id = u.id
                 WHERE s.token_hash = ?1",
                [token_hash],
                |row| {
                    Ok(SessionRow {
                        user_id: row.get(0)?,
                        email: row.get(1)?,
                        expires_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
            Ok(changed > 0)
        })
    }

    /// Removes every session whose expiry lies strictly before `now`.
    pub fn delete_expired_sessions(&self, now: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM sessions WHERE expires_at < ?1", [now])?;
            Ok(changed)
        })
    }

    // -- Contents --

    pub fn insert_content(&self, content: &NewContentRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO contents
                 (id, kind, text_content, original_name, file_size, file_mime, password_hash,
                  one_time, view_count, max_views, created_at, expires_at, owner_id,
                  delete_token_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?11, ?12, ?13)",
                rusqlite::params![
                    content.id,
                    content.kind.as_str(),
                    content.text_content,
                    content.original_name,
                    content.file_size,
                    content.file_mime,
                    content.password_hash,
                    content.one_time,
                    content.max_views,
                    content.created_at,
                    content.expires_at,
                    content.owner_id,
                    content.delete_token_hash,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_content(&self, id: &str) -> Result<Option<ContentRow>> {
        self.with_conn(|conn| query_content(conn, id))
    }

    /// Increments the view counter only while the limit still allows it.
    ///
    /// The limit check and the increment are one statement, so two callers
    /// racing on the last remaining view cannot both succeed. Returns the
    /// post-increment counters, or `None` when no row was updated (limit
    /// exhausted or the row is gone).
    pub fn try_record_view(&self, id: &str) -> Result<Option<ViewCounters>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "UPDATE contents
                 SET view_count = view_count + 1
                 WHERE id = ?1 AND (max_views IS NULL OR view_count < max_views)
                 RETURNING view_count, max_views",
                [id],
                |row| {
                    Ok(ViewCounters {
                        view_count: row.get(0)?,
                        max_views: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Claims the single read of one-time text by deleting the row in the
    /// same statement. Only one caller can ever get `Some`; the counters
    /// reported are the ones the read would have produced.
    pub fn consume_one_time_text(&self, id: &str) -> Result<Option<ViewCounters>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "DELETE FROM contents
                 WHERE id = ?1 AND kind = 'text' AND one_time = 1
                   AND (max_views IS NULL OR view_count < max_views)
                 RETURNING view_count + 1, max_views",
                [id],
                |row| {
                    Ok(ViewCounters {
                        view_count: row.get(0)?,
                        max_views: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_content(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM contents WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    /// Content rows whose expiry lies strictly before `now`.
    pub fn list_expired_contents(&self, now: i64) -> Result<Vec<ContentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM contents WHERE expires_at < ?1 ORDER BY expires_at",
                CONTENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([now], content_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Content owned by `owner_id`, newest first.
    pub fn list_contents_by_owner(&self, owner_id: &str) -> Result<Vec<ContentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM contents WHERE owner_id = ?1 ORDER BY created_at DESC, id",
                CONTENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], content_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_content(conn: &Connection, id: &str) -> Result<Option<ContentRow>> {
    let sql = format!("SELECT {} FROM contents WHERE id = ?1", CONTENT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([id], content_from_row).optional()
}

fn content_from_row(row: &Row<'_>) -> rusqlite::Result<ContentRow> {
    let kind: String = row.get(1)?;
    let kind = kind.parse::<ContentKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(ContentRow {
        id: row.get(0)?,
        kind,
        text_content: row.get(2)?,
        original_name: row.get(3)?,
        file_size: row.get(4)?,
        file_mime: row.get(5)?,
        password_hash: row.get(6)?,
        one_time: row.get(7)?,
        view_count: row.get(8)?,
        max_views: row.get(9)?,
        created_at: row.get(10)?,
        expires_at: row.get(11)?,
        owner_id: row.get(12)?,
        delete_token_hash: row.get(13)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
