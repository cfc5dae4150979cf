use crate::Database;
use crate::models::{OtpRow, UserRow};
use anyhow::Result;
use peerassist_types::models::OtpContext;
use rusqlite::{Connection, TransactionBehavior};

impl Database {
    // -- Users --

    /// Insert a user and their credential in one transaction.
    /// Returns false when the email is already registered.
    pub fn create_user(
        &self,
        email: &str,
        name: &str,
        mobile: &str,
        password_hash: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if query_user(&tx, email)?.is_some() {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO users (email, name, mobile) VALUES (?1, ?2, ?3)",
                (email, name, mobile),
            )?;
            tx.execute(
                "INSERT INTO credentials (email, password) VALUES (?1, ?2)",
                (email, password_hash),
            )?;

            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_user(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, email))
    }

    pub fn user_exists(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| user_exists(conn, email))
    }

    pub fn get_password_hash(&self, email: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT password FROM credentials WHERE email = ?1",
                [email],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Partial profile update. `None` fields keep their stored value.
    ///
    /// Returns `None` when the user does not exist, otherwise whether any
    /// stored value actually changed.
    pub fn update_profile(
        &self,
        email: &str,
        name: Option<&str>,
        mobile: Option<&str>,
    ) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(current) = query_user(&tx, email)? else {
                return Ok(None);
            };

            let changed = name.is_some_and(|n| n != current.name)
                || mobile.is_some_and(|m| m != current.mobile);

            if changed {
                tx.execute(
                    "UPDATE users SET name = COALESCE(?2, name), mobile = COALESCE(?3, mobile)
                     WHERE email = ?1",
                    rusqlite::params![email, name, mobile],
                )?;
            }

            tx.commit()?;
            Ok(Some(changed))
        })
    }

    // -- OTPs --

    /// Store an OTP, replacing any previous one for the same
    /// (email, context, task) key.
    pub fn upsert_otp(&self, otp: &OtpRow) -> Result<()> {
        self.with_conn_mut(|conn| upsert_otp(conn, otp))
    }

    pub fn get_otp(
        &self,
        email: &str,
        context: OtpContext,
        task_id: &str,
    ) -> Result<Option<OtpRow>> {
        self.with_conn(|conn| query_otp(conn, email, context, task_id))
    }

    /// Check a password-reset OTP and, if it is live and matches, replace the
    /// password hash and consume the OTP in a single transaction.
    ///
    /// Returns false when the OTP is missing, expired or does not match.
    pub fn reset_password(
        &self,
        email: &str,
        code_hash: &str,
        password_hash: &str,
        now: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(otp) = query_otp(&tx, email, OtpContext::PasswordReset, "")? else {
                return Ok(false);
            };
            if otp.code_hash != code_hash || otp.expires_at.as_str() <= now {
                return Ok(false);
            }

            let updated = tx.execute(
                "UPDATE credentials SET password = ?2 WHERE email = ?1",
                (email, password_hash),
            )?;
            if updated != 1 {
                anyhow::bail!("no credential row for {}", email);
            }

            delete_otp(&tx, email, OtpContext::PasswordReset, "")?;

            tx.commit()?;
            Ok(true)
        })
    }

    /// Remove every OTP whose expiry is at or before `now`.
    pub fn purge_expired_otps(&self, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let purged = conn.execute("DELETE FROM otps WHERE expires_at <= ?1", [now])?;
            Ok(purged)
        })
    }
}

pub(crate) fn query_user(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", UserRow::COLUMNS);
    conn.query_row(&sql, [email], UserRow::from_row).optional()
}

pub(crate) fn user_exists(conn: &Connection, email: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE email = ?1", [email], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn upsert_otp(conn: &Connection, otp: &OtpRow) -> Result<()> {
    conn.execute(
        "INSERT INTO otps (email, context, task_id, code_hash, worker_email, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (email, context, task_id) DO UPDATE SET
            code_hash = excluded.code_hash,
            worker_email = excluded.worker_email,
            expires_at = excluded.expires_at",
        rusqlite::params![
            otp.email,
            otp.context,
            otp.task_id,
            otp.code_hash,
            otp.worker_email,
            otp.expires_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn query_otp(
    conn: &Connection,
    email: &str,
    context: OtpContext,
    task_id: &str,
) -> Result<Option<OtpRow>> {
    conn.query_row(
        "SELECT email, context, task_id, code_hash, worker_email, expires_at
         FROM otps WHERE email = ?1 AND context = ?2 AND task_id = ?3",
        rusqlite::params![email, context.as_str(), task_id],
        |row| {
            Ok(OtpRow {
                email: row.get(0)?,
                context: row.get(1)?,
                task_id: row.get(2)?,
                code_hash: row.get(3)?,
                worker_email: row.get(4)?,
                expires_at: row.get(5)?,
            })
        },
    )
    .optional()
}

pub(crate) fn delete_otp(
    conn: &Connection,
    email: &str,
    context: OtpContext,
    task_id: &str,
) -> Result<()> {
    let deleted = conn.execute(
        "DELETE FROM otps WHERE email = ?1 AND context = ?2 AND task_id = ?3",
        rusqlite::params![email, context.as_str(), task_id],
    )?;
    if deleted != 1 {
        anyhow::bail!("OTP for {} ({}) vanished mid-transaction", email, context);
    }
    Ok(())
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn reset_otp(email: &str, code_hash: &str, expires_at: &str) -> OtpRow {
        OtpRow {
            email: email.into(),
            context: OtpContext::PasswordReset.as_str().into(),
            task_id: String::new(),
            code_hash: code_hash.into(),
            worker_email: None,
            expires_at: expires_at.into(),
        }
    }

    fn reset(db: &Database, code_hash: &str, password_hash: &str) -> bool {
        let now = testing::now();
        db.reset_password("a@x.com", code_hash, password_hash, &now)
            .unwrap()
    }

    #[test]
    fn signup_rejects_duplicate_email() {
        let db = testing::db();
        assert!(db.create_user("a@x.com", "A", "1", "h1").unwrap());
        assert!(!db.create_user("a@x.com", "Other", "2", "h2").unwrap());

        let hash = db.get_password_hash("a@x.com").unwrap();
        assert_eq!(hash.as_deref(), Some("h1"));
        let user = db.get_user("a@x.com").unwrap().unwrap();
        assert_eq!(user.name, "A");
        assert_eq!(user.completed_tasks, 0);
    }

    #[test]
    fn profile_update_keeps_missing_fields() {
        let db = testing::db();
        testing::user(&db, "a@x.com");

        let changed = db.update_profile("a@x.com", Some("New"), None).unwrap();
        assert_eq!(changed, Some(true));
        let user = db.get_user("a@x.com").unwrap().unwrap();
        assert_eq!(user.name, "New");
        assert_eq!(user.mobile, "5550100");

        let unchanged = db.update_profile("a@x.com", Some("New"), None).unwrap();
        assert_eq!(unchanged, Some(false));
        let missing = db.update_profile("nobody@x.com", Some("N"), None);
        assert_eq!(missing.unwrap(), None);
    }

    #[test]
    fn otp_upsert_replaces_previous_code() {
        let db = testing::db();
        db.upsert_otp(&reset_otp("a@x.com", "old", "2999-01-01T00:00:00.000000Z"))
            .unwrap();
        db.upsert_otp(&reset_otp("a@x.com", "new", "2999-01-01T00:00:00.000000Z"))
            .unwrap();

        let otp = db
            .get_otp("a@x.com", OtpContext::PasswordReset, "")
            .unwrap()
            .unwrap();
        assert_eq!(otp.code_hash, "new");

        let count: i64 = db
            .with_conn(|c| {
                Ok(c.query_row("SELECT COUNT(*) FROM otps", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn password_reset_consumes_otp_once() {
        let db = testing::db();
        testing::user(&db, "a@x.com");
        db.upsert_otp(&reset_otp("a@x.com", "code", "2999-01-01T00:00:00.000000Z"))
            .unwrap();

        assert!(!reset(&db, "wrong", "new-hash"));
        assert!(reset(&db, "code", "new-hash"));
        assert_eq!(
            db.get_password_hash("a@x.com").unwrap().as_deref(),
            Some("new-hash")
        );
        assert!(!reset(&db, "code", "again"));
    }

    #[test]
    fn expired_otp_is_rejected_and_purged() {
        let db = testing::db();
        testing::user(&db, "a@x.com");
        db.upsert_otp(&reset_otp("a@x.com", "code", "2000-01-01T00:00:00.000000Z"))
            .unwrap();
        let now = testing::now();

        assert!(!reset(&db, "code", "new-hash"));
        assert_eq!(db.purge_expired_otps(&now).unwrap(), 1);
        assert!(db
            .get_otp("a@x.com", OtpContext::PasswordReset, "")
            .unwrap()
            .is_none());
    }
}
