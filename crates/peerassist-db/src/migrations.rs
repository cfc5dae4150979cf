use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                email           TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                mobile          TEXT NOT NULL,
                completed_tasks INTEGER NOT NULL DEFAULT 0,
                rating          TEXT NOT NULL DEFAULT '',
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE credentials (
                email       TEXT PRIMARY KEY REFERENCES users(email),
                password    TEXT NOT NULL
            );

            -- task_id is '' for OTPs that are not tied to a task
            CREATE TABLE otps (
                email           TEXT NOT NULL,
                context         TEXT NOT NULL,
                task_id         TEXT NOT NULL DEFAULT '',
                code_hash       TEXT NOT NULL,
                worker_email    TEXT,
                expires_at      TEXT NOT NULL,
                PRIMARY KEY (email, context, task_id)
            );

            CREATE INDEX idx_otps_expires ON otps(expires_at);

            CREATE TABLE tasks (
                id                  TEXT PRIMARY KEY,
                title               TEXT NOT NULL,
                description         TEXT NOT NULL,
                task_time           TEXT NOT NULL,
                task_date           TEXT NOT NULL,
                estimated_pay_rate  REAL NOT NULL,
                place_of_work       TEXT NOT NULL,
                work_type           TEXT NOT NULL,
                people_needed       INTEGER NOT NULL,
                creator_email       TEXT NOT NULL REFERENCES users(email),
                status              TEXT NOT NULL DEFAULT 'Open',
                views               INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE INDEX idx_tasks_creator_status ON tasks(creator_email, status);
            CREATE INDEX idx_tasks_work_type ON tasks(work_type);
            CREATE INDEX idx_tasks_date ON tasks(task_date);

            CREATE TABLE task_applicants (
                task_id     TEXT NOT NULL REFERENCES tasks(id),
                email       TEXT NOT NULL,
                applied_at  TEXT NOT NULL,
                PRIMARY KEY (task_id, email)
            );

            CREATE INDEX idx_applicants_email ON task_applicants(email);

            CREATE TABLE task_selections (
                task_id     TEXT NOT NULL REFERENCES tasks(id),
                email       TEXT NOT NULL,
                selected_at TEXT NOT NULL,
                PRIMARY KEY (task_id, email)
            );

            CREATE TABLE scheduled_tasks (
                id              TEXT PRIMARY KEY,
                task_id         TEXT NOT NULL,
                title           TEXT NOT NULL,
                poster_email    TEXT NOT NULL,
                worker_email    TEXT NOT NULL,
                scheduled_at    TEXT NOT NULL,
                task_date       TEXT NOT NULL,
                task_time       TEXT NOT NULL,
                place           TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'Scheduled',
                completed_at    TEXT,
                UNIQUE (task_id, worker_email)
            );

            CREATE INDEX idx_scheduled_worker ON scheduled_tasks(worker_email);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
