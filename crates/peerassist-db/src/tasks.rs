use anyhow::Result;
use peerassist_types::models::TaskStatus;
use rusqlite::{Connection, TransactionBehavior};

use crate::Database;
use crate::models::{ScheduledTaskRow, TaskFields, TaskRow};
use crate::queries::OptionalExt;

/// Optional narrowing of the task feed. Dates are `YYYY-MM-DD` and both
/// bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedFilter {
    pub category: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated { changed: bool },
    /// No task with that id belongs to the caller.
    NotFound,
    NotOpen(TaskStatus),
}

impl Database {
    pub fn insert_task(
        &self,
        id: &str,
        creator_email: &str,
        fields: &TaskFields,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, title, description, task_time, task_date,
                    estimated_pay_rate, place_of_work, work_type, people_needed,
                    creator_email, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                rusqlite::params![
                    id,
                    fields.title,
                    fields.description,
                    fields.task_time,
                    fields.task_date,
                    fields.estimated_pay_rate,
                    fields.place_of_work,
                    fields.work_type,
                    fields.people_needed,
                    creator_email,
                    TaskStatus::Open.as_str(),
                    now,
                ],
            )?;
            Ok(())
        })
    }

    /// Owner edit. Only the creator may edit, and only while the task is open.
    pub fn update_task(
        &self,
        id: &str,
        creator_email: &str,
        fields: &TaskFields,
        now: &str,
    ) -> Result<UpdateOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(current) = query_task(&tx, id)?.filter(|t| t.creator_email == creator_email)
            else {
                return Ok(UpdateOutcome::NotFound);
            };

            let status = parse_status(&current.status)?;
            if !status.is_open() {
                return Ok(UpdateOutcome::NotOpen(status));
            }

            let changed = current.fields() != *fields;
            if changed {
                tx.execute(
                    "UPDATE tasks SET title = ?2, description = ?3, task_time = ?4, task_date = ?5,
                        estimated_pay_rate = ?6, place_of_work = ?7, work_type = ?8,
                        people_needed = ?9, updated_at = ?10
                     WHERE id = ?1",
                    rusqlite::params![
                        id,
                        fields.title,
                        fields.description,
                        fields.task_time,
                        fields.task_date,
                        fields.estimated_pay_rate,
                        fields.place_of_work,
                        fields.work_type,
                        fields.people_needed,
                        now,
                    ],
                )?;
            }

            tx.commit()?;
            Ok(UpdateOutcome::Updated { changed })
        })
    }

    pub fn get_task(&self, id: &str) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| query_task(conn, id))
    }

    /// Open tasks the viewer neither created nor applied to, oldest first.
    pub fn feed(&self, viewer: &str, filter: &FeedFilter) -> Result<Vec<TaskRow>> {
        let mut sql = format!(
            "SELECT {} FROM tasks t
             WHERE t.status = ?1
               AND t.creator_email <> ?2
               AND NOT EXISTS (
                   SELECT 1 FROM task_applicants a WHERE a.task_id = t.id AND a.email = ?2
               )",
            TaskRow::COLUMNS
        );
        let mut params = vec![TaskStatus::Open.as_str().to_string(), viewer.to_string()];

        let mut push = |clause: &str, value: &String| {
            params.push(value.clone());
            sql.push_str(&format!(" AND {} ?{}", clause, params.len()));
        };
        if let Some(category) = &filter.category {
            push("t.work_type =", category);
        }
        if let Some(from) = &filter.from_date {
            push("t.task_date >=", from);
        }
        if let Some(to) = &filter.to_date {
            push("t.task_date <=", to);
        }
        sql.push_str(" ORDER BY t.created_at ASC, t.rowid ASC");

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), TaskRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Tasks posted by `email`, newest first.
    pub fn tasks_created_by(&self, email: &str) -> Result<Vec<TaskRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM tasks t WHERE t.creator_email = ?1
                 ORDER BY t.created_at DESC, t.rowid DESC",
                TaskRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([email], TaskRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Tasks `email` applied to, oldest first, each paired with whether
    /// `email` was selected for it.
    pub fn tasks_applied_by(&self, email: &str) -> Result<Vec<(TaskRow, bool)>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, EXISTS (
                     SELECT 1 FROM task_selections s WHERE s.task_id = t.id AND s.email = ?1
                 )
                 FROM tasks t
                 JOIN task_applicants ap ON ap.task_id = t.id AND ap.email = ?1
                 ORDER BY t.created_at ASC, t.rowid ASC",
                TaskRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([email], |row| {
                    Ok((TaskRow::from_row(row)?, row.get::<_, bool>(15)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn applicants(&self, task_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            member_emails(
                conn,
                "SELECT email FROM task_applicants WHERE task_id = ?1 ORDER BY applied_at, rowid",
                task_id,
            )
        })
    }

    pub fn selected_workers(&self, task_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            member_emails(
                conn,
                "SELECT email FROM task_selections WHERE task_id = ?1 ORDER BY selected_at, rowid",
                task_id,
            )
        })
    }

    /// Batch-fetch tasks by id, oldest first. Unknown ids are skipped.
    pub fn tasks_by_ids(&self, ids: &[String]) -> Result<Vec<TaskRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {} FROM tasks t WHERE t.id IN ({}) ORDER BY t.created_at ASC, t.rowid ASC",
                TaskRow::COLUMNS,
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), TaskRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn scheduled_for_worker(&self, worker_email: &str) -> Result<Vec<ScheduledTaskRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM scheduled_tasks WHERE worker_email = ?1
                 ORDER BY scheduled_at ASC, rowid ASC",
                ScheduledTaskRow::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([worker_email], ScheduledTaskRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Bump the view counter of every listed task. Returns rows touched.
    pub fn increment_views(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut touched = 0;
            {
                let mut stmt = tx.prepare("UPDATE tasks SET views = views + 1 WHERE id = ?1")?;
                for id in ids {
                    touched += stmt.execute([id])?;
                }
            }
            tx.commit()?;
            Ok(touched)
        })
    }
}

impl TaskRow {
    pub fn fields(&self) -> TaskFields {
        TaskFields {
            title: self.title.clone(),
            description: self.description.clone(),
            task_time: self.task_time.clone(),
            task_date: self.task_date.clone(),
            estimated_pay_rate: self.estimated_pay_rate,
            place_of_work: self.place_of_work.clone(),
            work_type: self.work_type.clone(),
            people_needed: self.people_needed,
        }
    }
}

pub(crate) fn query_task(conn: &Connection, id: &str) -> Result<Option<TaskRow>> {
    let sql = format!("SELECT {} FROM tasks t WHERE t.id = ?1", TaskRow::COLUMNS);
    conn.query_row(&sql, [id], TaskRow::from_row).optional()
}

pub(crate) fn parse_status(raw: &str) -> Result<TaskStatus> {
    Ok(TaskStatus::try_from(raw)?)
}

fn member_emails(conn: &Connection, sql: &str, task_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let emails = stmt
        .query_map([task_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(emails)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testing;

    pub fn fields(title: &str, work_type: &str, task_date: &str) -> TaskFields {
        TaskFields {
            title: title.into(),
            description: "Help needed".into(),
            task_time: "10:00 AM".into(),
            task_date: task_date.into(),
            estimated_pay_rate: 20.0,
            place_of_work: "Gainesville".into(),
            work_type: work_type.into(),
            people_needed: 1,
        }
    }

    fn post(db: &Database, id: &str, creator: &str, work_type: &str, date: &str) {
        db.insert_task(id, creator, &fields(id, work_type, date), &testing::now())
            .unwrap();
    }

    fn edit(db: &Database, editor: &str, edited: &TaskFields) -> UpdateOutcome {
        db.update_task("t1", editor, edited, &testing::now())
            .unwrap()
    }

    fn ids(rows: &[TaskRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn feed_excludes_own_and_applied_tasks() {
        let db = testing::db();
        testing::user(&db, "a@x.com");
        testing::user(&db, "b@x.com");
        post(&db, "t1", "a@x.com", "Cleaning", "2025-04-20");
        post(&db, "t2", "b@x.com", "Cleaning", "2025-04-20");
        post(&db, "t3", "a@x.com", "Painting", "2025-04-20");

        db.with_conn(|c| {
            c.execute(
                "INSERT INTO task_applicants (task_id, email, applied_at)
                 VALUES ('t3', 'b@x.com', 'now')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let feed = db.feed("b@x.com", &FeedFilter::default()).unwrap();
        assert_eq!(ids(&feed), vec!["t1"]);
        assert_eq!(feed[0].applicant_count, 0);

        let feed = db.feed("a@x.com", &FeedFilter::default()).unwrap();
        assert_eq!(ids(&feed), vec!["t2"]);
    }

    #[test]
    fn feed_filters_by_category_and_inclusive_date_range() {
        let db = testing::db();
        testing::user(&db, "a@x.com");
        post(&db, "early", "a@x.com", "Cleaning", "2025-04-14");
        post(&db, "from", "a@x.com", "Cleaning", "2025-04-15");
        post(&db, "mid", "a@x.com", "Painting", "2025-04-20");
        post(&db, "to", "a@x.com", "Cleaning", "2025-04-25");
        post(&db, "late", "a@x.com", "Cleaning", "2025-04-26");

        let range = FeedFilter {
            from_date: Some("2025-04-15".into()),
            to_date: Some("2025-04-25".into()),
            ..Default::default()
        };
        let feed = db.feed("v@x.com", &range).unwrap();
        assert_eq!(ids(&feed), vec!["from", "mid", "to"]);

        let cleaning = FeedFilter {
            category: Some("Cleaning".into()),
            ..range
        };
        let feed = db.feed("v@x.com", &cleaning).unwrap();
        assert_eq!(ids(&feed), vec!["from", "to"]);

        let unknown = FeedFilter {
            category: Some("Juggling".into()),
            ..Default::default()
        };
        assert!(db.feed("v@x.com", &unknown).unwrap().is_empty());
    }

    #[test]
    fn created_tasks_are_newest_first() {
        let db = testing::db();
        testing::user(&db, "a@x.com");
        let old = fields("old", "Other", "2025-01-01");
        db.insert_task("old", "a@x.com", &old, "2025-01-01T00:00:00.000000Z")
            .unwrap();
        let new = fields("new", "Other", "2025-01-01");
        db.insert_task("new", "a@x.com", &new, "2025-02-01T00:00:00.000000Z")
            .unwrap();

        let created = db.tasks_created_by("a@x.com").unwrap();
        assert_eq!(ids(&created), vec!["new", "old"]);
    }

    #[test]
    fn only_the_owner_may_edit_an_open_task() {
        let db = testing::db();
        testing::user(&db, "a@x.com");
        post(&db, "t1", "a@x.com", "Cleaning", "2025-04-20");

        let edited = fields("Renamed", "Cleaning", "2025-04-21");
        assert_eq!(edit(&db, "b@x.com", &edited), UpdateOutcome::NotFound);
        assert_eq!(
            edit(&db, "a@x.com", &edited),
            UpdateOutcome::Updated { changed: true }
        );
        assert_eq!(
            edit(&db, "a@x.com", &edited),
            UpdateOutcome::Updated { changed: false }
        );
        assert_eq!(db.get_task("t1").unwrap().unwrap().title, "Renamed");

        db.with_conn(|c| {
            c.execute("UPDATE tasks SET status = 'Completed' WHERE id = 't1'", [])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(
            edit(&db, "a@x.com", &edited),
            UpdateOutcome::NotOpen(TaskStatus::Completed)
        );
    }

    #[test]
    fn view_counts_increment_per_listed_task() {
        let db = testing::db();
        testing::user(&db, "a@x.com");
        post(&db, "t1", "a@x.com", "Cleaning", "2025-04-20");
        post(&db, "t2", "a@x.com", "Cleaning", "2025-04-20");

        let touched = db
            .increment_views(&["t1".into(), "t2".into(), "missing".into()])
            .unwrap();
        assert_eq!(touched, 2);
        assert_eq!(db.get_task("t1").unwrap().unwrap().views, 1);
    }
}
