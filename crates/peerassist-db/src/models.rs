//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the peerassist-types API models so the store stays
//! independent of the wire format.

use rusqlite::Row;

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub email: String,
    pub name: String,
    pub mobile: String,
    pub completed_tasks: i64,
    pub rating: String,
}

impl UserRow {
    pub(crate) const COLUMNS: &'static str = "email, name, mobile, completed_tasks, rating";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            email: row.get(0)?,
            name: row.get(1)?,
            mobile: row.get(2)?,
            completed_tasks: row.get(3)?,
            rating: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OtpRow {
    pub email: String,
    pub context: String,
    pub task_id: String,
    pub code_hash: String,
    pub worker_email: Option<String>,
    pub expires_at: String,
}

/// Owner-editable task fields, shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFields {
    pub title: String,
    pub description: String,
    pub task_time: String,
    /// `YYYY-MM-DD`
    pub task_date: String,
    pub estimated_pay_rate: f64,
    pub place_of_work: String,
    pub work_type: String,
    pub people_needed: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub task_time: String,
    pub task_date: String,
    pub estimated_pay_rate: f64,
    pub place_of_work: String,
    pub work_type: String,
    pub people_needed: i64,
    pub creator_email: String,
    pub status: String,
    pub views: i64,
    pub applicant_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    /// Column list for `FROM tasks t`, including the derived applicant count.
    pub(crate) const COLUMNS: &'static str = "t.id, t.title, t.description, t.task_time,
         t.task_date, t.estimated_pay_rate, t.place_of_work, t.work_type, t.people_needed,
         t.creator_email, t.status, t.views,
         (SELECT COUNT(*) FROM task_applicants a WHERE a.task_id = t.id),
         t.created_at, t.updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            task_time: row.get(3)?,
            task_date: row.get(4)?,
            estimated_pay_rate: row.get(5)?,
            place_of_work: row.get(6)?,
            work_type: row.get(7)?,
            people_needed: row.get(8)?,
            creator_email: row.get(9)?,
            status: row.get(10)?,
            views: row.get(11)?,
            applicant_count: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTaskRow {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub poster_email: String,
    pub worker_email: String,
    pub scheduled_at: String,
    pub task_date: String,
    pub task_time: String,
    pub place: String,
    pub status: String,
    pub completed_at: Option<String>,
}

impl ScheduledTaskRow {
    pub(crate) const COLUMNS: &'static str = "id, task_id, title, poster_email, worker_email,
         scheduled_at, task_date, task_time, place, status, completed_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_id: row.get(1)?,
            title: row.get(2)?,
            poster_email: row.get(3)?,
            worker_email: row.get(4)?,
            scheduled_at: row.get(5)?,
            task_date: row.get(6)?,
            task_time: row.get(7)?,
            place: row.get(8)?,
            status: row.get(9)?,
            completed_at: row.get(10)?,
        })
    }
}
