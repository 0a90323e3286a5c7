use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("campus.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            professor TEXT,
            room TEXT,
            time_slot TEXT
        )",
        [],
    )?;

    // Early workspaces predate schedule slots on courses.
    ensure_courses_time_slot(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS announcements(
            id TEXT PRIMARY KEY,
            course_id TEXT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            posted_on TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    ensure_announcements_course_id(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_announcements_course ON announcements(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            due_date TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_course ON assignments(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignment_statuses(
            assignment_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL,
            updated_at TEXT,
            PRIMARY KEY(assignment_id, user_id),
            FOREIGN KEY(assignment_id) REFERENCES assignments(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignment_statuses_user ON assignment_statuses(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            UNIQUE(user_id, course_id, date),
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_user ON attendance(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_course ON attendance(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            letter TEXT NOT NULL,
            weight REAL NOT NULL,
            recorded_on TEXT,
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    ensure_grades_recorded_on(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_user ON grades(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_course ON grades(course_id)",
        [],
    )?;

    Ok(conn)
}

fn ensure_courses_time_slot(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "courses", "time_slot")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE courses ADD COLUMN time_slot TEXT", [])?;
    Ok(())
}

fn ensure_announcements_course_id(conn: &Connection) -> anyhow::Result<()> {
    // Course tagging arrived after the first announcements schema.
    if table_has_column(conn, "announcements", "course_id")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE announcements ADD COLUMN course_id TEXT", [])?;
    Ok(())
}

fn ensure_grades_recorded_on(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "grades", "recorded_on")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE grades ADD COLUMN recorded_on TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
