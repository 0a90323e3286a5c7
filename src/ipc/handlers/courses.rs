use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

struct CourseRow {
    id: String,
    code: String,
    name: String,
    professor: Option<String>,
    room: Option<String>,
    time_slot: Option<String>,
}

impl CourseRow {
    fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "code": self.code,
            "name": self.name,
            "professor": self.professor,
            "room": self.room,
            "timeSlot": self.time_slot
        })
    }
}

fn fetch_course(conn: &Connection, course_id: &str) -> Result<Option<CourseRow>, HandlerErr> {
    conn.query_row(
        "SELECT id, code, name, professor, room, time_slot FROM courses WHERE id = ?",
        [course_id],
        |r| {
            Ok(CourseRow {
                id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
                professor: r.get(3)?,
                room: r.get(4)?,
                time_slot: r.get(5)?,
            })
        },
    )
    .optional()
    .map_err(HandlerErr::db)
}

fn code_taken(conn: &Connection, code: &str, except_id: Option<&str>) -> Result<bool, HandlerErr> {
    let row: Option<String> = conn
        .query_row("SELECT id FROM courses WHERE code = ?", [code], |r| {
            r.get(0)
        })
        .optional()
        .map_err(HandlerErr::db)?;
    Ok(match row {
        Some(id) => except_id != Some(id.as_str()),
        None => false,
    })
}

fn courses_list(
    conn: &Connection,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    // Include dependent counts so a dashboard can render from one call.
    // Correlated subqueries avoid double-counting from joins.
    let mut stmt = conn
        .prepare(
            "SELECT
               c.id,
               c.code,
               c.name,
               c.professor,
               c.room,
               c.time_slot,
               (SELECT COUNT(*) FROM announcements a WHERE a.course_id = c.id) AS announcement_count,
               (SELECT COUNT(*) FROM assignments g WHERE g.course_id = c.id) AS assignment_count
             FROM courses c
             ORDER BY c.code",
        )
        .map_err(HandlerErr::db)?;

    let rows = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let code: String = r.get(1)?;
            let name: String = r.get(2)?;
            let professor: Option<String> = r.get(3)?;
            let room: Option<String> = r.get(4)?;
            let time_slot: Option<String> = r.get(5)?;
            let announcement_count: i64 = r.get(6)?;
            let assignment_count: i64 = r.get(7)?;
            Ok(json!({
                "id": id,
                "code": code,
                "name": name,
                "professor": professor,
                "room": room,
                "timeSlot": time_slot,
                "announcementCount": announcement_count,
                "assignmentCount": assignment_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db)?;

    Ok(json!({ "courses": rows }))
}

fn courses_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let code = get_required_str(params, "code")?;
    let name = get_required_str(params, "name")?;
    let professor = get_optional_str(params, "professor")?;
    let room = get_optional_str(params, "room")?;
    let time_slot = get_optional_str(params, "timeSlot")?;

    if code_taken(conn, &code, None)? {
        return Err(HandlerErr::conflict(format!(
            "course code {} already exists",
            code
        )));
    }

    let row = CourseRow {
        id: Uuid::new_v4().to_string(),
        code,
        name,
        professor,
        room,
        time_slot,
    };
    conn.execute(
        "INSERT INTO courses(id, code, name, professor, room, time_slot)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &row.id,
            &row.code,
            &row.name,
            &row.professor,
            &row.room,
            &row.time_slot,
        ),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(row.to_json())
}

fn courses_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let Some(row) = fetch_course(conn, &course_id)? else {
        return Err(HandlerErr::not_found("course not found"));
    };
    Ok(row.to_json())
}

fn courses_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let Some(mut row) = fetch_course(conn, &course_id)? else {
        return Err(HandlerErr::not_found("course not found"));
    };

    if let Some(code) = get_optional_str(params, "code")? {
        if code_taken(conn, &code, Some(&course_id))? {
            return Err(HandlerErr::conflict(format!(
                "course code {} already exists",
                code
            )));
        }
        row.code = code;
    }
    if let Some(name) = get_optional_str(params, "name")? {
        row.name = name;
    }
    if let Some(professor) = get_optional_str(params, "professor")? {
        row.professor = Some(professor);
    }
    if let Some(room) = get_optional_str(params, "room")? {
        row.room = Some(room);
    }
    if let Some(time_slot) = get_optional_str(params, "timeSlot")? {
        row.time_slot = Some(time_slot);
    }

    conn.execute(
        "UPDATE courses SET code = ?, name = ?, professor = ?, room = ?, time_slot = ?
         WHERE id = ?",
        (
            &row.code,
            &row.name,
            &row.professor,
            &row.room,
            &row.time_slot,
            &course_id,
        ),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(row.to_json())
}

fn courses_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    if fetch_course(conn, &course_id)?.is_none() {
        return Err(HandlerErr::not_found("course not found"));
    }

    // Dependent rows go first so foreign keys stay satisfied throughout.
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;

    tx.execute(
        "DELETE FROM assignment_statuses
         WHERE assignment_id IN (SELECT id FROM assignments WHERE course_id = ?)",
        [&course_id],
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    tx.execute("DELETE FROM assignments WHERE course_id = ?", [&course_id])
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    tx.execute("DELETE FROM announcements WHERE course_id = ?", [&course_id])
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    tx.execute("DELETE FROM grades WHERE course_id = ?", [&course_id])
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    tx.execute("DELETE FROM attendance WHERE course_id = ?", [&course_id])
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    tx.execute("DELETE FROM courses WHERE id = ?", [&course_id])
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    log::debug!("course {} deleted with dependents", course_id);

    Ok(json!({ "ok": true }))
}

fn with_conn(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(with_conn(state, req, courses_list)),
        "courses.create" => Some(with_conn(state, req, courses_create)),
        "courses.get" => Some(with_conn(state, req, courses_get)),
        "courses.update" => Some(with_conn(state, req, courses_update)),
        "courses.delete" => Some(with_conn(state, req, courses_delete)),
        _ => None,
    }
}
