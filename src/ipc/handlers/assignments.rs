use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    course_exists, get_optional_str, get_required_str, parse_date_param, today_string,
    user_exists, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

const STATUS_TODO: &str = "todo";
const STATUS_IN_PROGRESS: &str = "in_progress";
const STATUS_DONE: &str = "done";

fn parse_status(raw: &str) -> Result<&'static str, HandlerErr> {
    match raw {
        "todo" => Ok(STATUS_TODO),
        "in_progress" => Ok(STATUS_IN_PROGRESS),
        "done" => Ok(STATUS_DONE),
        _ => Err(HandlerErr::bad_params(
            "status must be todo, in_progress, or done",
        )),
    }
}

struct AssignmentRow {
    id: String,
    course_id: String,
    title: String,
    description: Option<String>,
    due_date: String,
}

impl AssignmentRow {
    fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "courseId": self.course_id,
            "title": self.title,
            "description": self.description,
            "dueDate": self.due_date
        })
    }
}

fn fetch_assignment(
    conn: &Connection,
    assignment_id: &str,
) -> Result<Option<AssignmentRow>, HandlerErr> {
    conn.query_row(
        "SELECT id, course_id, title, description, due_date FROM assignments WHERE id = ?",
        [assignment_id],
        |r| {
            Ok(AssignmentRow {
                id: r.get(0)?,
                course_id: r.get(1)?,
                title: r.get(2)?,
                description: r.get(3)?,
                due_date: r.get(4)?,
            })
        },
    )
    .optional()
    .map_err(HandlerErr::db)
}

fn statuses_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<HashMap<String, String>, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT assignment_id, status FROM assignment_statuses WHERE user_id = ?")
        .map_err(HandlerErr::db)?;
    let rows = stmt
        .query_map([user_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db)?;
    Ok(rows.into_iter().collect())
}

fn assignments_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_optional_str(params, "userId")?;
    let course_id = get_optional_str(params, "courseId")?;

    if let Some(uid) = user_id.as_deref() {
        if !user_exists(conn, uid)? {
            return Err(HandlerErr::not_found("user not found"));
        }
    }

    let mut sql = String::from(
        "SELECT id, course_id, title, description, due_date FROM assignments",
    );
    if course_id.is_some() {
        sql.push_str(" WHERE course_id = ?");
    }
    sql.push_str(" ORDER BY due_date, id");

    let mut stmt = conn.prepare(&sql).map_err(HandlerErr::db)?;
    let map_row = |r: &rusqlite::Row<'_>| -> rusqlite::Result<AssignmentRow> {
        Ok(AssignmentRow {
            id: r.get(0)?,
            course_id: r.get(1)?,
            title: r.get(2)?,
            description: r.get(3)?,
            due_date: r.get(4)?,
        })
    };
    let rows = match course_id.as_deref() {
        Some(cid) => stmt
            .query_map([cid], map_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
        None => stmt
            .query_map([], map_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
    }
    .map_err(HandlerErr::db)?;

    let statuses = match user_id.as_deref() {
        Some(uid) => Some(statuses_for_user(conn, uid)?),
        None => None,
    };
    let today = today_string();

    let rows_json: Vec<serde_json::Value> = rows
        .iter()
        .map(|a| {
            let mut v = a.to_json();
            if let Some(statuses) = &statuses {
                let status = statuses
                    .get(&a.id)
                    .map(|s| s.as_str())
                    .unwrap_or(STATUS_TODO);
                let overdue = a.due_date.as_str() < today.as_str() && status != STATUS_DONE;
                v["status"] = json!(status);
                v["completed"] = json!(status == STATUS_DONE);
                v["overdue"] = json!(overdue);
            }
            v
        })
        .collect();

    Ok(json!({ "assignments": rows_json }))
}

fn assignments_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = get_required_str(params, "courseId")?;
    let title = get_required_str(params, "title")?;
    let due_date = parse_date_param(&get_required_str(params, "dueDate")?, "dueDate")?;
    let description = get_optional_str(params, "description")?;

    if !course_exists(conn, &course_id)? {
        return Err(HandlerErr::not_found("course not found"));
    }

    let row = AssignmentRow {
        id: Uuid::new_v4().to_string(),
        course_id,
        title,
        description,
        due_date,
    };
    conn.execute(
        "INSERT INTO assignments(id, course_id, title, description, due_date)
         VALUES(?, ?, ?, ?, ?)",
        (
            &row.id,
            &row.course_id,
            &row.title,
            &row.description,
            &row.due_date,
        ),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(row.to_json())
}

fn assignments_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let assignment_id = get_required_str(params, "assignmentId")?;
    let Some(mut row) = fetch_assignment(conn, &assignment_id)? else {
        return Err(HandlerErr::not_found("assignment not found"));
    };

    if let Some(course_id) = get_optional_str(params, "courseId")? {
        if !course_exists(conn, &course_id)? {
            return Err(HandlerErr::not_found("course not found"));
        }
        row.course_id = course_id;
    }
    if let Some(title) = get_optional_str(params, "title")? {
        row.title = title;
    }
    if let Some(description) = get_optional_str(params, "description")? {
        row.description = Some(description);
    }
    if let Some(due_date) = get_optional_str(params, "dueDate")? {
        row.due_date = parse_date_param(&due_date, "dueDate")?;
    }

    conn.execute(
        "UPDATE assignments SET course_id = ?, title = ?, description = ?, due_date = ?
         WHERE id = ?",
        (
            &row.course_id,
            &row.title,
            &row.description,
            &row.due_date,
            &assignment_id,
        ),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(row.to_json())
}

fn assignments_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let assignment_id = get_required_str(params, "assignmentId")?;
    if fetch_assignment(conn, &assignment_id)?.is_none() {
        return Err(HandlerErr::not_found("assignment not found"));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute(
        "DELETE FROM assignment_statuses WHERE assignment_id = ?",
        [&assignment_id],
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    tx.execute("DELETE FROM assignments WHERE id = ?", [&assignment_id])
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({ "ok": true }))
}

fn assignments_set_status(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let assignment_id = get_required_str(params, "assignmentId")?;
    let user_id = get_required_str(params, "userId")?;
    let status = parse_status(&get_required_str(params, "status")?)?;

    if fetch_assignment(conn, &assignment_id)?.is_none() {
        return Err(HandlerErr::not_found("assignment not found"));
    }
    if !user_exists(conn, &user_id)? {
        return Err(HandlerErr::not_found("user not found"));
    }

    conn.execute(
        "INSERT INTO assignment_statuses(assignment_id, user_id, status, updated_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(assignment_id, user_id) DO UPDATE SET
           status = excluded.status,
           updated_at = excluded.updated_at",
        (&assignment_id, &user_id, status, &today_string()),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(json!({
        "assignmentId": assignment_id,
        "userId": user_id,
        "status": status
    }))
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
        "assignments.list" => Some(with_conn(state, req, assignments_list)),
        "assignments.create" => Some(with_conn(state, req, assignments_create)),
        "assignments.update" => Some(with_conn(state, req, assignments_update)),
        "assignments.delete" => Some(with_conn(state, req, assignments_delete)),
        "assignments.setStatus" => Some(with_conn(state, req, assignments_set_status)),
        _ => None,
    }
}
