use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    course_exists, get_optional_str, get_required_str, parse_date_param, today_string,
    user_exists, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn parse_mark_status(raw: &str) -> Result<&'static str, HandlerErr> {
    match raw {
        "present" => Ok("present"),
        "absent" => Ok("absent"),
        _ => Err(HandlerErr::bad_params("status must be present or absent")),
    }
}

fn attendance_mark(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let course_id = get_required_str(params, "courseId")?;
    let status = match get_optional_str(params, "status")? {
        Some(raw) => parse_mark_status(&raw)?,
        None => "present",
    };
    let date = match get_optional_str(params, "date")? {
        Some(raw) => parse_date_param(&raw, "date")?,
        None => today_string(),
    };

    if !user_exists(conn, &user_id)? {
        return Err(HandlerErr::not_found("user not found"));
    }
    if !course_exists(conn, &course_id)? {
        return Err(HandlerErr::not_found("course not found"));
    }

    let duplicate = conn
        .query_row(
            "SELECT 1 FROM attendance WHERE user_id = ? AND course_id = ? AND date = ?",
            (&user_id, &course_id, &date),
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .map_err(HandlerErr::db)?
        .is_some();
    if duplicate {
        return Err(HandlerErr::conflict(format!(
            "attendance for {} already recorded",
            date
        )));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO attendance(id, user_id, course_id, date, status)
         VALUES(?, ?, ?, ?, ?)",
        (&id, &user_id, &course_id, &date, status),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(json!({
        "id": id,
        "userId": user_id,
        "courseId": course_id,
        "date": date,
        "status": status
    }))
}

fn attendance_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    let course_id = get_optional_str(params, "courseId")?;

    if !user_exists(conn, &user_id)? {
        return Err(HandlerErr::not_found("user not found"));
    }

    let mut sql = String::from(
        "SELECT id, course_id, date, status FROM attendance WHERE user_id = ?",
    );
    if course_id.is_some() {
        sql.push_str(" AND course_id = ?");
    }
    sql.push_str(" ORDER BY date DESC, id");

    let mut stmt = conn.prepare(&sql).map_err(HandlerErr::db)?;
    let map_row = |r: &rusqlite::Row<'_>| -> rusqlite::Result<serde_json::Value> {
        let id: String = r.get(0)?;
        let course_id: String = r.get(1)?;
        let date: String = r.get(2)?;
        let status: String = r.get(3)?;
        Ok(json!({
            "id": id,
            "courseId": course_id,
            "date": date,
            "status": status
        }))
    };
    let rows = match course_id.as_deref() {
        Some(cid) => stmt
            .query_map((&user_id, cid), map_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
        None => stmt
            .query_map([&user_id], map_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
    }
    .map_err(HandlerErr::db)?;

    Ok(json!({ "records": rows }))
}

fn attendance_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    if !user_exists(conn, &user_id)? {
        return Err(HandlerErr::not_found("user not found"));
    }

    let mut stmt = conn
        .prepare(
            "SELECT
               a.course_id,
               c.code,
               SUM(CASE WHEN a.status = 'present' THEN 1 ELSE 0 END) AS present,
               COUNT(*) AS total
             FROM attendance a
             JOIN courses c ON c.id = a.course_id
             WHERE a.user_id = ?
             GROUP BY a.course_id, c.code
             ORDER BY c.code",
        )
        .map_err(HandlerErr::db)?;
    let rows = stmt
        .query_map([&user_id], |r| {
            let course_id: String = r.get(0)?;
            let code: String = r.get(1)?;
            let present: i64 = r.get(2)?;
            let total: i64 = r.get(3)?;
            Ok((course_id, code, present, total))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::db)?;

    let summary: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|(course_id, code, present, total)| {
            json!({
                "courseId": course_id,
                "code": code,
                "present": present,
                "total": total,
                "percentage": calc::attendance_percent(present as usize, total as usize)
            })
        })
        .collect();

    Ok(json!({ "summary": summary }))
}

fn attendance_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let record_id = get_required_str(params, "recordId")?;
    let deleted = conn
        .execute("DELETE FROM attendance WHERE id = ?", [&record_id])
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    if deleted == 0 {
        return Err(HandlerErr::not_found("attendance record not found"));
    }
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
        "attendance.mark" => Some(with_conn(state, req, attendance_mark)),
        "attendance.list" => Some(with_conn(state, req, attendance_list)),
        "attendance.summary" => Some(with_conn(state, req, attendance_summary)),
        "attendance.delete" => Some(with_conn(state, req, attendance_delete)),
        _ => None,
    }
}
