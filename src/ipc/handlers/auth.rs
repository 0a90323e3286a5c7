use crate::auth::{hash_password, role_for_username, verify_password};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn register(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let username = get_required_str(params, "username")?;
    let password = get_required_str(params, "password")?;

    let taken = conn
        .query_row("SELECT 1 FROM users WHERE username = ?", [&username], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(HandlerErr::db)?
        .is_some();
    if taken {
        return Err(HandlerErr::conflict("username already exists"));
    }

    let id = Uuid::new_v4().to_string();
    let role = role_for_username(&username);
    conn.execute(
        "INSERT INTO users(id, username, password_hash, role) VALUES(?, ?, ?, ?)",
        (&id, &username, &hash_password(&password), role.as_str()),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    Ok(json!({
        "id": id,
        "username": username,
        "role": role.as_str()
    }))
}

fn login(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let username = get_required_str(params, "username")?;
    let password = get_required_str(params, "password")?;

    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT id, password_hash, role FROM users WHERE username = ?",
            [&username],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
        .map_err(HandlerErr::db)?;

    // Same response whether the user is unknown or the password is wrong.
    let Some((id, stored_hash, role)) = row else {
        return Err(HandlerErr::new("unauthorized", "invalid credentials"));
    };
    if !verify_password(&password, &stored_hash) {
        return Err(HandlerErr::new("unauthorized", "invalid credentials"));
    }

    Ok(json!({
        "id": id,
        "username": username,
        "role": role
    }))
}

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match register(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match login(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.register" => Some(handle_register(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        _ => None,
    }
}
