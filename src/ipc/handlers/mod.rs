pub mod core;
pub mod marks;
pub mod reports;
pub mod students;

use super::{err, Request};

/// Pulls a required string param, trimmed. The `Err` side is the
/// ready-to-send `bad_params` response.
fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    let v = match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return Err(err(&req.id, "bad_params", format!("missing {key}"), None)),
    };
    if v.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{key} must not be empty"),
            None,
        ));
    }
    Ok(v)
}
