use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Something `actor` did to a target owned by the recipient
#[derive(Debug, Clone, Copy)]
pub struct Notice<'a> {
    pub recipient: i64,
    pub actor: i64,
    pub verb: &'a str,
    pub target_type: &'a str,
    pub target_id: i64,
    /// Display text captured when the notice is written
    pub target_label: &'a str,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct NotificationResponse {
    pub id: i64,
    /// Actor's username
    pub actor: String,
    pub verb: String,
    pub target: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub read: bool,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub unread: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadAllResponse {
    pub marked_read: u64,
}

/// Lenient boolean query value; `None` for anything unrecognised
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
