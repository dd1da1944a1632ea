use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Album {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub created_at: String,
}
