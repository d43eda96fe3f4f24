use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct Script {
    pub id: String,
    pub name: String,
    pub description: String,
    pub script_type: String,
    pub file_path: String,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateScriptRequest {
    pub name: String,
    pub description: Option<String>,
    pub script_type: String,
    pub file_path: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateScriptRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub script_type: Option<String>,
    pub file_path: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RunScriptRequest {
    pub parameters: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScriptExecution {
    pub id: String,
    pub script_id: String,
    pub user_id: String,
    pub parameters: serde_json::Value,
    pub status: String,
    pub output: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
