use chrono::{DateTime, Utc};
use serde::Serialize;

/// An integration credential stored through the settings API.
#[derive(Debug, Clone, Serialize)]
pub struct ApiSetting {
    pub platform: String,
    pub setting_key: String,
    pub setting_value: String,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}
