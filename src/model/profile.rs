use serde::{Deserialize, Serialize};

/// Read model over the external user directory. This service only ever
/// reads `is_active` and `manager_id`; profile data is owned elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: u64,
    pub manager_id: Option<u64>,
    pub is_active: bool,
}
