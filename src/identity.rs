use serde::{Deserialize, Serialize};

/// Server-confirmed user record returned by the whoami endpoint.
///
/// Replaced wholesale on every successful identity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Stored locale preference (`en`, `ar`, ...)
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub date_joined: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Envelope of `GET /api/users/whoami`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhoamiResponse {
    pub user: Identity,
}

impl Identity {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_staff || self.permissions.iter().any(|p| p == permission)
    }
}
