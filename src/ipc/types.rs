use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Caller roles. Attendance recording is open to teachers; mass justification,
/// discrepancy tooling and the audit log are preceptor/admin territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Docente,
    Preceptor,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "docente" => Some(Role::Docente),
            "preceptor" => Some(Role::Preceptor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Docente => "docente",
            Role::Preceptor => "preceptor",
            Role::Admin => "admin",
        }
    }

    pub fn can_administer(&self) -> bool {
        matches!(self, Role::Preceptor | Role::Admin)
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    /// Authoritative record store (ledgers + reference data).
    pub ledger: Option<Connection>,
    /// On-device store (caches + sync outbox).
    pub local: Option<Connection>,
    /// Connectivity as reported by the platform network watcher.
    pub online: bool,
    pub role: Role,
}
