//! Login against the fixed role accounts.
//!
//! This is role gating for the UI, not a security boundary: the accounts
//! are built in and passwords are compared in plain text.

use serde::Serialize;

use crate::model::{Role, User};

/// Built-in accounts: username, password, display name, role.
const ACCOUNTS: [(&str, &str, &str, Role); 3] = [
    ("admin", "admin", "Administrator", Role::Admin),
    ("guru", "guru", "Guru Kelas", Role::Teacher),
    ("ortu", "ortu", "Orang Tua", Role::Parent),
];

/// Resolves a username/password pair to its user.
pub fn authenticate(username: &str, password: &str) -> Option<User> {
    ACCOUNTS
        .iter()
        .find(|(u, p, _, _)| *u == username && *p == password)
        .map(|(u, _, name, role)| User::new(*u, *name, *role))
}

/// A logged-in session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub token: String,
    pub started_at: i64,
}

impl Session {
    pub fn start(user: User) -> Self {
        Self {
            user,
            token: generate_session_token(),
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Random opaque session token.
pub fn generate_session_token() -> String {
    use sha2::{Digest, Sha256};
    let random_bytes: [u8; 32] = rand::random();
    let mut hasher = Sha256::new();
    hasher.update(random_bytes);
    hasher.update(chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hex::encode(hasher.finalize())
}
