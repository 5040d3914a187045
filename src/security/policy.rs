//! Roles and login sessions

use crate::error::{DashboardError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dashboard audience
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    SalesTeam,
    MarketingTeam,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::SalesTeam, Role::MarketingTeam];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::SalesTeam => "Sales Team",
            Role::MarketingTeam => "Marketing Team",
        }
    }

    /// Accepts "Sales Team", "sales-team", "sales_team", "SALESTEAM" and so on
    pub fn parse(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "admin" => Ok(Role::Admin),
            "salesteam" | "sales" => Ok(Role::SalesTeam),
            "marketingteam" | "marketing" => Ok(Role::MarketingTeam),
            _ => Err(DashboardError::Authentication(format!("unknown role '{}'", s))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logged-in user
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub session_id: Uuid,
    pub username: String,
    pub role: Role,
    pub logged_in_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn new(username: String, role: Role) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            username,
            role,
            logged_in_at: Utc::now(),
        }
    }
}

/// Demo login gate: any non-empty username/password pair is accepted and the
/// chosen role is taken at face value.
pub fn login(username: &str, password: &str, role: Role) -> Result<AuthSession> {
    let username = username.trim();
    if username.is_empty() {
        return Err(DashboardError::Authentication("username is required".to_string()));
    }
    if password.is_empty() {
        return Err(DashboardError::Authentication("password is required".to_string()));
    }
    Ok(AuthSession::new(username.to_string(), role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::parse("Admin").unwrap(), Role::Admin);
        assert_eq!(Role::parse("Sales Team").unwrap(), Role::SalesTeam);
        assert_eq!(Role::parse("sales-team").unwrap(), Role::SalesTeam);
        assert_eq!(Role::parse("MARKETING_TEAM").unwrap(), Role::MarketingTeam);
        assert!(Role::parse("intern").is_err());
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn test_login_requires_credentials() {
        let session = login("dana", "secret", Role::MarketingTeam).unwrap();
        assert_eq!(session.username, "dana");
        assert_eq!(session.role, Role::MarketingTeam);
        assert!(matches!(login("  ", "secret", Role::Admin), Err(DashboardError::Authentication(_))));
        assert!(matches!(login("dana", "", Role::Admin), Err(DashboardError::Authentication(_))));
    }
}
