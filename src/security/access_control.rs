//! Access Control
//!
//! Role-gated page visibility.

use crate::error::{DashboardError, Result};
use crate::pages::PageId;
use crate::security::policy::{AuthSession, Role};
use itertools::Itertools;

/// Pages visible to `role`, in navigation order
pub fn pages_for(role: Role) -> Vec<PageId> {
    match role {
        Role::Admin => PageId::ALL.to_vec(),
        Role::SalesTeam => vec![
            PageId::Overview,
            PageId::JobsAndRequests,
            PageId::SalesTeam,
            PageId::Location,
        ],
        Role::MarketingTeam => vec![PageId::Overview, PageId::CustomerEngagement, PageId::Location],
    }
}

/// Access controller
pub struct AccessController {
    session: AuthSession,
}

impl AccessController {
    pub fn new(session: AuthSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn pages(&self) -> Vec<PageId> {
        pages_for(self.session.role)
    }

    pub fn can_view(&self, page: PageId) -> bool {
        pages_for(self.session.role).contains(&page)
    }

    /// Authorize access to a page
    pub fn authorize(&self, page: PageId) -> Result<()> {
        if self.can_view(page) {
            Ok(())
        } else {
            Err(DashboardError::AccessDenied(format!(
                "{} ({}) cannot open '{}'; available: {}",
                self.session.username,
                self.session.role,
                page.title(),
                self.pages().iter().map(|p| p.title()).join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::policy::login;

    #[test]
    fn test_pages_per_role() {
        assert_eq!(pages_for(Role::Admin).len(), 5);
        assert_eq!(
            pages_for(Role::SalesTeam),
            vec![PageId::Overview, PageId::JobsAndRequests, PageId::SalesTeam, PageId::Location]
        );
        assert_eq!(
            pages_for(Role::MarketingTeam),
            vec![PageId::Overview, PageId::CustomerEngagement, PageId::Location]
        );
    }

    #[test]
    fn test_authorize_denies_hidden_pages() {
        let controller = AccessController::new(login("mo", "pw", Role::MarketingTeam).unwrap());
        assert!(controller.authorize(PageId::CustomerEngagement).is_ok());
        assert!(matches!(
            controller.authorize(PageId::SalesTeam),
            Err(DashboardError::AccessDenied(_))
        ));
    }
}
