use serde::Serialize;

use crate::auth::{Audience, Identity, UserData};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub href: &'static str,
    pub label: &'static str,
}

const fn link(href: &'static str, label: &'static str) -> NavLink {
    NavLink { href, label }
}

/// Sidebar, quick actions and role badge for the page chrome.
#[derive(Debug, Clone, Serialize)]
pub struct NavShell {
    pub signed_in: bool,
    pub display_name: Option<String>,
    pub role_label: Option<&'static str>,
    pub links: Vec<NavLink>,
    pub quick_actions: Vec<NavLink>,
    pub can_donate: bool,
}

impl NavShell {
    pub fn for_identity(identity: &Identity) -> Self {
        match identity.user() {
            Some(user) => Self::for_user(user),
            None => Self::anonymous(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            signed_in: false,
            display_name: None,
            role_label: None,
            links: vec![link("/landing", "Home")],
            quick_actions: vec![link("/login", "Login"), link("/signup", "Sign Up")],
            can_donate: false,
        }
    }

    pub fn for_user(user: &UserData) -> Self {
        let audience = user.audience();
        let (quick_actions, role_label) = match audience {
            Audience::Ngo => (vec![link("/dashboard#raise-request", "Raise Request")], "NGO"),
            Audience::Member(role) => (
                vec![link("/sell", "Sell Products"), link("/donate", "Donate Items")],
                role.label(),
            ),
            Audience::Unassigned => (
                vec![link("/sell", "Sell Products"), link("/donate", "Donate Items")],
                "Member",
            ),
        };

        Self {
            signed_in: true,
            display_name: Some(user.display_name().to_string()),
            role_label: Some(role_label),
            links: vec![
                link("/dashboard", "Dashboard"),
                link("/my-listings", "My Listings"),
                link("/transactions", "Transactions"),
            ],
            quick_actions,
            can_donate: audience != Audience::Ngo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use uuid::Uuid;

    fn user(role: Option<Role>) -> UserData {
        UserData {
            id: Uuid::nil(),
            email: "u@example.com".to_string(),
            name: None,
            role,
        }
    }

    fn hrefs(links: &[NavLink]) -> Vec<&'static str> {
        links.iter().map(|l| l.href).collect()
    }

    #[test]
    fn ngo_never_sees_donate() {
        let shell = NavShell::for_user(&user(Some(Role::Ngo)));
        assert!(!shell.can_donate);
        assert!(!hrefs(&shell.quick_actions).contains(&"/donate"));
        assert_eq!(hrefs(&shell.quick_actions), vec!["/dashboard#raise-request"]);
        assert_eq!(shell.role_label, Some("NGO"));
    }

    #[test]
    fn members_sell_and_donate() {
        for role in [Some(Role::Individual), Some(Role::Organization), None] {
            let shell = NavShell::for_user(&user(role));
            assert!(shell.can_donate);
            assert_eq!(hrefs(&shell.quick_actions), vec!["/sell", "/donate"]);
        }
        assert_eq!(NavShell::for_user(&user(None)).role_label, Some("Member"));
        assert_eq!(
            NavShell::for_user(&user(Some(Role::Organization))).role_label,
            Some("Organization")
        );
    }

    #[test]
    fn every_signed_in_user_gets_the_base_links() {
        let shell = NavShell::for_user(&user(Some(Role::Ngo)));
        assert_eq!(hrefs(&shell.links), vec!["/dashboard", "/my-listings", "/transactions"]);
        assert_eq!(shell.display_name.as_deref(), Some("u@example.com"));
    }

    #[test]
    fn anonymous_visitors_get_login_links() {
        let shell = NavShell::for_identity(&Identity::Anonymous);
        assert!(!shell.signed_in);
        assert_eq!(hrefs(&shell.quick_actions), vec!["/login", "/signup"]);
    }
}
