use std::sync::OnceLock;
use tera::{Context, Tera};

use crate::auth::Identity;
use crate::nav::NavShell;

static TERA: OnceLock<Tera> = OnceLock::new();

pub fn get_tera() -> &'static Tera {
    TERA.get_or_init(|| {
        let pattern = "templates/**/*.html";
        match Tera::new(&pattern) {
            Ok(tera) => tera,
            Err(e) => {
                tracing::error!("Failed to load templates from {}: {}", pattern, e);
                Tera::default()
            }
        }
    })
}

/// Context every page starts from: the navigation shell for this visitor.
pub fn base_context(identity: &Identity) -> Context {
    let mut ctx = Context::new();
    ctx.insert("nav", &NavShell::for_identity(identity));
    ctx
}

pub fn render(name: &str, ctx: &Context) -> String {
    get_tera().render(name, ctx).unwrap_or_else(|e| {
        tracing::error!("Template {} failed: {:?}", name, e);
        format!("Template error: {}", name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Role, UserData};
    use uuid::Uuid;

    #[test]
    fn all_templates_load() {
        let names: Vec<_> = get_tera().get_template_names().collect();
        for page in [
            "landing.html",
            "login.html",
            "signup.html",
            "dashboard.html",
            "submit.html",
            "submitted.html",
            "my_listings.html",
            "confirm_delete.html",
            "transactions.html",
            "notice.html",
        ] {
            assert!(names.contains(&page), "missing {}", page);
        }
    }

    fn signed_in(role: Role) -> Identity {
        Identity::Authenticated(UserData {
            id: Uuid::nil(),
            email: "ngo@example.org".to_string(),
            name: Some("Helping Hands".to_string()),
            role: Some(role),
        })
    }

    fn empty_listings_page(identity: &Identity) -> String {
        let mut ctx = base_context(identity);
        ctx.insert("listings", &Vec::<()>::new());
        ctx.insert("error", &Option::<String>::None);
        render("my_listings.html", &ctx)
    }

    #[test]
    fn ngo_empty_listings_page_offers_no_donate_link() {
        let html = empty_listings_page(&signed_in(Role::Ngo));
        assert!(html.contains("You have no listings yet."));
        assert!(html.contains("href=\"/sell\""));
        assert!(!html.contains("href=\"/donate\""));
    }

    #[test]
    fn member_empty_listings_page_offers_donate_link() {
        let html = empty_listings_page(&signed_in(Role::Individual));
        assert!(html.contains("href=\"/donate\""));
    }

    #[test]
    fn confirmation_links_back_to_the_form() {
        for kind in ["sell", "donate"] {
            let mut ctx = base_context(&signed_in(Role::Individual));
            ctx.insert("kind", kind);
            ctx.insert(
                "receipt",
                &serde_json::json!({ "image_url": "/blobs/x.png", "parsed_items": null }),
            );
            let html = render("submitted.html", &ctx);
            assert!(html.contains("Submit another item"), "{}", kind);
            assert!(html.contains(&format!("href=\"/{}\"", kind)), "{}", kind);
        }
    }

    #[test]
    fn notes_field_only_on_donate_form() {
        let form = |kind: &str| {
            let mut ctx = base_context(&signed_in(Role::Individual));
            ctx.insert("kind", kind);
            ctx.insert("pickup_location", "");
            ctx.insert("notes", "");
            ctx.insert("error", &Option::<String>::None);
            render("submit.html", &ctx)
        };
        assert!(!form("sell").contains("name=\"notes\""));
        assert!(form("sell").contains("name=\"pickup_location\""));
        assert!(form("donate").contains("name=\"notes\""));
    }

    #[test]
    fn ngo_shell_renders_without_donate_link() {
        let identity = signed_in(Role::Ngo);
        let mut ctx = base_context(&identity);
        ctx.insert("message", "hello");
        let html = render("notice.html", &ctx);
        assert!(html.contains("Helping Hands"));
        assert!(html.contains("Raise Request"));
        assert!(!html.contains("href=\"/donate\""));
    }
}
