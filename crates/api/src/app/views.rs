//! Server-rendered pages.
//!
//! Every interpolated value goes through `html_escape`.

use reskill_auth::{AdminIdentity, CompanyIdentity, RealmKind};
use reskill_infra::html::html_escape;
use reskill_infra::{Campaign, Company};

/// Shown under the email field for every rejected login.
pub const INVALID_CREDENTIALS: &str = "These credentials do not match our records.";

/// Field-level messages for the login form.
#[derive(Debug, Default, Clone)]
pub struct LoginErrors {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginErrors {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{title}</title></head><body>{body}</body></html>",
        title = html_escape(title),
    )
}

fn field_error(field: &str, message: Option<&str>) -> String {
    message
        .map(|m| format!("<p class=\"error\" data-field=\"{field}\">{}</p>", html_escape(m)))
        .unwrap_or_default()
}

fn logout_form(action: &str, csrf_token: &str) -> String {
    format!(
        "<form method=\"post\" action=\"{action}\">\
         <input type=\"hidden\" name=\"_token\" value=\"{}\">\
         <button type=\"submit\">Log out</button></form>",
        html_escape(csrf_token),
    )
}

pub fn login_page(
    realm: RealmKind,
    action: &str,
    csrf_token: &str,
    old_email: &str,
    errors: &LoginErrors,
) -> String {
    let title = match realm {
        RealmKind::Admin => "Administrator login",
        RealmKind::Company => "Company login",
    };
    let body = format!(
        "<h1>{title}</h1>\
         <form method=\"post\" action=\"{action}\">\
         <input type=\"hidden\" name=\"_token\" value=\"{token}\">\
         <label>Email <input type=\"email\" name=\"email\" value=\"{email}\" required autofocus></label>\
         {email_error}\
         <label>Password <input type=\"password\" name=\"password\" required></label>\
         {password_error}\
         <label><input type=\"checkbox\" name=\"remember\" value=\"1\"> Remember me</label>\
         <button type=\"submit\">Log in</button></form>",
        token = html_escape(csrf_token),
        email = html_escape(old_email),
        email_error = field_error("email", errors.email.as_deref()),
        password_error = field_error("password", errors.password.as_deref()),
    );
    layout(title, &body)
}

pub fn admin_dashboard(
    admin: &AdminIdentity,
    companies: &[(Company, usize)],
    logout_action: &str,
    csrf_token: &str,
) -> String {
    let rows: String = companies
        .iter()
        .map(|(company, campaigns)| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{campaigns}</td></tr>",
                company.id,
                html_escape(&company.name),
            )
        })
        .collect();
    let body = format!(
        "<h1>Companies</h1><p>Signed in as {name}</p>\
         <table><thead><tr><th>Id</th><th>Company</th><th>Campaigns</th></tr></thead>\
         <tbody>{rows}</tbody></table>{logout}",
        name = html_escape(&admin.name),
        logout = logout_form(logout_action, csrf_token),
    );
    layout("Administration", &body)
}

pub fn company_dashboard(
    user: &CompanyIdentity,
    company: Option<&Company>,
    campaigns: &[Campaign],
    logout_action: &str,
    csrf_token: &str,
) -> String {
    let rows: String = campaigns
        .iter()
        .map(|c| {
            format!(
                "<li data-campaign=\"{}\">{} <code>{}</code></li>",
                c.id,
                html_escape(&c.name),
                html_escape(&c.code),
            )
        })
        .collect();
    let heading = company.map_or("Dashboard", |c| c.name.as_str());
    let body = format!(
        "<h1>{heading}</h1><p data-tenant=\"{tenant}\">Signed in as {name}</p>\
         <h2>Campaigns</h2><ul>{rows}</ul>{logout}",
        heading = html_escape(heading),
        tenant = user.tenant_id(),
        name = html_escape(&user.name),
        logout = logout_form(logout_action, csrf_token),
    );
    layout("Dashboard", &body)
}

pub fn invitation_page(campaign: &Campaign, company: Option<&Company>) -> String {
    let host = company.map(|c| format!("<p>Invited by {}</p>", html_escape(&c.name)));
    let body = format!(
        "<h1>{}</h1>{}<p>Thank you for taking part.</p>",
        html_escape(&campaign.name),
        host.unwrap_or_default(),
    );
    layout(&campaign.name, &body)
}

pub fn forbidden_page() -> String {
    layout("Forbidden", "<h1>403</h1><p>You do not have access to this page.</p>")
}

pub fn page_expired() -> String {
    layout("Page expired", "<h1>419</h1><p>The page expired. Reload it and try again.</p>")
}

pub fn not_found_page() -> String {
    layout("Not found", "<h1>404</h1><p>This page does not exist.</p>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_page_escapes_old_input_and_marks_email_error() {
        let errors = LoginErrors {
            email: Some(INVALID_CREDENTIALS.to_string()),
            password: None,
        };
        let html = login_page(RealmKind::Company, "/company/login", "tok", "\"><script>", &errors);
        assert!(html.contains("value=\"&quot;&gt;&lt;script&gt;\""));
        assert!(html.contains("data-field=\"email\""));
        assert!(!html.contains("data-field=\"password\""));
        assert!(html.contains("name=\"_token\" value=\"tok\""));
    }

    #[test]
    fn forbidden_page_names_no_tenant() {
        assert!(!forbidden_page().contains("company_id"));
    }
}
