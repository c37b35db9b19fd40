//! Realm session cookies.

use axum::http::{HeaderMap, header};

use reskill_auth::{Session, SessionId};

/// The session id presented in cookie `name`, if it is well-formed.
pub fn session_id(headers: &HeaderMap, name: &str) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| SessionId::parse(value))
}

/// `Set-Cookie` value for a session.
///
/// Remembered bindings get a `Max-Age`; everything else is a browser-session
/// cookie.
pub fn session_cookie(name: &str, session: &Session, secure: bool) -> String {
    let mut cookie = format!("{name}={}; HttpOnly; SameSite=Lax; Path=/", session.id.as_str());
    if secure {
        cookie.push_str("; Secure");
    }
    if let Some(binding) = session.binding.as_ref().filter(|b| b.remember) {
        let max_age = (binding.expires_at - binding.bound_at).num_seconds().max(0);
        cookie.push_str(&format!("; Max-Age={max_age}"));
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::{Duration, Utc};
    use reskill_auth::Binding;
    use reskill_core::IdentityId;

    #[test]
    fn finds_named_cookie_among_others() {
        let session = Session::guest(Utc::now());
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!(
                "theme=dark; reskill_admin_session={}; other=1",
                session.id.as_str()
            ))
            .unwrap(),
        );
        assert_eq!(session_id(&headers, "reskill_admin_session"), Some(session.id));
        assert_eq!(session_id(&headers, "reskill_company_session"), None);
    }

    #[test]
    fn malformed_ids_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("reskill_admin_session=abc"));
        assert_eq!(session_id(&headers, "reskill_admin_session"), None);
    }

    #[test]
    fn remembered_bindings_get_max_age() {
        let now = Utc::now();
        let mut session = Session::guest(now);
        let plain = session_cookie("c", &session, true);
        assert!(plain.contains("HttpOnly"));
        assert!(plain.ends_with("; Secure"));
        assert!(!plain.contains("Max-Age"));

        session.binding = Some(Binding {
            identity_id: IdentityId::new(),
            bound_at: now,
            expires_at: now + Duration::days(30),
            remember: true,
        });
        let remembered = session_cookie("c", &session, false);
        assert!(!remembered.contains("Secure"));
        assert!(remembered.ends_with(&format!("Max-Age={}", 30 * 24 * 3600)));
    }
}
