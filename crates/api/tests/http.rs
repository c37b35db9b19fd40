//! Router-level tests driven with `tower::ServiceExt::oneshot`.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use axum::Router;
use reskill_api::app::{AppServices, build_app, build_services};
use reskill_api::config::AppConfig;
use reskill_auth::{
    AdminIdentity, CompanyIdentity, Identity, IdentityStore, PasswordHash, hash_password,
};
use reskill_core::{EmailAddress, TenantId};
use reskill_infra::{InvitationStatus, ResponseStatus};
use serde_json::{Value, json};
use tower::ServiceExt;

const PASSWORD: &str = "correct-horse";
const ACME: TenantId = TenantId::new(7);
const GLOBEX: TenantId = TenantId::new(9);

fn password_hash() -> PasswordHash {
    // Argon2 is slow in debug builds; hash once.
    static HASH: OnceLock<PasswordHash> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap()).clone()
}

fn email(raw: &str) -> EmailAddress {
    EmailAddress::parse(raw).unwrap()
}

struct Harness {
    services: Arc<AppServices>,
    app: Router,
}

fn harness() -> Harness {
    harness_with(AppConfig {
        secure_cookies: false,
        public_url: Some("https://app.test".into()),
        ..AppConfig::default()
    })
}

fn harness_with(config: AppConfig) -> Harness {
    let services = Arc::new(build_services(config).unwrap());

    services.companies.register(ACME, "Acme").unwrap();
    services.companies.register(GLOBEX, "Globex").unwrap();
    services
        .admin_identities
        .insert(AdminIdentity::new("Admin", email("admin@reskilling.com"), password_hash()))
        .unwrap();
    services
        .company_identities
        .insert(CompanyIdentity::new(ACME, "Ops", email("ops@acme.com"), password_hash()))
        .unwrap();
    services
        .company_identities
        .insert(
            CompanyIdentity::new(ACME, "Former", email("former@acme.com"), password_hash())
                .deactivated(),
        )
        .unwrap();

    let app = build_app(services.clone());
    Harness { services, app }
}

impl Harness {
    async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut req = Request::get(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, cookie: Option<&str>, fields: &[(&str, &str)]) -> Response<Body> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let mut req = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::from(body)).unwrap()).await
    }

    async fn post_json(&self, uri: &str, session: Option<&Session>, body: Value) -> Response<Body> {
        let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(s) = session {
            req = req
                .header(header::COOKIE, &s.cookie)
                .header("x-csrf-token", &s.token);
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    /// Open the login form and return the guest session it created.
    async fn guest(&self, login_path: &str, cookie: Option<&str>) -> Session {
        let res = self.get(login_path, cookie).await;
        assert_eq!(res.status(), StatusCode::OK);
        let cookie = session_cookie(&res).unwrap();
        let token = csrf_token(&text(res).await);
        Session { cookie, token }
    }

    async fn login(&self, realm: &str, user: &str, password: &str) -> Response<Body> {
        let login_path = format!("/{realm}/login");
        let guest = self.guest(&login_path, None).await;
        self.post_form(
            &login_path,
            Some(&guest.cookie),
            &[("_token", guest.token.as_str()), ("email", user), ("password", password)],
        )
        .await
    }

    /// Log in and return the authenticated session with its token.
    async fn signed_in(&self, realm: &str, user: &str) -> Session {
        let res = self.login(realm, user, PASSWORD).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        let cookie = session_cookie(&res).unwrap();
        let token = self
            .services_token(realm, &cookie)
            .expect("authenticated session has a token");
        Session { cookie, token }
    }

    fn services_token(&self, realm: &str, cookie: &str) -> Option<String> {
        let id = reskill_auth::SessionId::parse(cookie.split_once('=')?.1)?;
        let session = match realm {
            "admin" => self.services.admin.start(Some(&id), chrono::Utc::now()),
            _ => self.services.company.start(Some(&id), chrono::Utc::now()),
        };
        Some(session.csrf_token.as_str().to_string())
    }
}

struct Session {
    cookie: String,
    token: String,
}

fn session_cookie(res: &Response<Body>) -> Option<String> {
    res.headers()
        .get(header::SET_COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::to_string)
}

fn location(res: &Response<Body>) -> &str {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn text(res: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn json_body(res: Response<Body>) -> Value {
    serde_json::from_str(&text(res).await).unwrap()
}

fn csrf_token(html: &str) -> String {
    let marker = "name=\"_token\" value=\"";
    let start = html.find(marker).unwrap() + marker.len();
    html[start..].split('"').next().unwrap().to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Login
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_login_lands_on_dashboard_with_a_new_session() {
    let h = harness();
    let guest = h.guest("/admin/login", None).await;

    let res = h
        .post_form(
            "/admin/login",
            Some(&guest.cookie),
            &[("_token", guest.token.as_str()), ("email", "admin@reskilling.com"), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/admin");
    let cookie = session_cookie(&res).unwrap();
    assert_ne!(cookie, guest.cookie);

    let res = h.get("/admin", Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let html = text(res).await;
    assert!(html.contains("Acme"));
    assert!(html.contains("Globex"));

    // The guest id never becomes authenticated.
    let res = h.get("/admin", Some(&guest.cookie)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn signed_in_visitor_skips_the_login_form() {
    let h = harness();
    let admin = h.signed_in("admin", "admin@reskilling.com").await;
    let res = h.get("/admin/login", Some(&admin.cookie)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/admin");
}

#[tokio::test]
async fn rejected_logins_share_one_message_on_the_email_field() {
    let h = harness();
    let cases = [
        ("admin", "admin@reskilling.com", "wrong-horse"),
        ("admin", "nobody@reskilling.com", PASSWORD),
        ("company", "ops@acme.com", "correct-horsf"),
        ("company", "former@acme.com", PASSWORD),
    ];

    for (realm, user, password) in cases {
        let res = h.login(realm, user, password).await;
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY, "{realm} {user}");
        let html = text(res).await;
        assert!(html.contains("data-field=\"email\""));
        assert!(html.contains("These credentials do not match our records."));
        assert!(!html.contains("data-field=\"password\""));
        assert!(html.contains(&format!("value=\"{user}\"")));
    }
}

#[tokio::test]
async fn malformed_input_is_rejected_before_authentication() {
    let h = harness();
    let res = h.login("company", "not-an-email", "").await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = text(res).await;
    assert!(html.contains("data-field=\"email\""));
    assert!(html.contains("data-field=\"password\""));
}

#[tokio::test]
async fn company_login_records_last_login() {
    let h = harness();
    h.signed_in("company", "ops@acme.com").await;
    let user = h
        .services
        .company_identities
        .find_by_email(&email("ops@acme.com"))
        .unwrap()
        .unwrap();
    assert!(user.last_login_at.is_some());
}

#[tokio::test]
async fn remember_me_sets_a_persistent_cookie() {
    let h = harness();
    let guest = h.guest("/company/login", None).await;
    let res = h
        .post_form(
            "/company/login",
            Some(&guest.cookie),
            &[
                ("_token", guest.token.as_str()),
                ("email", "ops@acme.com"),
                ("password", PASSWORD),
                ("remember", "1"),
            ],
        )
        .await;
    let raw = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(raw.contains("Max-Age="));
}

#[tokio::test]
async fn posts_without_the_session_token_expire() {
    let h = harness();
    let guest = h.guest("/company/login", None).await;
    let res = h
        .post_form(
            "/company/login",
            Some(&guest.cookie),
            &[("email", "ops@acme.com"), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(res.status().as_u16(), 419);

    let res = h
        .post_form(
            "/company/login",
            Some(&guest.cookie),
            &[("_token", "forged"), ("email", "ops@acme.com"), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(res.status().as_u16(), 419);
}

#[tokio::test]
async fn realms_do_not_share_sessions() {
    let h = harness();
    let admin = h.signed_in("admin", "admin@reskilling.com").await;
    let value = admin.cookie.split_once('=').unwrap().1;
    let res = h
        .get("/company/dashboard", Some(&format!("reskill_company_session={value}")))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/company/login");
}

// ─────────────────────────────────────────────────────────────────────────────
// Logout
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn logout_ends_the_session_and_is_safe_to_repeat() {
    let h = harness();
    let user = h.signed_in("company", "ops@acme.com").await;

    let res = h
        .post_form("/company/logout", Some(&user.cookie), &[("_token", user.token.as_str())])
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/company/login");
    let fresh = session_cookie(&res).unwrap();
    assert_ne!(fresh, user.cookie);

    let res = h.get("/company/dashboard", Some(&user.cookie)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);

    // The old token died with the old session.
    let res = h
        .post_form("/company/logout", Some(&user.cookie), &[("_token", user.token.as_str())])
        .await;
    assert_eq!(res.status().as_u16(), 419);

    let guest = h.guest("/company/login", Some(&fresh)).await;
    let res = h
        .post_form("/company/logout", Some(&guest.cookie), &[("_token", guest.token.as_str())])
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let res = h.get("/company/dashboard", Some(&session_cookie(&res).unwrap())).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tenant fence
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn foreign_company_id_is_forbidden() {
    let h = harness();
    let user = h.signed_in("company", "ops@acme.com").await;

    for uri in [
        "/company/dashboard?company_id=9",
        "/company/dashboard?company_id=7&company_id=9",
        "/company/dashboard?company_id=acme",
    ] {
        let res = h.get(uri, Some(&user.cookie)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{uri}");
        let html = text(res).await;
        assert!(!html.contains("Globex"));
    }

    let res = h
        .post_json(
            "/company/campaigns?company_id=9",
            Some(&user),
            json!({ "name": "Sneaky" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.services.campaigns.count_campaigns(GLOBEX).unwrap(), 0);
    assert_eq!(h.services.campaigns.count_campaigns(ACME).unwrap(), 0);
}

#[tokio::test]
async fn missing_company_id_defaults_to_the_users_tenant() {
    let h = harness();
    let user = h.signed_in("company", "ops@acme.com").await;

    for uri in ["/company/dashboard", "/company/dashboard?company_id=7"] {
        let res = h.get(uri, Some(&user.cookie)).await;
        assert_eq!(res.status(), StatusCode::OK, "{uri}");
        assert!(text(res).await.contains("data-tenant=\"7\""));
    }

    let res = h
        .post_json("/company/campaigns", Some(&user), json!({ "name": "Spring" }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let campaign = json_body(res).await;
    assert_eq!(campaign["tenant_id"], 7);
    let code = campaign["code"].as_str().unwrap();
    assert_eq!(code.len(), 8);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
}

#[tokio::test]
async fn unauthenticated_visit_returns_to_the_intended_page() {
    let h = harness();
    let res = h.get("/company/dashboard?tab=campaigns", None).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/company/login");
    let cookie = session_cookie(&res).unwrap();

    let guest = h.guest("/company/login", Some(&cookie)).await;
    assert_eq!(guest.cookie, cookie);
    let res = h
        .post_form(
            "/company/login",
            Some(&guest.cookie),
            &[("_token", guest.token.as_str()), ("email", "ops@acme.com"), ("password", PASSWORD)],
        )
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/company/dashboard?tab=campaigns");
}

#[tokio::test]
async fn deactivation_ends_existing_company_sessions() {
    let h = harness();
    let admin = h.signed_in("admin", "admin@reskilling.com").await;
    let user = h.signed_in("company", "ops@acme.com").await;
    let ops = h
        .services
        .company_identities
        .find_by_email(&email("ops@acme.com"))
        .unwrap()
        .unwrap();

    let res = h
        .post_json(
            &format!("/admin/companies/7/users/{}/deactivate", ops.id()),
            Some(&admin),
            json!({}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = h.get("/company/dashboard", Some(&user.cookie)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(h.login("company", "ops@acme.com", PASSWORD).await.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn admin_creates_a_company_and_its_first_login() {
    let h = harness();
    let admin = h.signed_in("admin", "admin@reskilling.com").await;

    let res = h
        .post_json("/admin/companies", Some(&admin), json!({ "name": "Initech" }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let id = json_body(res).await["id"].as_i64().unwrap();
    assert_eq!(id, 10);

    let res = h
        .post_json(
            &format!("/admin/companies/{id}/users"),
            Some(&admin),
            json!({ "name": "Peter", "email": "peter@initech.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = h.login("company", "peter@initech.com", PASSWORD).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&res).unwrap();
    let res = h.get("/company/dashboard", Some(&cookie)).await;
    assert!(text(res).await.contains("data-tenant=\"10\""));

    let res = h
        .post_json(
            "/admin/companies/404/users",
            Some(&admin),
            json!({ "name": "Nobody", "email": "n@x.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ─────────────────────────────────────────────────────────────────────────────
// Invitations
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn invitation_to_analysis() {
    let h = harness();
    let user = h.signed_in("company", "ops@acme.com").await;

    let res = h
        .post_json("/company/campaigns", Some(&user), json!({ "name": "Spring", "code": "SPRING26" }))
        .await;
    let campaign = json_body(res).await;
    assert_eq!(campaign["code"], "SPRING26");
    let campaign_id = campaign["id"].as_str().unwrap().to_string();

    let res = h
        .post_json(
            &format!("/company/campaigns/{campaign_id}/invitations"),
            Some(&user),
            json!({ "email": "respondent@acme.com" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = json_body(res).await;
    assert!(created.get("token").is_none());
    assert_eq!(h.services.outbox.len().unwrap(), 1);

    let invitation = h
        .services
        .campaigns
        .list_invitations(ACME, campaign_id.parse().unwrap())
        .unwrap()
        .remove(0);
    assert_eq!(invitation.status, InvitationStatus::Emailed);
    let landing = format!("/i/{}", invitation.token.expose());

    let res = h.get(&landing, None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(text(res).await.contains("Spring"));

    let res = h
        .post_json(
            &landing,
            None,
            json!({ "answers": { "q1": "yes" }, "audio_url": "https://cdn.test/a.ogg" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let response_id = json_body(res).await["response_id"].as_str().unwrap().parse().unwrap();

    // mail, transcription, analysis
    assert_eq!(h.services.executor.drain(None).unwrap().len(), 3);
    assert!(h.services.outbox.is_empty().unwrap());
    let stored = h.services.responses.get(ACME, response_id).unwrap().unwrap();
    assert_eq!(stored.status, ResponseStatus::Analyzed);

    let res = h.get(&landing, None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = h.get("/i/unknown-token", None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invitations_cannot_target_another_tenants_campaign() {
    let h = harness();
    let foreign = h
        .services
        .campaigns
        .create_campaign(GLOBEX, reskill_infra::NewCampaign { name: "Secret".into(), code: None })
        .unwrap();
    let user = h.signed_in("company", "ops@acme.com").await;

    let res = h
        .post_json(
            &format!("/company/campaigns/{}/invitations", foreign.id),
            Some(&user),
            json!({ "email": "spy@acme.com" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(h.services.outbox.is_empty().unwrap());
}

#[tokio::test]
async fn failed_invitation_mail_leaves_no_invitation_behind() {
    let h = harness_with(AppConfig {
        secure_cookies: false,
        public_url: None,
        ..AppConfig::default()
    });
    let user = h.signed_in("company", "ops@acme.com").await;
    let campaign = json_body(
        h.post_json("/company/campaigns", Some(&user), json!({ "name": "Spring" }))
            .await,
    )
    .await;
    let campaign_id = campaign["id"].as_str().unwrap().to_string();

    let res = h
        .post_json(
            &format!("/company/campaigns/{campaign_id}/invitations"),
            Some(&user),
            json!({ "email": "respondent@acme.com" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(h
        .services
        .campaigns
        .list_invitations(ACME, campaign_id.parse().unwrap())
        .unwrap()
        .is_empty());
    assert!(h.services.outbox.is_empty().unwrap());
}

#[tokio::test]
async fn duplicate_campaign_codes_conflict() {
    let h = harness();
    let user = h.signed_in("company", "ops@acme.com").await;
    let body = json!({ "name": "Spring", "code": "SPRING26" });
    assert_eq!(
        h.post_json("/company/campaigns", Some(&user), body.clone()).await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        h.post_json("/company/campaigns", Some(&user), body).await.status(),
        StatusCode::CONFLICT
    );
}
