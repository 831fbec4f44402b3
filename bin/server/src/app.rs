//! HTTP router for the befree server.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{actions, auth, user};

/// Builds the application router.
///
/// The session gate wraps every route, including static files; its route
/// matcher lets static assets through without an identity lookup.
pub fn router(state: Arc<auth::AppState>, static_dir: &Path) -> Router {
    Router::new()
        // Auth routes
        .route(auth::routes::CALLBACK_PATH, get(auth::callback))
        .route("/auth/oauth/{provider}", get(auth::oauth_start))
        .route("/auth/signout", post(auth::signout))
        .route("/auth/auth-code-error", get(auth::auth_code_error))
        // API routes
        .route("/api/me", get(user::me))
        .route(
            "/api/profile",
            get(actions::get_profile).patch(actions::update_profile),
        )
        .route(
            "/api/organizations",
            get(actions::list_organizations).post(actions::create_organization),
        )
        .route(
            "/api/organizations/{organization_id}/projects",
            post(actions::create_project),
        )
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_gate,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{HeaderMap, Request, StatusCode, header},
        response::Response,
    };
    use befree_platform_access::{
        BackendConfig, CookieMethods, CookieOptions, CookieToSet, IdentityError, IdentityService,
        RuntimeEnvironment, Session, User,
    };
    use rootcause::prelude::Report;
    use std::sync::Mutex;
    use tower::ServiceExt;

    const USER_ID: &str = "5d3c2b1a-0f9e-4d8c-b7a6-958473625140";

    /// Identity service with fixed answers that records each call.
    #[derive(Default)]
    struct StubIdentity {
        signed_in: bool,
        rotate: bool,
        calls: Mutex<Vec<String>>,
    }

    impl StubIdentity {
        fn signed_in() -> Self {
            Self {
                signed_in: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().expect("calls lock").push(call);
        }
    }

    #[async_trait]
    impl IdentityService for StubIdentity {
        async fn get_user(
            &self,
            cookies: &mut dyn CookieMethods,
        ) -> Result<Option<User>, Report<IdentityError>> {
            self.record("get_user".to_string());
            if self.rotate {
                cookies.set_all(vec![CookieToSet::new(
                    "sb-127-auth-token",
                    "rotated",
                    CookieOptions::default(),
                )]);
            }
            Ok(self.signed_in.then(|| {
                User::new(
                    USER_ID.parse().expect("id"),
                    Some("user@example.com".to_string()),
                )
                .with_metadata(serde_json::json!({ "full_name": "Ada Lovelace" }))
            }))
        }

        async fn exchange_code_for_session(
            &self,
            code: &str,
            cookies: &mut dyn CookieMethods,
        ) -> Result<Session, Report<IdentityError>> {
            self.record(format!("exchange:{code}"));
            if code == "bad" {
                return Err(IdentityError::Rejected {
                    status: 400,
                    message: "invalid flow state".to_string(),
                }
                .into());
            }
            cookies.set_all(vec![CookieToSet::new(
                "sb-127-auth-token",
                "session",
                CookieOptions::default(),
            )]);
            Ok(Session::new("access".to_string(), "refresh".to_string(), None))
        }

        async fn sign_out(
            &self,
            cookies: &mut dyn CookieMethods,
        ) -> Result<(), Report<IdentityError>> {
            self.record("sign_out".to_string());
            cookies.set_all(vec![CookieToSet::removal("sb-127-auth-token")]);
            Ok(())
        }
    }

    fn app_with(identity: Arc<StubIdentity>, static_dir: &Path) -> Router {
        let backend = BackendConfig::new("http://127.0.0.1:54321", "anon").expect("backend");
        let state = auth::AppState::new(
            identity,
            backend,
            reqwest::Client::new(),
            RuntimeEnvironment::Development,
            false,
        );
        router(Arc::new(state), static_dir)
    }

    async fn send(app: Router, request: Request<Body>) -> Response {
        app.oneshot(request).await.expect("response")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, "localhost:3000")
            .body(Body::empty())
            .expect("request")
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .expect("location header")
    }

    fn set_cookie_headers(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn anonymous_request_redirects_to_login_with_query() {
        let identity = Arc::new(StubIdentity {
            rotate: true,
            ..StubIdentity::default()
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let response = send(
            app_with(identity.clone(), dir.path()),
            get_request("/api/me?tab=billing"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/login?tab=billing");
        assert!(set_cookie_headers(response.headers()).is_empty());
        assert_eq!(identity.calls(), vec!["get_user".to_string()]);
    }

    #[tokio::test]
    async fn signed_in_request_reaches_handler() {
        let identity = Arc::new(StubIdentity::signed_in());
        let dir = tempfile::tempdir().expect("tempdir");
        let response = send(app_with(identity, dir.path()), get_request("/api/me")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], USER_ID);
        assert_eq!(body["email"], "user@example.com");
        assert_eq!(body["display_name"], "Ada Lovelace");
    }

    #[tokio::test]
    async fn rotated_cookies_reach_the_browser() {
        let identity = Arc::new(StubIdentity {
            signed_in: true,
            rotate: true,
            ..StubIdentity::default()
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let response = send(app_with(identity, dir.path()), get_request("/api/me")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookie_headers(response.headers());
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("sb-127-auth-token=rotated"));
    }

    #[tokio::test]
    async fn static_assets_skip_the_gate() {
        let identity = Arc::new(StubIdentity::default());
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("logo.png"), b"png").expect("write asset");

        let response = send(
            app_with(identity.clone(), dir.path()),
            get_request("/static/logo.png"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(identity.calls().is_empty());
    }

    #[tokio::test]
    async fn allow_listed_error_page_is_public() {
        let identity = Arc::new(StubIdentity::default());
        let dir = tempfile::tempdir().expect("tempdir");
        let response = send(
            app_with(identity, dir.path()),
            get_request("/auth/auth-code-error"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn callback_exchanges_code_and_sets_session() {
        let identity = Arc::new(StubIdentity::default());
        let dir = tempfile::tempdir().expect("tempdir");
        let response = send(
            app_with(identity.clone(), dir.path()),
            get_request("/auth/callback?code=abc&next=/projects"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "http://localhost:3000/projects");
        let cookies = set_cookie_headers(response.headers());
        assert!(cookies.iter().any(|c| c.starts_with("sb-127-auth-token=session")));
        assert_eq!(
            identity.calls(),
            vec!["get_user".to_string(), "exchange:abc".to_string()]
        );
    }

    #[tokio::test]
    async fn callback_without_code_goes_to_error_page() {
        let identity = Arc::new(StubIdentity::default());
        let dir = tempfile::tempdir().expect("tempdir");
        let response = send(
            app_with(identity.clone(), dir.path()),
            get_request("/auth/callback"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            location(&response),
            "http://localhost:3000/auth/auth-code-error"
        );
        assert!(!identity.calls().iter().any(|c| c.starts_with("exchange")));
    }

    #[tokio::test]
    async fn failed_exchange_goes_to_error_page() {
        let identity = Arc::new(StubIdentity::default());
        let dir = tempfile::tempdir().expect("tempdir");
        let response = send(
            app_with(identity, dir.path()),
            get_request("/auth/callback?code=bad"),
        )
        .await;

        assert_eq!(
            location(&response),
            "http://localhost:3000/auth/auth-code-error"
        );
    }

    #[tokio::test]
    async fn oauth_start_redirects_with_pkce_challenge() {
        let identity = Arc::new(StubIdentity::default());
        let dir = tempfile::tempdir().expect("tempdir");
        let response = send(
            app_with(identity, dir.path()),
            get_request("/auth/oauth/google"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let target = location(&response);
        assert!(target.starts_with("http://127.0.0.1:54321/auth/v1/authorize?provider=google"));
        assert!(target.contains(
            "redirect_to=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback"
        ));
        assert!(target.contains("code_challenge_method=s256"));

        let cookies = set_cookie_headers(response.headers());
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("sb-127-auth-token-code-verifier="));
    }

    #[tokio::test]
    async fn unknown_provider_is_not_found() {
        let identity = Arc::new(StubIdentity::default());
        let dir = tempfile::tempdir().expect("tempdir");
        let response = send(
            app_with(identity, dir.path()),
            get_request("/auth/oauth/myspace"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn signout_clears_session_and_returns_to_login() {
        let identity = Arc::new(StubIdentity::signed_in());
        let dir = tempfile::tempdir().expect("tempdir");
        let request = Request::builder()
            .method("POST")
            .uri("/auth/signout")
            .header(header::HOST, "localhost:3000")
            .header(header::COOKIE, "sb-127-auth-token=session")
            .body(Body::empty())
            .expect("request");
        let response = send(app_with(identity.clone(), dir.path()), request).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
        let cookies = set_cookie_headers(response.headers());
        assert!(
            cookies
                .iter()
                .any(|c| c.starts_with("sb-127-auth-token=") && c.contains("Max-Age=0"))
        );
        assert!(identity.calls().contains(&"sign_out".to_string()));
    }

    #[tokio::test]
    async fn action_without_access_token_is_unauthorized() {
        let identity = Arc::new(StubIdentity::signed_in());
        let dir = tempfile::tempdir().expect("tempdir");
        let response = send(app_with(identity, dir.path()), get_request("/api/profile")).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Unauthorized");
    }

    /// Gate-wrapped router whose only handler echoes the Cookie header it received.
    fn echo_app(identity: Arc<StubIdentity>) -> Router {
        async fn echo_cookie(headers: HeaderMap) -> String {
            headers
                .get(header::COOKIE)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .unwrap_or_default()
        }

        let backend = BackendConfig::new("http://127.0.0.1:54321", "anon").expect("backend");
        let state = Arc::new(auth::AppState::new(
            identity,
            backend,
            reqwest::Client::new(),
            RuntimeEnvironment::Development,
            false,
        ));
        Router::new()
            .route("/echo", get(echo_cookie))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                auth::session_gate,
            ))
            .with_state(state)
    }

    fn echo_request(cookie: &str) -> Request<Body> {
        Request::builder()
            .uri("/echo")
            .header(header::HOST, "localhost:3000")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .expect("request")
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn cookie_header_is_untouched_without_rotation() {
        let identity = Arc::new(StubIdentity::signed_in());
        let inbound = "theme=dark; novalue; a=1; a=2";
        let response = send(echo_app(identity), echo_request(inbound)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie_headers(response.headers()).is_empty());
        assert_eq!(body_text(response).await, inbound);
    }

    #[tokio::test]
    async fn rotated_cookie_reaches_downstream_handler() {
        let identity = Arc::new(StubIdentity {
            signed_in: true,
            rotate: true,
            ..StubIdentity::default()
        });
        let response = send(
            echo_app(identity),
            echo_request("theme=dark; sb-127-auth-token=old"),
        )
        .await;

        assert_eq!(
            body_text(response).await,
            "theme=dark; sb-127-auth-token=rotated"
        );
    }
}
