//! Server-rendered admin area behind HTTP Basic authentication.

pub mod csrf;
pub mod handlers;
pub mod views;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use subtle::ConstantTimeEq;

use crate::config::AdminCredentials;
use crate::state::AppState;

/// Admin routes, or `None` when no admin password is configured.
pub fn router(state: &AppState) -> Option<Router<AppState>> {
    let credentials = Arc::new(state.config.admin.clone()?);

    let router = Router::new()
        .route("/students", get(handlers::index).post(handlers::store))
        .route("/students/create", get(handlers::create))
        .layer(middleware::from_fn_with_state(credentials, require_admin));

    Some(router)
}

async fn require_admin(
    State(credentials): State<Arc<AdminCredentials>>,
    request: Request,
    next: Next,
) -> Response {
    if authorized(request.headers(), &credentials) {
        return next.run(request).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        [(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"admin\", charset=\"UTF-8\""),
        )],
        "Unauthorized",
    )
        .into_response()
}

fn authorized(headers: &HeaderMap, credentials: &AdminCredentials) -> bool {
    let Some((username, password)) = basic_credentials(headers) else {
        return false;
    };
    // Evaluate both so timing does not reveal which one mismatched.
    let user_ok = username.as_bytes().ct_eq(credentials.username.as_bytes());
    let pass_ok = password.as_bytes().ct_eq(credentials.password.as_bytes());
    (user_ok & pass_ok).into()
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request as HttpRequest};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::api::test_support::{make_state, make_state_with};

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
    }

    async fn admin_app() -> (axum::Router, AppState) {
        let (state, _mailer) = make_state_with(&[("ADMIN_PASSWORD", "s3cret")]).await;
        (crate::api::router(state.clone()), state)
    }

    async fn body_text(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Fetch the create form and return the CSRF token pair it hands out.
    async fn csrf_pair(app: &axum::Router) -> (String, String) {
        let req = HttpRequest::builder()
            .uri("/admin/students/create")
            .header(header::AUTHORIZATION, basic("admin", "s3cret"))
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        let token = cookie.trim_start_matches("csrf_token=").to_string();
        (cookie, token)
    }

    async fn submit(app: &axum::Router, cookie: &str, form: &str) -> Response {
        let req = HttpRequest::builder()
            .method(Method::POST)
            .uri("/admin/students")
            .header(header::AUTHORIZATION, basic("admin", "s3cret"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, cookie)
            .body(Body::from(form.to_string()))
            .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    #[test]
    fn parses_basic_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&basic("admin", "pa:ss")).unwrap(),
        );
        assert_eq!(
            basic_credentials(&headers),
            Some(("admin".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn credentials_must_match_exactly() {
        let credentials = AdminCredentials {
            username: "admin".to_string(),
            password: "s3cret".to_string(),
        };
        let headers_for = |user: &str, pass: &str| {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&basic(user, pass)).unwrap(),
            );
            headers
        };

        assert!(authorized(&headers_for("admin", "s3cret"), &credentials));
        assert!(!authorized(&headers_for("admin", "s3cret!"), &credentials));
        assert!(!authorized(&headers_for("admin", "s3cre"), &credentials));
        assert!(!authorized(&headers_for("root", "s3cret"), &credentials));
        assert!(!authorized(&HeaderMap::new(), &credentials));
    }

    #[tokio::test]
    async fn admin_routes_absent_without_password() {
        let (state, _mailer) = make_state().await;
        let app = crate::api::router(state);
        let req = HttpRequest::builder()
            .uri("/admin/students")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_credentials_get_challenge() {
        let (app, _state) = admin_app().await;
        let req = HttpRequest::builder()
            .uri("/admin/students")
            .header(header::AUTHORIZATION, basic("admin", "nope"))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn store_without_csrf_is_page_expired() {
        let (app, state) = admin_app().await;
        let resp = submit(&app, "", "nim=211524001&nama=Budi").await;
        assert_eq!(resp.status().as_u16(), 419);
        assert!(state.repo.find_student(211524001).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_creates_verified_student_and_redirects() {
        let (app, state) = admin_app().await;
        let (cookie, token) = csrf_pair(&app).await;

        let form = format!(
            "_token={}&nim=211524001&nama=Budi+Santoso&email=budi%40polban.ac.id&password=rahasia&status_aktif=1",
            token
        );
        let resp = submit(&app, &cookie, &form).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            resp.headers()[header::LOCATION],
            "/admin/students?created=211524001"
        );

        let student = state.repo.find_student(211524001).await.unwrap().unwrap();
        assert!(student.active);
        assert!(student.has_verified_email());
        assert!(crate::security::verify_password("rahasia", &student.password_hash));
    }

    #[tokio::test]
    async fn store_without_password_or_email_is_unusable_login() {
        let (app, state) = admin_app().await;
        let (cookie, token) = csrf_pair(&app).await;

        let form = format!("_token={}&nim=211511002&nama=Ani&email=&password=", token);
        let resp = submit(&app, &cookie, &form).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let student = state.repo.find_student(211511002).await.unwrap().unwrap();
        assert!(!student.active);
        assert!(student.email.is_none());
        assert!(!crate::security::verify_password("", &student.password_hash));
    }

    #[tokio::test]
    async fn store_with_errors_rerenders_form() {
        let (app, state) = admin_app().await;
        let (cookie, token) = csrf_pair(&app).await;

        let form = format!(
            "_token={}&nim=219999001&nama=Budi<b>&email=budi%40gmail.com&password=123",
            token
        );
        let resp = submit(&app, &cookie, &form).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let html = body_text(resp).await;
        assert!(html.contains(crate::api::auth::PROGRAM_NOT_FOUND));
        assert!(html.contains(r#"class="form-control is-invalid" id="nama""#));
        assert!(html.contains(r#"class="form-control is-invalid" id="email""#));
        assert!(html.contains(r#"class="form-control is-invalid" id="password""#));
        assert!(html.contains(r#"value="219999001""#));
        assert!(html.contains("Budi&lt;b&gt;"));
        assert!(!html.contains("value=\"123\""));
        assert!(state.repo.find_student(219999001).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn index_lists_created_students() {
        let (app, _state) = admin_app().await;
        let (cookie, token) = csrf_pair(&app).await;
        let form = format!("_token={}&nim=211524001&nama=Budi&status_aktif=1", token);
        submit(&app, &cookie, &form).await;

        let req = HttpRequest::builder()
            .uri("/admin/students?created=211524001")
            .header(header::AUTHORIZATION, basic("admin", "s3cret"))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains("Student 211524001 was added."));
        assert!(html.contains("D4 Teknik Informatika"));
    }
}
