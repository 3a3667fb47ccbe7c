use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use trackr::config::Config;
use trackr::mail::MemoryMailer;

const BOUNDARY: &str = "----trackr-test-boundary";

struct TestApp {
    router: Router,
    mailer: Arc<MemoryMailer>,
    upload_dir: PathBuf,
    _dir: TempDir,
}

async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let upload_dir = dir.path().join("uploads");

    let mut config = Config::default();
    config.general.database_url = format!("sqlite:{}?mode=rwc", dir.path().join("t.db").display());
    config.uploads.upload_folder = upload_dir.display().to_string();
    config.security.secret_key = "test-secret".to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.observability.metrics_enabled = false;

    let mailer = Arc::new(MemoryMailer::new());
    let state = trackr::web::create_app_state_with_mailer(config, mailer.clone())
        .await
        .expect("Failed to create app state");
    let router = trackr::web::router(state)
        .await
        .expect("Failed to build router");

    TestApp {
        router,
        mailer,
        upload_dir,
        _dir: dir,
    }
}

/// Replays the session cookie across requests the way a browser would.
struct Browser {
    router: Router,
    cookie: Option<String>,
}

impl Browser {
    fn new(app: &TestApp) -> Self {
        Self {
            router: app.router.clone(),
            cookie: None,
        }
    }

    async fn send(&mut self, mut request: Request<Body>) -> Response {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap().trim();
            if let Some(id) = pair.strip_prefix("id=") {
                self.cookie = (!id.is_empty()).then(|| pair.to_string());
            }
        }

        response
    }

    async fn get(&mut self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&mut self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> Response {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    async fn post_multipart(
        &mut self,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> Response {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    async fn register(&mut self, username: &str, password: &str) -> Response {
        let email = format!("{username}@example.com");
        self.post_form(
            "/register",
            &[
                ("username", username),
                ("email", &email),
                ("password", password),
                ("password2", password),
            ],
        )
        .await
    }

    async fn login(&mut self, username: &str, password: &str) -> Response {
        self.post_form("/login", &[("username", username), ("password", password)])
            .await
    }

    /// Registers and signs in.
    async fn sign_up(&mut self, username: &str) {
        let response = self.register(username, "hunter22").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let response = self.login(username, "hunter22").await;
        assert_eq!(location(&response), "/index");
    }

    async fn create_project(&mut self, title: &str, sdate: &str, edate: &str) -> Response {
        self.post_form(
            "/projects/new",
            &[
                ("title", title),
                ("body", &project_body()),
                ("status", "0"),
                ("sdate", sdate),
                ("edate", edate),
            ],
        )
        .await
    }
}

fn project_body() -> String {
    "A long enough description of the work we plan to do this spring. ".repeat(3)
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn project_id(response: &Response) -> i32 {
    location(response)
        .strip_prefix("/projects/")
        .and_then(|id| id.parse().ok())
        .expect("redirect to the new project")
}

#[tokio::test]
async fn test_anonymous_requests_redirect_to_login() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser.get("/index").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?next=%2Findex");

    let response = browser.get("/projects/1?tab=todos").await;
    assert_eq!(location(&response), "/login?next=%2Fprojects%2F1%3Ftab%3Dtodos");

    let response = browser.get("/login").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Sign In"));
}

#[tokio::test]
async fn test_login_honours_next() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.register("ana", "hunter22").await;

    let response = browser
        .post_form(
            "/login?next=%2Fexplore",
            &[("username", "ana"), ("password", "hunter22")],
        )
        .await;
    assert_eq!(location(&response), "/explore");

    let response = browser.get("/explore").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser.register("ana", "hunter22").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = browser.register("ana", "hunter22").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_text(response).await;
    assert!(body.contains("Please use a different username."));
    assert!(body.contains("Please use a different email address."));
}

#[tokio::test]
async fn test_wrong_password_is_refused() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.register("ana", "hunter22").await;

    let response = browser.login("ana", "wrong").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let body = body_text(browser.get("/login").await).await;
    assert!(body.contains("Invalid username or password"));

    let response = browser.get("/index").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.sign_up("ana").await;

    assert_eq!(browser.get("/index").await.status(), StatusCode::OK);

    let response = browser.get("/logout").await;
    assert_eq!(location(&response), "/index");

    let response = browser.get("/index").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_project_dates_must_be_ordered() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.sign_up("ana").await;

    let response = browser
        .create_project("Backwards", "2024-05-10", "2024-05-09")
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(
        body_text(response)
            .await
            .contains("End date must not be earlier than start date.")
    );

    let response = browser
        .create_project("Garden shed", "2024-03-01", "2024-03-31")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let id = project_id(&response);

    let response = browser
        .post_form(
            &format!("/projects/{id}/edit"),
            &[
                ("title", "Garden shed"),
                ("body", &project_body()),
                ("status", "1"),
                ("sdate", "2024-03-01"),
                ("edate", "2024-02-01"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_project_titles_unique_per_owner() {
    let app = spawn_app().await;
    let mut ana = Browser::new(&app);
    ana.sign_up("ana").await;

    let response = ana.create_project("Garden shed", "2024-03-01", "2024-03-31").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = ana.create_project("Garden shed", "2024-03-01", "2024-03-31").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(
        body_text(response)
            .await
            .contains("Please use a different project title.")
    );

    let mut bob = Browser::new(&app);
    bob.sign_up("bob").await;
    let response = bob.create_project("Garden shed", "2024-03-01", "2024-03-31").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_todos_stay_inside_project_window() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.sign_up("ana").await;

    let response = browser
        .create_project("Garden shed", "2024-03-01", "2024-03-31")
        .await;
    let id = project_id(&response);
    let uri = format!("/projects/{id}");

    let response = browser
        .post_multipart(
            &uri,
            &[
                ("task", "Pour concrete"),
                ("edate", "2024-04-02"),
                ("tsubmit", "Add task"),
            ],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(
        body_text(response)
            .await
            .contains("Task end date must fall between 2024-03-01 and 2024-03-31.")
    );

    let response = browser
        .post_multipart(
            &uri,
            &[
                ("task", "Pour concrete"),
                ("edate", "2024-03-31"),
                ("tsubmit", "Add task"),
            ],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), uri);

    let body = body_text(browser.get(&uri).await).await;
    assert!(body.contains("Task has been added successfully"));
    assert!(body.contains("Pour concrete"));
}

#[tokio::test]
async fn test_comments_from_any_user() {
    let app = spawn_app().await;
    let mut ana = Browser::new(&app);
    ana.sign_up("ana").await;
    let id = project_id(&ana.create_project("Garden shed", "2024-03-01", "2024-03-31").await);
    let uri = format!("/projects/{id}");

    let mut bob = Browser::new(&app);
    bob.sign_up("bob").await;

    let response = bob
        .post_multipart(&uri, &[("body", "   "), ("csubmit", "Post")], None)
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = bob
        .post_multipart(&uri, &[("body", "Looks great"), ("csubmit", "Post")], None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let body = body_text(ana.get(&uri).await).await;
    assert!(body.contains("Looks great"));
    assert!(body.contains("/user/bob"));
}

#[tokio::test]
async fn test_artifact_uploads() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.sign_up("ana").await;
    let id = project_id(
        &browser
            .create_project("Garden shed", "2024-03-01", "2024-03-31")
            .await,
    );
    let uri = format!("/projects/{id}");

    let response = browser
        .post_multipart(
            &uri,
            &[("name", "Installer"), ("asubmit", "Upload")],
            Some(("setup.exe", b"MZ")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("File type not allowed."));

    let response = browser
        .post_multipart(
            &uri,
            &[("name", "Plans"), ("asubmit", "Upload")],
            Some(("site plan.pdf", b"%PDF-1.4")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let stored: Vec<String> = std::fs::read_dir(&app.upload_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].ends_with("site_plan.pdf"));
    assert_ne!(stored[0], "site_plan.pdf");

    let body = body_text(browser.get(&uri).await).await;
    assert!(body.contains(&format!("/download_file/{}", stored[0])));

    let response = browser.get(&format!("/download_file/{}", stored[0])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "%PDF-1.4");

    let response = browser.get("/download_file/missing.pdf").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_owner_changes_project() {
    let app = spawn_app().await;
    let mut ana = Browser::new(&app);
    ana.sign_up("ana").await;
    let id = project_id(&ana.create_project("Garden shed", "2024-03-01", "2024-03-31").await);

    let mut bob = Browser::new(&app);
    bob.sign_up("bob").await;

    let response = bob.get(&format!("/projects/{id}/edit")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_text(response).await.contains("403"));

    let response = bob.post(&format!("/projects/{id}/delete")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = bob
        .post_multipart(
            &format!("/projects/{id}"),
            &[("task", "Sneaky"), ("edate", "2024-03-05"), ("tsubmit", "Add task")],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ana.get(&format!("/projects/{id}/edit")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_delete_project() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.sign_up("ana").await;
    let id = project_id(
        &browser
            .create_project("Garden shed", "2024-03-01", "2024-03-31")
            .await,
    );

    let response = browser.post(&format!("/projects/{id}/delete")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/index");

    let response = browser.get(&format!("/projects/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_follow_rules() {
    let app = spawn_app().await;
    let mut bob = Browser::new(&app);
    bob.sign_up("bob").await;
    bob.create_project("Bob's boat", "2024-03-01", "2024-03-31").await;

    let mut ana = Browser::new(&app);
    ana.sign_up("ana").await;

    let response = ana.post("/follow/ana").await;
    assert_eq!(location(&response), "/user/ana");
    let body = body_text(ana.get("/user/ana").await).await;
    assert!(body.contains("You cannot follow yourself!"));

    let response = ana.post("/follow/nobody").await;
    assert_eq!(location(&response), "/index");

    let body = body_text(ana.get("/index").await).await;
    assert!(!body.contains("Bob&#x27;s boat"));

    let response = ana.post("/follow/bob").await;
    assert_eq!(location(&response), "/user/bob");

    let body = body_text(ana.get("/index").await).await;
    assert!(body.contains("Bob&#x27;s boat"));

    ana.post("/unfollow/bob").await;
    let body = body_text(ana.get("/index").await).await;
    assert!(!body.contains("Bob&#x27;s boat"));
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.register("ana", "hunter22").await;

    let response = browser
        .post_form("/reset_password_request", &[("email", "nobody@example.com")])
        .await;
    assert_eq!(location(&response), "/login");
    assert!(app.mailer.sent().await.is_empty());

    let response = browser
        .post_form("/reset_password_request", &[("email", "ana@example.com")])
        .await;
    assert_eq!(location(&response), "/login");

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, ["ana@example.com".to_string()]);
    assert_eq!(sent[0].subject, "[trackr] Reset Your Password");

    let token = sent[0]
        .text_body
        .split_whitespace()
        .find_map(|word| word.split("/reset_password/").nth(1))
        .expect("reset link in mail")
        .to_string();

    let response = browser.get("/reset_password/not-a-token").await;
    assert_eq!(location(&response), "/index");

    let response = browser.get(&format!("/reset_password/{token}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = browser
        .post_form(
            &format!("/reset_password/{token}"),
            &[("password", "correct horse"), ("password2", "correct horse")],
        )
        .await;
    assert_eq!(location(&response), "/login");

    let response = browser.login("ana", "hunter22").await;
    assert_eq!(location(&response), "/login");

    let response = browser.login("ana", "correct horse").await;
    assert_eq!(location(&response), "/index");
}

#[tokio::test]
async fn test_unknown_page_renders_404() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser.get("/static/style.css").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = browser.get("/no/such/page").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert!(response.headers().contains_key("x-request-id"));
    assert!(body_text(response).await.contains("Not Found"));
}

#[tokio::test]
async fn test_toggle_todo() {
    let app = spawn_app().await;
    let mut ana = Browser::new(&app);
    ana.sign_up("ana").await;
    let id = project_id(&ana.create_project("Garden shed", "2024-03-01", "2024-03-31").await);
    let uri = format!("/projects/{id}");

    ana.post_multipart(
        &uri,
        &[("task", "Order timber"), ("edate", "2024-03-10"), ("tsubmit", "Add task")],
        None,
    )
    .await;

    let body = body_text(ana.get(&uri).await).await;
    assert!(body.contains("Mark done"));
    assert!(!body.contains("Reopen"));

    let mut bob = Browser::new(&app);
    bob.sign_up("bob").await;
    let response = bob.post("/todos/1").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = ana.post("/todos/1").await;
    assert_eq!(location(&response), uri);

    let body = body_text(ana.get(&uri).await).await;
    assert!(body.contains("Reopen"));

    let response = ana.post("/todos/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unfollow_rules() {
    let app = spawn_app().await;
    let mut ana = Browser::new(&app);
    ana.sign_up("ana").await;

    let response = ana.post("/unfollow/nobody").await;
    assert_eq!(location(&response), "/index");
    let body = body_text(ana.get("/index").await).await;
    assert!(body.contains("User nobody not found."));

    let response = ana.post("/unfollow/ana").await;
    assert_eq!(location(&response), "/user/ana");
    let body = body_text(ana.get("/user/ana").await).await;
    assert!(body.contains("You cannot unfollow yourself!"));
}

#[tokio::test]
async fn test_repeated_follow_is_harmless() {
    let app = spawn_app().await;
    let mut bob = Browser::new(&app);
    bob.sign_up("bob").await;

    let mut ana = Browser::new(&app);
    ana.sign_up("ana").await;

    for _ in 0..2 {
        let response = ana.post("/follow/bob").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/user/bob");
    }

    let response = ana.post("/unfollow/bob").await;
    assert_eq!(location(&response), "/user/bob");
}

#[tokio::test]
async fn test_delete_project_removes_uploads() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.sign_up("ana").await;
    let id = project_id(
        &browser
            .create_project("Garden shed", "2024-03-01", "2024-03-31")
            .await,
    );

    let response = browser
        .post_multipart(
            &format!("/projects/{id}"),
            &[("name", "Plans"), ("asubmit", "Upload")],
            Some(("plan.pdf", b"%PDF-1.4")),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(std::fs::read_dir(&app.upload_dir).unwrap().count(), 1);

    let response = browser.post(&format!("/projects/{id}/delete")).await;
    assert_eq!(location(&response), "/index");
    assert_eq!(std::fs::read_dir(&app.upload_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_metrics_route_requires_login() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);

    let response = browser.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?next=%2Fmetrics");

    browser.sign_up("ana").await;
    let response = browser.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_ignores_next_with_control_characters() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.register("ana", "hunter22").await;

    let response = browser
        .post_form(
            "/login?next=%2F%09%2Fevil.example.com",
            &[("username", "ana"), ("password", "hunter22")],
        )
        .await;
    assert_eq!(location(&response), "/index");
}

#[tokio::test]
async fn test_blank_project_title_rejected() {
    let app = spawn_app().await;
    let mut browser = Browser::new(&app);
    browser.sign_up("ana").await;

    let response = browser.create_project("   ", "2024-03-01", "2024-03-31").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
