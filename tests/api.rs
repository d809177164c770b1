//! End-to-end tests of the HTTP surface against an in-memory database and a
//! temporary storage root.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use bytes::Bytes;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use std::{collections::HashMap, io::Cursor, io::Read, path::Path, sync::Arc};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt;
use uuid::Uuid;
use wedding_memories::{
    client::{
        http::HttpUploadClient,
        submission::{AttachmentFile, Submission, TransportError, UploadForm, UploadTransport},
    },
    config::{AppConfig, ServerArgs},
    db,
    routes::routes::app,
    state::AppState,
};
use zip::ZipArchive;

const PASSWORD: &str = "Forever&Always1";
const BOUNDARY: &str = "wedding-test-boundary";

struct Harness {
    app: Router,
    state: AppState,
    storage: TempDir,
}

async fn harness() -> Harness {
    harness_with(&[]).await
}

/// Harness with extra `WEDDING_*` variables layered over the defaults.
async fn harness_with(vars: &[(&str, &str)]) -> Harness {
    let storage = TempDir::new().unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();

    let args = ServerArgs {
        storage_dir: Some(storage.path().to_string_lossy().into_owned()),
        ..ServerArgs::default()
    };
    let cfg = AppConfig::from_lookup(&args, |key| match key {
        "WEDDING_ADMIN_PASSWORD" => Some(PASSWORD.to_string()),
        _ => vars
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string()),
    })
    .unwrap();

    let state = AppState::new(Arc::new(pool), &cfg);
    Harness {
        app: app(state.clone()),
        state,
        storage,
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                file_name,
                content_type,
                bytes,
            } => {
                let disposition = format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\""
                );
                body.extend_from_slice(
                    format!("{disposition}\r\nContent-Type: {content_type}\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-admin-password", PASSWORD)
        .body(Body::empty())
        .unwrap()
}

fn admin_delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("x-admin-password", PASSWORD)
        .body(Body::empty())
        .unwrap()
}

fn login(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/admin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Regular files anywhere under `root`.
fn stored_files(root: &Path) -> usize {
    std::fs::read_dir(root)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| {
                    let path = entry.path();
                    if path.is_dir() { stored_files(&path) } else { 1 }
                })
                .sum()
        })
        .unwrap_or(0)
}

/// Serve `app` on an ephemeral local port and return its origin.
async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

async fn dashboard(app: &Router) -> Value {
    let response = send(app, admin_get("/api/media")).await;
    assert_eq!(response.status(), StatusCode::OK);
    json(response).await
}

#[tokio::test]
async fn empty_message_only_submission_is_rejected() {
    let h = harness().await;

    let response = send(
        &h.app,
        upload_request(&[
            Part::Text("guestName", "  "),
            Part::Text("message", ""),
            Part::Text("messageOnly", "true"),
        ]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "Please provide either a name or message");
    assert_eq!(dashboard(&h.app).await["total"], 0);
}

#[tokio::test]
async fn message_only_submission_creates_one_record() {
    let h = harness().await;

    let response = send(
        &h.app,
        upload_request(&[
            Part::Text("guestName", ""),
            Part::Text("message", "Wishing you a lifetime of happiness"),
            Part::Text("messageOnly", "true"),
        ]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["messageOnly"], true);

    let view = dashboard(&h.app).await;
    assert_eq!(view["total"], 1);
    let item = &view["media"][0];
    assert_eq!(item["file_name"], "Message Only");
    assert_eq!(item["file_path"], "");
    assert_eq!(item["category"], "message");
    assert_eq!(item["uploaded_by"], Value::Null);
    assert_eq!(item["message"], "Wishing you a lifetime of happiness");
    assert_eq!(view["counts"]["messages"], 1);
}

#[tokio::test]
async fn file_upload_is_stored_and_publicly_readable() {
    let h = harness().await;

    let response = send(
        &h.app,
        upload_request(&[
            Part::File {
                file_name: "First Dance.JPG",
                content_type: "image/jpeg",
                bytes: b"not-really-a-jpeg",
            },
            Part::Text("guestName", "Uncle Bob"),
            Part::Text("message", ""),
        ]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let view = dashboard(&h.app).await;
    let item = &view["media"][0];
    assert_eq!(item["file_name"], "First Dance.JPG");
    assert_eq!(item["file_type"], "image/jpeg");
    assert_eq!(item["file_size"], 17);
    assert_eq!(item["uploaded_by"], "Uncle Bob");
    assert_eq!(item["message"], Value::Null);
    assert_eq!(item["category"], "image");
    assert_eq!(item["label"], "Photo");
    assert_eq!(item["size_label"], "17 Bytes");

    let location = item["file_path"].as_str().unwrap();
    let prefix = "http://localhost:3000/files/roberta-michael-wedding/";
    assert!(location.starts_with(prefix), "{location}");
    assert!(location.ends_with(".jpg"));

    let path = location.trim_start_matches("http://localhost:3000");
    let response = send(&h.app, get(path)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(body_bytes(response).await, b"not-really-a-jpeg");
}

#[tokio::test]
async fn upload_without_file_is_rejected() {
    let h = harness().await;

    let response = send(&h.app, upload_request(&[Part::Text("guestName", "Ann")])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "File is required");

    let response = send(
        &h.app,
        upload_request(&[Part::File {
            file_name: "",
            content_type: "image/png",
            bytes: b"png",
        }]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "Invalid file - missing file name");
    assert_eq!(dashboard(&h.app).await["total"], 0);
}

#[tokio::test]
async fn admin_password_must_match_exactly() {
    let h = harness().await;

    let response = send(&h.app, login(&format!(r#"{{"password": "{PASSWORD}"}}"#))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["success"], true);

    for attempt in ["", " Forever&Always1", "forever&always1", "wrong"] {
        let response = send(&h.app, login(&format!(r#"{{"password": "{attempt}"}}"#))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{attempt:?}");
        let body = json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Incorrect password");
    }

    let response = send(&h.app, login("{not json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["error"], "Invalid request");
}

#[tokio::test]
async fn dashboard_requires_the_password_header() {
    let h = harness().await;

    let response = send(&h.app, get("/api/media")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &h.app,
        Request::get("/api/media/archive")
            .header("x-admin-password", "nope")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn records_list_newest_first_with_filter_and_full_counts() {
    let h = harness().await;

    let uploads = [
        ("a.jpg", "image/jpeg"),
        ("b.mov", "video/quicktime"),
        ("c.png", "image/png"),
    ];
    for (name, ty) in uploads {
        let response = send(
            &h.app,
            upload_request(&[Part::File {
                file_name: name,
                content_type: ty,
                bytes: b"x",
            }]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let view = dashboard(&h.app).await;
    let names: Vec<&str> = view["media"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["file_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["c.png", "b.mov", "a.jpg"]);

    let response = send(&h.app, admin_get("/api/media?category=image")).await;
    let view = json(response).await;
    assert_eq!(view["media"].as_array().unwrap().len(), 2);
    assert_eq!(view["total"], 3);
    assert_eq!(view["counts"]["images"], 2);
    assert_eq!(view["counts"]["videos"], 1);

    let response = send(&h.app, admin_get("/api/media?category=selfies")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_removes_the_record_but_keeps_the_file() {
    let h = harness().await;

    let response = send(
        &h.app,
        upload_request(&[Part::File {
            file_name: "vows.m4a",
            content_type: "audio/mp4",
            bytes: b"vows",
        }]),
    )
    .await;
    let id = json(response).await["id"].as_str().unwrap().to_string();

    let detail = json(send(&h.app, admin_get(&format!("/api/media/{id}"))).await).await;
    assert_eq!(detail["category"], "audio");
    let location = detail["file_path"].as_str().unwrap().to_string();

    let response = send(&h.app, admin_delete(&format!("/api/media/{id}"))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(dashboard(&h.app).await["total"], 0);

    let response = send(&h.app, admin_delete(&format!("/api/media/{id}"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let key = h.state.media.key_for_location(&location).unwrap();
    assert_eq!(h.state.media.read_object(key).await.unwrap(), b"vows");
}

#[tokio::test]
async fn archive_skips_unreachable_files_only() {
    let h = harness().await;

    for (name, bytes) in [("cake.jpg", b"cake".as_slice()), ("toast.mp4", b"toast".as_slice())] {
        send(
            &h.app,
            upload_request(&[Part::File {
                file_name: name,
                content_type: "application/octet-stream",
                bytes,
            }]),
        )
        .await;
    }
    send(
        &h.app,
        upload_request(&[
            Part::Text("guestName", "Nana Rose"),
            Part::Text("message", "So proud"),
            Part::Text("messageOnly", "true"),
        ]),
    )
    .await;

    // A record whose object was never written.
    sqlx::query(
        "INSERT INTO media (id, event_id, file_name, file_path, file_type, file_size, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(&h.state.event.id)
    .bind("lost.jpg")
    .bind(h.state.media.public_location("roberta-michael-wedding/missing.jpg"))
    .bind("image/jpeg")
    .bind(10_i64)
    .bind(chrono::Utc::now())
    .execute(&*h.state.media.db)
    .await
    .unwrap();

    let response = send(&h.app, admin_get("/api/media/archive")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Roberta & Michael's Wedding-memories.zip\""
    );
    assert_eq!(response.headers()["x-archive-skipped"], "1");

    let bytes = body_bytes(response).await;
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut contents = HashMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut body = String::new();
        entry.read_to_string(&mut body).unwrap();
        contents.insert(entry.name().to_string(), body);
    }

    assert_eq!(contents.len(), 3);
    assert_eq!(contents["cake.jpg"], "cake");
    assert_eq!(contents["toast.mp4"], "toast");
    let message = contents
        .iter()
        .find(|(name, _)| name.starts_with("Message_Nana_Rose_"))
        .map(|(_, body)| body)
        .unwrap();
    assert!(message.starts_with("From: Nana Rose\nMessage: So proud\nDate: "));
    assert!(!contents.contains_key("lost.jpg"));
}

#[tokio::test]
async fn archive_of_nothing_is_not_found() {
    let h = harness().await;
    let response = send(&h.app, admin_get("/api/media/archive")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn event_codes_resolve_to_roles() {
    let h = harness().await;

    let body = json(send(&h.app, get("/api/events/GUESTS")).await).await;
    assert_eq!(body["role"], "guest");
    assert_eq!(body["name"], "Roberta & Michael's Wedding");
    assert_eq!(body["date_label"], "Saturday, June 21, 2025");

    let body = json(send(&h.app, get("/api/events/COUPLE")).await).await;
    assert_eq!(body["role"], "admin");

    let response = send(&h.app, get("/api/events/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn public_files_reject_traversal_and_missing_keys() {
    let h = harness().await;

    let response = send(&h.app, get("/files/a/../secret")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&h.app, get("/files/roberta-michael-wedding/none.jpg")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn readiness_checks_database_and_disk() {
    let h = harness().await;
    let response = send(&h.app, get("/readyz")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["status"], "ok");
}

#[tokio::test]
async fn admin_link_code_opens_the_dashboard() {
    let h = harness().await;
    send(
        &h.app,
        upload_request(&[
            Part::Text("guestName", "Ann"),
            Part::Text("messageOnly", "true"),
        ]),
    )
    .await;

    let with_code = |uri: &str, code: &str| {
        Request::get(uri)
            .header("x-admin-code", code)
            .body(Body::empty())
            .unwrap()
    };

    let response = send(&h.app, with_code("/api/media", "COUPLE")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["total"], 1);

    let response = send(&h.app, with_code("/api/media/archive", "COUPLE")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-archive-entries"], "1");

    for code in ["GUESTS", "couple", ""] {
        let response = send(&h.app, with_code("/api/media", code)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{code:?}");
    }
}

#[tokio::test]
async fn http_client_reports_server_errors() {
    let h = harness().await;
    let server = serve(h.app.clone()).await;
    let client = HttpUploadClient::new(&server);

    let empty = Submission {
        guest_name: " ",
        message: "",
        file: None,
        message_only: true,
    };
    assert_eq!(
        client.send(empty).await,
        Err(TransportError::Rejected(
            "Please provide either a name or message".into()
        ))
    );

    let wish = Submission {
        guest_name: "Nana Rose",
        message: "So proud",
        file: None,
        message_only: true,
    };
    let misrouted = HttpUploadClient::new(&format!("{server}/elsewhere"));
    assert_eq!(
        misrouted.send(wish).await,
        Err(TransportError::Rejected("Upload failed".into()))
    );

    assert_eq!(client.send(wish).await, Ok(()));
    assert_eq!(dashboard(&h.app).await["total"], 1);
}

#[tokio::test]
async fn upload_form_sends_attachments_over_http() {
    let h = harness().await;
    let client = HttpUploadClient::new(&serve(h.app.clone()).await);

    let mut form = UploadForm::new();
    form.guest_name = "Sam".into();
    form.add_files([AttachmentFile {
        name: "toast.mp4".into(),
        content_type: Some("video/mp4".into()),
        bytes: Bytes::from_static(b"toast"),
    }]);

    let report = form.submit(&client).await;
    assert_eq!(report.sent, 1);
    assert!(form.all_uploaded());

    let view = dashboard(&h.app).await;
    assert_eq!(view["media"][0]["file_name"], "toast.mp4");
    assert_eq!(view["media"][0]["uploaded_by"], "Sam");
    assert_eq!(view["counts"]["videos"], 1);
}

#[tokio::test]
async fn failed_record_insert_removes_the_stored_file() {
    let h = harness().await;
    sqlx::query("DROP TABLE media")
        .execute(&*h.state.media.db)
        .await
        .unwrap();

    let response = send(
        &h.app,
        upload_request(&[Part::File {
            file_name: "cake.jpg",
            content_type: "image/jpeg",
            bytes: b"cake",
        }]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(response).await["error"], "Failed to save file record");
    assert_eq!(stored_files(h.storage.path()), 0);
}

#[tokio::test]
async fn rejected_object_key_discards_the_staged_file() {
    let h = harness_with(&[("WEDDING_EVENT_ID", ".hidden-event")]).await;

    let response = send(
        &h.app,
        upload_request(&[Part::File {
            file_name: "cake.jpg",
            content_type: "image/jpeg",
            bytes: b"cake",
        }]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(response).await["error"], "Failed to upload file");
    assert_eq!(stored_files(h.storage.path()), 0);
}
