//! Integration tests for classboard-api endpoints
//!
//! Every test builds its own router over a fresh in-memory store.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use classboard_api::store::{Bucket, ObjectStore, Store};
use classboard_common::config::UploadLimits;
use helpers::{
    bytes_request, json_request, monday_reply, other_owner, owner, test_request, StubVision,
    TestApp, OTHER_OWNER, OWNER, PNG,
};
use serde_json::{json, Value};

const STORED_IMAGE: &str = "797281cf-9397-4fca-b983-300825cde186/upload.png";

async fn app_with_schedule() -> TestApp {
    let app = TestApp::new(StubVision::replying(&monday_reply())).await;
    app.store
        .upload(Bucket::Schedules, STORED_IMAGE, "image/png", PNG.to_vec())
        .await
        .unwrap();
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/process-schedule",
            json!({"filePath": STORED_IMAGE, "fileName": "upload.png"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    app
}

fn with_owner(mut request: Request<Body>, owner: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-owner-id", owner.parse().unwrap());
    request
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new(StubVision::replying("[]")).await;

    let (status, body) = app.send(test_request("GET", "/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "classboard-api");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_u64());
}

// =============================================================================
// POST /api/process-schedule
// =============================================================================

#[tokio::test]
async fn test_process_schedule_wrong_method() {
    let app = TestApp::new(StubVision::replying("[]")).await;

    for method in ["GET", "PUT", "DELETE"] {
        let (status, body) = app.send(test_request(method, "/api/process-schedule")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        assert_eq!(body["error"], "Method not allowed");
    }
}

#[tokio::test]
async fn test_process_schedule_missing_fields() {
    let app = TestApp::new(StubVision::replying("[]")).await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/process-schedule",
            json!({"filePath": "x.png"}),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing filePath or fileName");
    assert_eq!(app.vision.calls(), 0);
}

#[tokio::test]
async fn test_process_schedule_malformed_body() {
    let app = TestApp::new(StubVision::replying("[]")).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/process-schedule")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_process_schedule_success_then_idempotent() {
    let app = TestApp::new(StubVision::replying(&monday_reply())).await;
    let upload = || async {
        app.store
            .upload(Bucket::Schedules, STORED_IMAGE, "image/png", PNG.to_vec())
            .await
            .unwrap();
    };
    let process = || {
        json_request(
            "POST",
            "/api/process-schedule",
            json!({"filePath": STORED_IMAGE, "fileName": "upload.png"}),
        )
    };

    upload().await;
    let (status, body) = app.send(process()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["classesFound"], 1);
    assert_eq!(body["classesInserted"], 1);
    assert_eq!(body["classes"][0]["days_of_week"], "Mon");
    assert_eq!(body["classes"][0]["start_time"], "09:00:00");

    upload().await;
    let (status, body) = app.send(process()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["classesFound"], 1);
    assert_eq!(body["classesInserted"], 0);
    assert!(body["classes"].is_null());

    assert_eq!(app.store.list_classes(owner()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_process_schedule_missing_image_is_500() {
    let app = TestApp::new(StubVision::replying(&monday_reply())).await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/process-schedule",
            json!({"filePath": "nowhere.png", "fileName": "nowhere.png"}),
        ))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to download image"));
}

#[tokio::test]
async fn test_process_schedule_unparseable_reply_is_500() {
    let app = TestApp::new(StubVision::replying("no schedule here")).await;
    app.store
        .upload(Bucket::Schedules, STORED_IMAGE, "image/png", PNG.to_vec())
        .await
        .unwrap();

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/process-schedule",
            json!({"filePath": STORED_IMAGE, "fileName": "upload.png"}),
        ))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "EXTRACTION_ERROR");
    assert!(app.store.list_classes(owner()).await.unwrap().is_empty());
}

// =============================================================================
// POST /api/schedule/upload
// =============================================================================

#[tokio::test]
async fn test_upload_rejects_non_image_before_network() {
    let app = TestApp::new(StubVision::replying(&monday_reply())).await;

    let (status, body) = app
        .send(bytes_request(
            "/api/schedule/upload?file_name=notes.pdf",
            "application/pdf",
            b"%PDF-1.7".to_vec(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("image"));

    // Declared as an image but the bytes say otherwise
    let (status, _) = app
        .send(bytes_request(
            "/api/schedule/upload?file_name=fake.png",
            "image/png",
            b"plain text".to_vec(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.vision.calls(), 0);
    assert!(app
        .store
        .list_schedule_uploads(owner())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_upload_rejects_oversized_before_network() {
    let limits = UploadLimits {
        schedule_max_bytes: 8,
        ..UploadLimits::default()
    };
    let app = TestApp::with_limits(StubVision::replying(&monday_reply()), limits).await;

    let (status, body) = app
        .send(bytes_request(
            "/api/schedule/upload?file_name=big.png",
            "image/png",
            PNG.to_vec(),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("too large"));
    assert_eq!(app.vision.calls(), 0);
}

#[tokio::test]
async fn test_upload_runs_pipeline_and_removes_image() {
    let app = TestApp::new(StubVision::replying(&monday_reply())).await;

    let (status, body) = app
        .send(bytes_request(
            "/api/schedule/upload?file_name=term1.png",
            "image/png",
            PNG.to_vec(),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["classesInserted"], 1);

    let file_path = body["filePath"].as_str().unwrap();
    assert!(file_path.starts_with(&format!("{}/", OWNER)));
    assert!(file_path.ends_with("_term1.png"));
    assert!(app
        .store
        .download(Bucket::Schedules, file_path)
        .await
        .is_err());
}

#[tokio::test]
async fn test_failed_upload_returns_stored_path() {
    let app = TestApp::new(StubVision::failing("model overloaded")).await;

    let (status, body) = app
        .send(bytes_request(
            "/api/schedule/upload?file_name=term1.png",
            "image/png",
            PNG.to_vec(),
        ))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "EXTRACTION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("model overloaded"));

    // The kept image can be handed straight back to process-schedule
    let file_path = body["filePath"].as_str().unwrap();
    assert!(file_path.starts_with(&format!("{}/", OWNER)));
    assert_eq!(
        app.store.download(Bucket::Schedules, file_path).await.unwrap(),
        PNG
    );
}

// =============================================================================
// Owner selection
// =============================================================================

#[tokio::test]
async fn test_owner_header_selects_rows() {
    let app = app_with_schedule().await;

    let (status, body) = app.send(test_request("GET", "/api/classes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = app
        .send(with_owner(test_request("GET", "/api/classes"), OTHER_OWNER))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = app
        .send(with_owner(test_request("GET", "/api/classes"), "not-a-uuid"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid owner id"));
}

// =============================================================================
// Class views and dashboard
// =============================================================================

#[tokio::test]
async fn test_class_views() {
    let app = app_with_schedule().await;

    let (_, all) = app.send(test_request("GET", "/api/classes")).await;
    let class = &all[0];
    assert_eq!(class["class_code"], "101");
    assert_eq!(class["start"], "09:00");
    assert_eq!(class["end"], "10:00");
    assert!(class["color"]["background"].as_str().unwrap().starts_with('#'));

    let (status, week) = app.send(test_request("GET", "/api/classes/week")).await;
    assert_eq!(status, StatusCode::OK);
    let week = week.as_array().unwrap();
    assert_eq!(week.len(), 7);
    assert_eq!(week[0]["day"], "Sun");
    assert_eq!(week[1]["day"], "Mon");
    assert_eq!(week[1]["classes"].as_array().unwrap().len(), 1);
    assert!(week[2]["classes"].as_array().unwrap().is_empty());

    let (status, today) = app.send(test_request("GET", "/api/classes/today")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(today.is_array());
}

#[tokio::test]
async fn test_dashboard_has_schedule_is_live() {
    let app = TestApp::new(StubVision::replying(&monday_reply())).await;

    let (status, before) = app.send(test_request("GET", "/api/dashboard")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["has_schedule"], false);
    assert!(before["next_class"].is_null());
    assert_eq!(before["stats"]["total_classes"], 0);

    app.store
        .upload(Bucket::Schedules, STORED_IMAGE, "image/png", PNG.to_vec())
        .await
        .unwrap();
    app.send(json_request(
        "POST",
        "/api/process-schedule",
        json!({"filePath": STORED_IMAGE, "fileName": "upload.png"}),
    ))
    .await;

    let (_, after) = app.send(test_request("GET", "/api/dashboard")).await;
    assert_eq!(after["has_schedule"], true);
    assert_eq!(after["stats"]["total_classes"], 1);
    // Null only on Mondays once the class has started
    let next = &after["next_class"];
    assert!(next.is_null() || next["class_code"] == "101");
}

#[tokio::test]
async fn test_dashboard_language() {
    let app = TestApp::new(StubVision::replying("[]")).await;

    let (status, body) = app.send(test_request("GET", "/api/dashboard?lang=ar")).await;
    assert_eq!(status, StatusCode::OK);
    let display = body["display_date"].as_str().unwrap();
    assert!(display.chars().any(|c| ('\u{0660}'..='\u{0669}').contains(&c)));

    let (status, _) = app.send(test_request("GET", "/api/dashboard?lang=fr")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Notes
// =============================================================================

#[tokio::test]
async fn test_notes_upload_list_and_download() {
    let app = app_with_schedule().await;

    let (status, note) = app
        .send(bytes_request(
            "/api/notes/upload?date=2025-10-12&code=101&file_name=week%203.pdf",
            "application/pdf",
            b"%PDF-1.7 notes".to_vec(),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        note["storage_path"],
        format!("{}/2025-10-12/101/week 3.pdf", OWNER)
    );
    assert_eq!(note["class_name"], "تفاضل وتكامل");
    assert_eq!(note["size_bytes"], 14);
    assert_eq!(note["size_display"], "14 bytes");

    let (_, listed) = app
        .send(test_request("GET", "/api/notes?date=2025-10-12"))
        .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (_, other_code) = app
        .send(test_request("GET", "/api/notes?date=2025-10-12&code=999"))
        .await;
    assert!(other_code.as_array().unwrap().is_empty());

    let (_, other_day) = app
        .send(test_request("GET", "/api/notes?date=2025-10-13"))
        .await;
    assert!(other_day.as_array().unwrap().is_empty());

    let url = listed[0]["public_url"].as_str().unwrap().replace(' ', "%20");
    let response = tower::util::ServiceExt::oneshot(app.router.clone(), test_request("GET", &url))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.7 notes");
}

#[tokio::test]
async fn test_notes_reupload_replaces_file() {
    let app = TestApp::new(StubVision::replying("[]")).await;
    let uri = "/api/notes/upload?date=2025-10-12&code=101&file_name=a.txt";

    app.send(bytes_request(uri, "text/plain", b"first".to_vec())).await;
    app.send(bytes_request(uri, "text/plain", b"second".to_vec())).await;

    let path = format!("{}/2025-10-12/101/a.txt", OWNER);
    assert_eq!(
        app.store.download(Bucket::Notes, &path).await.unwrap(),
        b"second"
    );
}

#[tokio::test]
async fn test_notes_upload_validation() {
    let app = TestApp::new(StubVision::replying("[]")).await;

    let (status, _) = app
        .send(bytes_request(
            "/api/notes/upload?date=2025-10-12&file_name=a.txt",
            "text/plain",
            b"x".to_vec(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "missing code");

    let (status, _) = app
        .send(bytes_request(
            "/api/notes/upload?date=2025-10-12&code=101&file_name=..%2Fescape.txt",
            "text/plain",
            b"x".to_vec(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "path in file name");

    let (status, _) = app
        .send(bytes_request(
            "/api/notes/upload?date=2025-10-12&code=101&file_name=a.txt",
            "text/plain",
            Vec::new(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "empty file");

    for code in ["..", ".", "10%2F1"] {
        let uri = format!(
            "/api/notes/upload?date=2025-10-12&code={}&file_name=a.txt",
            code
        );
        let (status, body) = app
            .send(bytes_request(&uri, "text/plain", b"x".to_vec()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "class code {}", code);
        assert!(body["error"].as_str().unwrap().contains("Invalid class code"));
    }

    assert!(app.store.list(Bucket::Notes, OWNER).await.unwrap().is_empty());
    let (_, listed) = app
        .send(test_request("GET", "/api/notes?date=2025-10-12"))
        .await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_note_files_of_other_owners_are_hidden() {
    let app = TestApp::new(StubVision::replying("[]")).await;
    app.send(bytes_request(
        "/api/notes/upload?date=2025-10-12&code=101&file_name=a.txt",
        "text/plain",
        b"mine".to_vec(),
    ))
    .await;

    let uri = format!("/api/files/notes/{}/2025-10-12/101/a.txt", OWNER);
    let (status, _) = app
        .send(with_owner(test_request("GET", &uri), OTHER_OWNER))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Reminders
// =============================================================================

#[tokio::test]
async fn test_reminder_lifecycle() {
    let app = app_with_schedule().await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/reminders",
            json!({"class_code": "999", "message": "Quiz"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No class with code 999");

    let (status, created) = app
        .send(json_request(
            "POST",
            "/api/reminders",
            json!({"class_code": "101", "message": "Quiz on chapter 3", "remind_date": "2025-10-14"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["class_code"], "101");
    assert_eq!(created["remind_date"], "2025-10-14");
    assert_eq!(created["resolved"], false);
    let id = created["id"].as_i64().unwrap();

    let (_, open) = app
        .send(test_request("GET", "/api/reminders?unresolved=true"))
        .await;
    assert_eq!(open.as_array().unwrap().len(), 1);

    let (status, resolved) = app
        .send(test_request("POST", &format!("/api/reminders/{}/resolve", id)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["resolved"], true);

    let (_, open) = app
        .send(test_request("GET", "/api/reminders?unresolved=true"))
        .await;
    assert!(open.as_array().unwrap().is_empty());
    let (_, all) = app.send(test_request("GET", "/api/reminders")).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, _) = app
        .send(test_request("DELETE", &format!("/api/reminders/{}", id)))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app
        .send(test_request("DELETE", &format!("/api/reminders/{}", id)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_reminder_requires_message() {
    let app = app_with_schedule().await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/reminders",
            json!({"class_code": "101", "message": "   "}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Reminder message is required");
}

// =============================================================================
// Reset
// =============================================================================

async fn snapshot(app: &TestApp, owner: &str) -> Vec<Value> {
    let mut views = Vec::new();
    for uri in ["/api/classes", "/api/notes?date=2025-10-12", "/api/reminders"] {
        let (_, body) = app.send(with_owner(test_request("GET", uri), owner)).await;
        views.push(body);
    }
    let (_, dashboard) = app
        .send(with_owner(test_request("GET", "/api/dashboard"), owner))
        .await;
    views.push(dashboard["has_schedule"].clone());
    views.push(dashboard["stats"].clone());
    views.push(dashboard["next_class"].clone());
    views
}

#[tokio::test]
async fn test_reset_matches_brand_new_owner() {
    let app = app_with_schedule().await;
    // A schedule image kept by a failed extraction
    let kept_image = format!("{}/kept_term2.png", OWNER);
    app.store
        .upload(Bucket::Schedules, &kept_image, "image/png", PNG.to_vec())
        .await
        .unwrap();
    let other_image = format!("{}/theirs.png", OTHER_OWNER);
    app.store
        .upload(Bucket::Schedules, &other_image, "image/png", PNG.to_vec())
        .await
        .unwrap();
    app.send(bytes_request(
        "/api/notes/upload?date=2025-10-12&code=101&file_name=a.txt",
        "text/plain",
        b"notes".to_vec(),
    ))
    .await;
    app.send(json_request(
        "POST",
        "/api/reminders",
        json!({"class_code": "101", "message": "Quiz"}),
    ))
    .await;

    assert_ne!(snapshot(&app, OWNER).await, snapshot(&app, OTHER_OWNER).await);

    let (status, body) = app.send(test_request("POST", "/api/reset")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["deleted"]["classes"], 1);
    assert_eq!(body["deleted"]["notes"], 1);
    assert_eq!(body["deleted"]["reminders"], 1);
    assert_eq!(body["deleted"]["schedule_uploads"], 1);
    assert_eq!(body["deleted"]["schedule_images"], 1);
    assert_eq!(body["deleted"]["files_left_behind"], 0);

    assert_eq!(snapshot(&app, OWNER).await, snapshot(&app, OTHER_OWNER).await);

    let path = format!("{}/2025-10-12/101/a.txt", OWNER);
    assert!(app.store.download(Bucket::Notes, &path).await.is_err());
    assert!(app.store.list(Bucket::Schedules, OWNER).await.unwrap().is_empty());
    assert_eq!(
        app.store.list(Bucket::Schedules, OTHER_OWNER).await.unwrap(),
        [other_image]
    );
    assert!(app
        .store
        .list_schedule_uploads(owner())
        .await
        .unwrap()
        .is_empty());
    assert!(app
        .store
        .list_schedule_uploads(other_owner())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_reset_wrong_method() {
    let app = TestApp::new(StubVision::replying("[]")).await;
    let (status, body) = app.send(test_request("GET", "/api/reset")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");
}
