mod support;

use client::{ApiClient, ClientConfig, ClientError};
use common::{EventStatus, ResearchStatus, StartEventRequest, StartResearchRequest};
use serde_json::json;
use support::{api_for, setup_mock_server, task_json};
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn start_event_devuelve_el_id() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/events"))
        .and(body_json(json!({"title": "Feria del libro", "location": "Rosario"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "ev-9"})))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let created = assert_ok!(
        api.start_event(&StartEventRequest {
            title: "Feria del libro".into(),
            description: None,
            date: None,
            location: Some("Rosario".into()),
        })
        .await
    );

    assert_eq!(created.task_id, "ev-9");
}

#[tokio::test]
async fn get_event_parsea_payload_y_status() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/events/ev-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(
            "ev-1",
            "images_ready",
            10.0,
            json!({
                "progress": 0.5,
                "current_step": "images",
                "announcement": "Se viene la feria",
                "preview_images": ["a.png", "b.png"]
            }),
        )))
        .mount(&server)
        .await;

    let task = assert_ok!(api_for(&server).get_event("ev-1").await);

    assert_eq!(task.status, EventStatus::ImagesReady);
    assert_eq!(task.progress, Some(0.5));
    assert_eq!(task.payload.preview_images.len(), 2);
    assert!(task.payload.video_prompts.is_empty());
}

#[tokio::test]
async fn status_desconocido_no_rompe_el_parseo() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/research/rs-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(
            "rs-1",
            "unknown_future_status",
            1.0,
            json!({}),
        )))
        .mount(&server)
        .await;

    let task = assert_ok!(api_for(&server).get_research("rs-1").await);
    assert_eq!(
        task.status,
        ResearchStatus::Unknown("unknown_future_status".into())
    );
}

#[tokio::test]
async fn not_found_se_mapea_a_not_found() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/events/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = api_for(&server).get_event("nope").await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(ref id) if id == "nope"));
}

#[tokio::test]
async fn error_del_backend_conserva_el_mensaje() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/research"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "busy"})))
        .mount(&server)
        .await;

    let err = api_for(&server)
        .start_research(&StartResearchRequest {
            topic: "baterías de sodio".into(),
            instructions: None,
        })
        .await
        .unwrap_err();

    match &err {
        ClientError::Api { status, message } => {
            assert_eq!(*status, 503);
            assert_eq!(message, "busy");
        }
        other => panic!("esperaba ClientError::Api, vino {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn el_id_se_escapa_en_la_ruta() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/events/a%2Fb%3Fc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(task_json("a/b?c", "started", 1.0, json!({}))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/events/a%2Fb%3Fc/videos"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(task_json("a/b?c", "generating_videos", 2.0, json!({}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    let task = assert_ok!(api.get_event("a/b?c").await);
    assert_eq!(task.task_id, "a/b?c");
    let task = assert_ok!(api.generate_videos("a/b?c").await);
    assert_eq!(task.status, EventStatus::GeneratingVideos);
}

#[tokio::test]
async fn base_url_con_prefijo_conserva_la_ruta() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/backend/api/v1/research/rs-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(task_json("rs-1", "started", 1.0, json!({}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::default().with_api_url(format!("{}/backend/", server.uri()));
    let api = assert_ok!(ApiClient::new(&config));
    let task = assert_ok!(api.get_research("rs-1").await);
    assert_eq!(task.status, ResearchStatus::Started);
}

#[test]
fn api_url_sin_host_es_error_de_config() {
    let config = ClientConfig::default().with_api_url("http://");
    assert!(matches!(ApiClient::new(&config), Err(ClientError::Config(_))));
}

#[tokio::test]
async fn list_research_devuelve_todas() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/research"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            task_json("rs-1", "completed", 3.0, json!({"topic": "a"})),
            task_json("rs-2", "outline_ready", 2.0, json!({"topic": "b"})),
        ])))
        .mount(&server)
        .await;

    let tasks = assert_ok!(api_for(&server).list_research().await);
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1].status, ResearchStatus::OutlineReady);
}

#[tokio::test]
async fn pdf_devuelve_url_y_formato() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/research/rs-1/pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"pdf_url": "https://files/rs-1.pdf", "format": "pdf"})),
        )
        .mount(&server)
        .await;

    let pdf = assert_ok!(api_for(&server).get_research_pdf("rs-1").await);
    assert_eq!(pdf.pdf_url, "https://files/rs-1.pdf");
    assert_eq!(pdf.format, "pdf");
}
