// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crawlguard::config::settings::OutputFormat;
use crawlguard::domain::models::execution_result::ExecutionResult;
use crawlguard::domain::models::job::{DataType, JobRequest, JobStatus, TargetField};
use crawlguard::engines::http_engine::HttpDriver;
use crawlguard::workers::ScrapeService;

use super::helpers::{fast_settings, product_page};

async fn slow_site(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(product_page())
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_submitted_jobs_respect_concurrency_limit() {
    let server = slow_site(Duration::from_millis(150)).await;

    let mut settings = fast_settings();
    settings.concurrency.max_concurrent = 1;
    let service = ScrapeService::new(settings, Arc::new(HttpDriver::new()), None);

    let started = Instant::now();
    let ids: Vec<String> = (0..3)
        .map(|i| {
            service
                .submit_job(JobRequest::new(format!("{}/page/{}", server.uri(), i), vec![]))
                .unwrap()
        })
        .collect();
    service.wait_idle().await;

    assert!(started.elapsed() >= Duration::from_millis(450));
    for id in &ids {
        let result = service.get_result(id).unwrap();
        assert!(result.is_success(), "unexpected error: {:?}", result.error);
    }
    assert_eq!(service.get_stats().completed_count, 3);
}

#[tokio::test]
async fn test_shutdown_cancels_running_jobs() {
    let server = slow_site(Duration::from_secs(10)).await;
    let service = ScrapeService::new(fast_settings(), Arc::new(HttpDriver::new()), None);

    let id = service
        .submit_job(JobRequest::new(server.uri(), vec![]))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    service.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(5));

    let result = service.get_result(&id).unwrap();
    assert!(!result.is_success());
    assert_eq!(
        service.registry().get_job(&id).unwrap().status,
        JobStatus::Failed
    );
}

#[tokio::test]
async fn test_job_deadline_fails_job() {
    let server = slow_site(Duration::from_secs(3)).await;

    let mut settings = fast_settings();
    settings.error_handling.job_timeout_ms = Some(200);
    let service = ScrapeService::new(settings, Arc::new(HttpDriver::new()), None);

    let result = service
        .execute_job(JobRequest::new(server.uri(), vec![]))
        .await
        .unwrap();

    assert_eq!(result.error.as_deref(), Some("Job deadline exceeded"));
    assert_eq!(service.get_stats().running_count, 0);
}

#[tokio::test]
async fn test_results_are_saved_when_enabled() {
    let server = slow_site(Duration::ZERO).await;
    let dir = tempfile::tempdir().unwrap();

    let mut settings = fast_settings();
    settings.misc.save_output = true;
    settings.misc.output_dir = dir.path().to_string_lossy().to_string();
    settings.misc.output_format = OutputFormat::Json;
    let service = ScrapeService::new(settings, Arc::new(HttpDriver::new()), None);

    let result = service
        .execute_job(JobRequest::new(
            server.uri(),
            vec![TargetField::new("Title", "h1", DataType::Text)],
        ))
        .await
        .unwrap();

    let saved = dir.path().join(format!("result_{}.json", result.job_id));
    let contents = std::fs::read_to_string(saved).unwrap();
    let parsed: ExecutionResult = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed.job_id, result.job_id);
    assert_eq!(parsed.extracted_fields["title"].len(), 1);
}
