// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crawlguard::domain::models::job::{DataType, JobRequest, JobStatus, TargetField};
use crawlguard::engines::http_engine::HttpDriver;
use crawlguard::utils::errors::JobError;
use crawlguard::workers::ScrapeService;

use super::helpers::{fast_settings, product_page};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

fn product_targets() -> Vec<TargetField> {
    vec![
        TargetField::new("Product Name", "li.product a.link", DataType::Text),
        TargetField::new("Price", "span.price", DataType::Number),
        TargetField::new("Link", "a.link", DataType::Url),
        TargetField::new("Hero Image", "img.hero", DataType::Image),
    ]
}

#[tokio::test]
async fn test_scrape_retries_after_429_and_extracts_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(html(product_page()))
        .mount(&server)
        .await;

    let service = ScrapeService::new(fast_settings(), Arc::new(HttpDriver::new()), None);
    let result = service
        .execute_job(JobRequest::new(
            format!("{}/products", server.uri()),
            product_targets(),
        ))
        .await
        .unwrap();

    assert!(result.is_success(), "unexpected error: {:?}", result.error);
    assert_eq!(result.status_code, Some(200));
    assert_eq!(result.attempts, 2);
    assert_eq!(
        result.extracted_fields["product_name"],
        vec![json!("Tea"), json!("Coffee")]
    );
    assert_eq!(result.extracted_fields["price"], vec![json!(1280), json!(980)]);
    assert_eq!(
        result.extracted_fields["link"],
        vec![json!("/items/1"), json!("/items/2")]
    );
    assert_eq!(
        result.extracted_fields["hero_image"],
        vec![json!("/img/hero.png")]
    );

    let stats = service.get_stats();
    assert_eq!(stats.completed_count, 1);
    assert_eq!(stats.cached_result_count, 1);
    assert_eq!(stats.visited_url_count, 1);
    assert_eq!(service.get_result(&result.job_id), Some(result));
}

#[tokio::test]
async fn test_exhausted_retries_record_failed_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut settings = fast_settings();
    settings.error_handling.max_retries = 2;
    let service = ScrapeService::new(settings, Arc::new(HttpDriver::new()), None);

    let result = service
        .execute_job(JobRequest::new(
            format!("{}/flaky", server.uri()),
            product_targets(),
        ))
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(result.status_code, Some(500));
    assert_eq!(result.attempts, 3);
    assert!(result.extracted_fields.is_empty());
    assert!(result.error.as_deref().unwrap().contains("500"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);

    let job = service.registry().get_job(&result.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(service.get_stats().failed_count, 1);
    assert_eq!(service.get_stats().visited_url_count, 0);
    assert!(service.get_result(&result.job_id).is_some());
}

#[tokio::test]
async fn test_unhandled_status_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let service = ScrapeService::new(fast_settings(), Arc::new(HttpDriver::new()), None);
    let result = service
        .execute_job(JobRequest::new(format!("{}/gone", server.uri()), vec![]))
        .await
        .unwrap();

    assert_eq!(result.status_code, Some(404));
    assert_eq!(result.attempts, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unmatched_field_is_empty_and_others_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(product_page()))
        .mount(&server)
        .await;

    let service = ScrapeService::new(fast_settings(), Arc::new(HttpDriver::new()), None);
    let result = service
        .execute_job(JobRequest::new(
            server.uri(),
            vec![
                TargetField::new("Rating", ".stars", DataType::Number),
                TargetField::new("Title", "h1.title", DataType::Text),
            ],
        ))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.extracted_fields["rating"], Vec::<serde_json::Value>::new());
    assert_eq!(result.extracted_fields["title"], vec![json!("週末セール")]);
}

#[tokio::test]
async fn test_rate_limit_rejects_before_navigation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(product_page()))
        .mount(&server)
        .await;

    let mut settings = fast_settings();
    settings.proxy.rate_limit.requests_per_minute = 1;
    let service = ScrapeService::new(settings, Arc::new(HttpDriver::new()), None);

    let first = service
        .execute_job(JobRequest::new(server.uri(), vec![]))
        .await
        .unwrap();
    assert!(first.is_success());

    let second = service
        .execute_job(JobRequest::new(format!("{}/again", server.uri()), vec![]))
        .await
        .unwrap();
    assert!(!second.is_success());
    assert_eq!(second.attempts, 0);
    assert!(second
        .error
        .as_deref()
        .unwrap()
        .starts_with("Rate limit exceeded for local"));

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert_eq!(
        service.registry().get_job(&second.job_id).unwrap().status,
        JobStatus::Failed
    );
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let service = ScrapeService::new(fast_settings(), Arc::new(HttpDriver::new()), None);

    let bad_url = service
        .execute_job(JobRequest::new("ftp://example.com/file", vec![]))
        .await;
    assert!(matches!(bad_url, Err(JobError::Validation(_))));

    let bad_field = service.submit_job(JobRequest::new(
        "https://example.com",
        vec![TargetField::new("", "h1", DataType::Text)],
    ));
    assert!(matches!(bad_field, Err(JobError::Validation(_))));

    assert_eq!(service.get_stats().pending_count, 0);
}

#[tokio::test]
async fn test_artifact_is_cached_with_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(product_page()))
        .mount(&server)
        .await;

    let service = ScrapeService::new(fast_settings(), Arc::new(HttpDriver::new()), None);
    let mut request = JobRequest::new(server.uri(), product_targets());
    request.artifact = Some("const scrape = async (page) => page.title();".to_string());

    let result = service.execute_job(request).await.unwrap();

    assert_eq!(
        service.registry().get_artifact(&result.job_id).as_deref(),
        Some("const scrape = async (page) => page.title();")
    );
    assert_eq!(service.get_stats().cached_artifact_count, 1);
}
