// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crawlguard::domain::models::job::JobRequest;
use crawlguard::engines::http_engine::HttpDriver;
use crawlguard::utils::robots::{RobotsChecker, RobotsCheckerTrait};
use crawlguard::workers::ScrapeService;

use super::helpers::fast_settings;

async fn site_with_robots(robots: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(robots))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>ok</h1>"))
        .mount(&server)
        .await;
    server
}

fn service(respect_robots: bool) -> ScrapeService {
    let mut settings = fast_settings();
    settings.misc.respect_robots_txt = respect_robots;
    let robots: Arc<dyn RobotsCheckerTrait> = Arc::new(RobotsChecker::new(reqwest::Client::new()));
    ScrapeService::new(settings, Arc::new(HttpDriver::new()), Some(robots))
}

#[tokio::test]
async fn test_disallowed_path_fails_without_navigation() {
    let server = site_with_robots("User-agent: *\nDisallow: /private\n").await;
    let service = service(true);

    let blocked = service
        .execute_job(JobRequest::new(format!("{}/private/data", server.uri()), vec![]))
        .await
        .unwrap();
    assert!(!blocked.is_success());
    assert!(blocked
        .error
        .as_deref()
        .unwrap()
        .starts_with("Disallowed by robots.txt"));

    let allowed = service
        .execute_job(JobRequest::new(format!("{}/public", server.uri()), vec![]))
        .await
        .unwrap();
    assert!(allowed.is_success(), "unexpected error: {:?}", allowed.error);

    let page_requests = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() != "/robots.txt")
        .count();
    assert_eq!(page_requests, 1);
}

#[tokio::test]
async fn test_robots_ignored_when_disabled() {
    let server = site_with_robots("User-agent: *\nDisallow: /\n").await;
    let service = service(false);

    let result = service
        .execute_job(JobRequest::new(format!("{}/anything", server.uri()), vec![]))
        .await
        .unwrap();
    assert!(result.is_success());
}

#[tokio::test]
async fn test_crawl_delay_is_honored() {
    let server = site_with_robots("User-agent: *\nCrawl-delay: 0.3\n").await;
    let service = service(true);

    let started = Instant::now();
    let result = service
        .execute_job(JobRequest::new(server.uri(), vec![]))
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(started.elapsed() >= Duration::from_millis(300));
}
