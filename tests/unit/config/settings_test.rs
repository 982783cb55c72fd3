// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::io::Write;

use crawlguard::config::settings::{DriverKind, OutputFormat, Settings};
use crawlguard::domain::models::retry::RetryAction;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_file_overrides_defaults() {
    let file = write_config(
        r#"
[timing]
min_delay_ms = 200
max_delay_ms = 400

[proxy]
enabled = true
list = ["http://10.0.0.1:8080", "http://10.0.0.2:8080"]

[proxy.rate_limit]
requests_per_minute = 30

[error_handling.status_handlers.418]
action = "rotate_headers"
wait_time_ms = 100

[browser]
driver = "http"

[misc]
output_format = "csv"
"#,
    );

    let settings = Settings::with_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(settings.timing.min_delay_ms, 200);
    assert_eq!(settings.timing.max_delay_ms, 400);
    assert_eq!(settings.proxy.list.len(), 2);
    assert_eq!(settings.proxy.rate_limit.requests_per_minute, 30);
    assert_eq!(settings.proxy.rate_limit.requests_per_hour, 100);
    assert_eq!(
        settings.error_handling.status_handlers["418"].action,
        RetryAction::RotateIdentity
    );
    assert_eq!(settings.browser.driver, DriverKind::Http);
    assert_eq!(settings.misc.output_format, OutputFormat::Csv);
    // 未出现在文件中的部分保持默认值
    assert_eq!(settings.headers.user_agents.len(), 5);
}

#[test]
fn test_inconsistent_file_is_rejected() {
    let file = write_config(
        r#"
[timing]
min_delay_ms = 5000
max_delay_ms = 1000
"#,
    );

    assert!(Settings::with_file(file.path().to_str().unwrap()).is_err());
}
