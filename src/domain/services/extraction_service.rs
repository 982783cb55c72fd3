// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde_json::{Number, Value};
use std::collections::BTreeMap;
use tracing::{debug, error};

use crate::domain::models::job::{DataType, TargetField};
use crate::engines::traits::{BrowserPage, DriverError, ElementHandle};

/// 提取服务
///
/// 按字段描述从页面中提取数据。单个字段失败只会让该字段为空，
/// 不影响其余字段。
pub struct ExtractionService;

impl ExtractionService {
    /// 提取所有字段，键为规范化后的字段名
    pub async fn extract(
        page: &dyn BrowserPage,
        targets: &[TargetField],
    ) -> BTreeMap<String, Vec<Value>> {
        let mut result = BTreeMap::new();

        for target in targets {
            let name = target.field_name();
            let values = match Self::extract_field(page, target).await {
                Ok(values) => values,
                Err(e) => {
                    error!(
                        "Failed to extract field '{}' ({}): {}",
                        target.label, target.selector, e
                    );
                    Vec::new()
                }
            };
            debug!("Field '{}' extracted {} values", name, values.len());
            result.insert(name, values);
        }

        result
    }

    async fn extract_field(
        page: &dyn BrowserPage,
        target: &TargetField,
    ) -> Result<Vec<Value>, DriverError> {
        let elements = page.query(&target.selector).await?;
        let mut values = Vec::with_capacity(elements.len());

        for element in &elements {
            if let Some(value) = Self::element_value(element.as_ref(), target.data_type).await? {
                values.push(value);
            }
        }

        Ok(values)
    }

    async fn element_value(
        element: &dyn ElementHandle,
        data_type: DataType,
    ) -> Result<Option<Value>, DriverError> {
        let value = match data_type {
            DataType::Text => element
                .text_content()
                .await?
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .map(Value::String),
            DataType::Url | DataType::Image => Self::link_value(element).await?.map(Value::String),
            DataType::Number => element
                .text_content()
                .await?
                .and_then(|text| parse_number(&text))
                .map(Value::Number),
        };
        Ok(value)
    }

    /// `href` 优先，缺失时回退到 `src`
    async fn link_value(element: &dyn ElementHandle) -> Result<Option<String>, DriverError> {
        if let Some(href) = non_empty(element.attribute("href").await?) {
            return Ok(Some(href));
        }
        Ok(non_empty(element.attribute("src").await?))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 去掉非数字字符后解析最长的数字前缀，失败时返回 `None`
///
/// `"$10 - $20"` 解析为 10，`"1.2.3"` 解析为 1.2。
pub fn parse_number(text: &str) -> Option<Number> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let parsed: f64 = numeric_prefix(&cleaned).parse().ok()?;
    if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 {
        Some(Number::from(parsed as i64))
    } else {
        Number::from_f64(parsed)
    }
}

/// 形如 `-?digits(.digits)?` 的最长前缀
fn numeric_prefix(cleaned: &str) -> &str {
    let bytes = cleaned.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    let mut seen_dot = false;
    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => {}
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    &cleaned[..end]
}
