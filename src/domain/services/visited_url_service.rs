// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashSet;

/// 已访问 URL 记录，仅用于日志提示，不阻止重复抓取
pub struct VisitedUrlTracker {
    enabled: bool,
    urls: DashSet<String>,
}

impl VisitedUrlTracker {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            urls: DashSet::new(),
        }
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.enabled && self.urls.contains(url)
    }

    pub fn mark_visited(&self, url: &str) {
        if self.enabled {
            self.urls.insert(url.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
