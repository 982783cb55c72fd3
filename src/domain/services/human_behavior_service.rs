// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use rand::Rng;
use tracing::{debug, error};

use crate::config::settings::HumanBehaviorSettings;
use crate::engines::traits::BrowserPage;
use crate::utils::timing::random_delay_in;

/// 人类行为模拟
///
/// 页面加载后随机移动鼠标、滚动页面。只影响被检测的概率，不影响提取结果，
/// 所有错误都只记录日志。
#[derive(Debug, Clone)]
pub struct HumanBehaviorSimulator {
    settings: HumanBehaviorSettings,
}

impl HumanBehaviorSimulator {
    pub fn new(settings: HumanBehaviorSettings) -> Self {
        Self { settings }
    }

    pub async fn simulate(&self, page: &dyn BrowserPage) {
        self.simulate_mouse_movement(page).await;
        self.simulate_scroll(page).await;
    }

    /// 在视口内随机移动一次鼠标
    pub async fn simulate_mouse_movement(&self, page: &dyn BrowserPage) {
        if !self.settings.enabled || !self.settings.mouse_movement {
            return;
        }

        let viewport = page.viewport();
        let (x, y, steps) = {
            let mut rng = rand::rng();
            (
                rng.random_range(0.0..viewport.width.max(1) as f64),
                rng.random_range(0.0..viewport.height.max(1) as f64),
                rng.random_range(5..=15),
            )
        };

        match page.mouse_move(x, y, steps).await {
            Ok(()) => debug!("Mouse moved to ({:.0}, {:.0})", x, y),
            Err(e) => error!("Mouse movement simulation failed: {}", e),
        }
    }

    /// 向下随机滚动一次
    pub async fn simulate_scroll(&self, page: &dyn BrowserPage) {
        if !self.settings.enabled || !self.settings.scroll_behavior {
            return;
        }

        let distance = rand::rng().random_range(100..=500);
        let duration = random_delay_in(&self.settings.scroll_speed);

        match page.scroll(distance, duration).await {
            Ok(()) => debug!("Scrolled {}px over {}ms", distance, duration.as_millis()),
            Err(e) => error!("Scroll simulation failed: {}", e),
        }
    }
}
