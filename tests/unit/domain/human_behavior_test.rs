// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use crawlguard::config::settings::{DelayRange, HumanBehaviorSettings};
use crawlguard::domain::services::human_behavior_service::HumanBehaviorSimulator;

use crate::integration::helpers::MockPage;

fn settings() -> HumanBehaviorSettings {
    HumanBehaviorSettings {
        enabled: true,
        mouse_movement: true,
        scroll_behavior: true,
        scroll_speed: DelayRange {
            min_ms: 100,
            max_ms: 500,
        },
    }
}

#[tokio::test]
async fn test_simulate_moves_and_scrolls() {
    let page = MockPage::new();
    HumanBehaviorSimulator::new(settings()).simulate(&page).await;

    assert_eq!(page.mouse_move_count(), 1);
    assert_eq!(page.scroll_count(), 1);

    let last_scroll = *page.last_scroll.lock();
    let (distance, duration) = last_scroll.unwrap();
    assert!((100..=500).contains(&distance));
    assert!(duration >= Duration::from_millis(100) && duration <= Duration::from_millis(500));
}

#[tokio::test]
async fn test_disabled_simulation_touches_nothing() {
    let page = MockPage::new();
    let simulator = HumanBehaviorSimulator::new(HumanBehaviorSettings {
        enabled: false,
        ..settings()
    });
    simulator.simulate(&page).await;

    assert_eq!(page.mouse_move_count(), 0);
    assert_eq!(page.scroll_count(), 0);
}

#[tokio::test]
async fn test_individual_switches() {
    let page = MockPage::new();
    let simulator = HumanBehaviorSimulator::new(HumanBehaviorSettings {
        mouse_movement: false,
        ..settings()
    });
    simulator.simulate(&page).await;

    assert_eq!(page.mouse_move_count(), 0);
    assert_eq!(page.scroll_count(), 1);
}

#[tokio::test]
async fn test_interaction_failures_are_swallowed() {
    let page = MockPage::new().failing_interactions();
    HumanBehaviorSimulator::new(settings()).simulate(&page).await;

    // 鼠标失败后仍然尝试滚动
    assert_eq!(page.mouse_move_count(), 1);
    assert_eq!(page.scroll_count(), 1);
}
