// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Weekday};
use rand::Rng;
use std::time::Duration;

use crate::config::settings::{DelayRange, TimeBasedBehaviorSettings, TimingSettings};

/// `[min_ms, max_ms]` 之间均匀分布的随机等待
pub fn random_delay(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
}

pub fn random_delay_in(range: &DelayRange) -> Duration {
    random_delay(range.min_ms, range.max_ms)
}

/// 请求前的随机等待，启用时按深夜/周末放大
pub fn time_adjusted_delay(timing: &TimingSettings) -> Duration {
    let base = random_delay(timing.min_delay_ms, timing.max_delay_ms);
    adjust_for_time(base, &timing.time_based_behavior, Local::now())
}

/// 根据时间段调整等待时间
pub fn adjust_for_time<Tz: TimeZone>(
    base: Duration,
    behavior: &TimeBasedBehaviorSettings,
    now: DateTime<Tz>,
) -> Duration {
    if !behavior.enabled {
        return base;
    }

    let mut factor = 1.0;
    let hour = now.hour();
    let night = &behavior.night_hours;
    let is_night = if night.start <= night.end {
        hour >= night.start && hour < night.end
    } else {
        hour >= night.start || hour < night.end
    };
    if is_night {
        factor *= night.delay_multiplier;
    }

    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        factor *= behavior.weekend_multiplier;
    }

    Duration::from_millis((base.as_millis() as f64 * factor).round() as u64)
}
