// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 包括单任务执行流程和任务提交、并发控制与关闭
pub mod manager;
pub mod scrape_worker;

pub use manager::ScrapeService;
