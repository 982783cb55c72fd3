// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 限制同时运行的任务数，并按配置逐步放开并发
pub mod governor;
