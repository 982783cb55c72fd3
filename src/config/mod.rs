// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理反爬策略配置，包括时间参数、请求头、代理、重试和并发等配置
pub mod settings;
