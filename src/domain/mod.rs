// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：任务、身份、代理记录、执行结果
/// - 服务（services）：限流、代理轮换、重试策略等领域服务
///
/// 领域层只依赖配置和浏览器驱动的抽象接口。
pub mod models;
pub mod services;
