// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 分层加载默认值、配置文件和环境变量
pub mod config;

/// 领域模块
///
/// 包含任务、身份、代理等核心实体以及限流、重试、提取等领域服务
pub mod domain;

/// 引擎模块
///
/// 浏览器驱动抽象、Chromium/HTTP 驱动实现和带重试的导航器
pub mod engines;

/// 基础设施模块
///
/// 执行注册表和结果持久化
pub mod infrastructure;

/// 队列模块
///
/// 并发许可与阶段性扩容
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 单任务执行流程和对外的抓取服务
pub mod workers;
