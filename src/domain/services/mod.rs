// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 反爬策略的核心逻辑，全部是进程内的有状态或无状态服务：
/// - 提取服务（extraction_service）：按字段描述从页面提取数据
/// - 人类行为模拟（human_behavior_service）：页面加载后的鼠标移动与滚动
/// - 身份生成（identity_service）：随机 User-Agent 与请求头
/// - 代理轮换（proxy_service）：代理健康状态与选择
/// - 限流（rate_limiting_service）：按出口的滑动窗口限流
/// - 状态码重试策略（retry_policy_service）：HTTP 状态码到重试动作的映射
/// - 已访问记录（visited_url_service）：仅用于日志提示的 URL 集合
pub mod extraction_service;
pub mod human_behavior_service;
pub mod identity_service;
pub mod proxy_service;
pub mod rate_limiting_service;
pub mod retry_policy_service;
pub mod visited_url_service;
