// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 身份（identity）：单次请求使用的 User-Agent 与请求头
/// - 代理（proxy）：代理的健康状态与统计
/// - 重试（retry）：状态码对应的重试动作与决策
/// - 任务（job）：一次抓取任务及其生命周期
/// - 执行结果（execution_result）：任务完成或失败后的结果
pub mod execution_result;
pub mod identity;
pub mod job;
pub mod proxy;
pub mod retry;
