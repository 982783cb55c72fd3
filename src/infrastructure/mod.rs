// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 包含的子模块：
/// - 注册表（registry）：进程内的任务状态、结果和附加产物
/// - 存储（storage）：把执行结果写入本地 JSON/CSV 文件
pub mod registry;
pub mod storage;
