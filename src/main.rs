// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crawlguard::config::settings::Settings;
use crawlguard::domain::models::job::{JobRequest, TargetField};
use crawlguard::utils::telemetry;
use crawlguard::workers::ScrapeService;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "crawlguard")]
#[command(about = "Run one scrape job and print the result as JSON")]
struct Args {
    /// 额外的配置文件
    #[arg(short, long)]
    config: Option<String>,

    /// 目标 URL
    url: String,

    /// 提取字段，JSON 数组，如 `[{"label":"Title","selector":"h1","data_type":"text"}]`
    targets: Option<String>,
}

impl Args {
    fn targets(&self) -> anyhow::Result<Vec<TargetField>> {
        match &self.targets {
            Some(json) => serde_json::from_str(json).context("targets must be a JSON array"),
            None => Ok(Vec::new()),
        }
    }
}

/// 主函数
///
/// 加载配置、初始化日志，执行一次抓取任务并把结果以 JSON 输出到标准输出
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let targets = args.targets()?;

    let settings = match &args.config {
        Some(path) => Settings::with_file(path)?,
        None => Settings::new()?,
    };
    telemetry::init_telemetry(&settings.logging);
    info!("Starting crawlguard...");

    let service = ScrapeService::from_settings(settings);
    let result = service
        .execute_job(JobRequest::new(args.url, targets))
        .await;
    service.shutdown().await;

    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
