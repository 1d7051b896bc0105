//! 联系通知计数演示
//!
//! 展示如何启动 SDK 并观察计数变化

use anju_notify_sdk::version::SDK_VERSION;
use anju_notify_sdk::{AnjuNotifyConfig, AnjuNotifySDK};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("\n🔔 联系通知计数演示 (SDK v{})\n", SDK_VERSION);
    println!("====================================\n");

    // 配置 SDK（指向本地后台服务）
    let config = AnjuNotifyConfig::builder()
        .base_url("http://127.0.0.1:8080/api")
        .poll_interval_secs(30)
        .connect_timeout_secs(10)
        .build();

    // 创建并启动
    println!("📦 正在启动通知 SDK...");
    let sdk = AnjuNotifySDK::new(config)?;
    sdk.start()?;
    println!("✅ SDK 已启动\n");

    // 订阅计数变更
    let mut rx = sdk.subscribe();
    let watcher = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let counters = *rx.borrow();
            println!(
                "📊 计数更新: new={}, recent={}, weekly={}",
                counters.new, counters.recent, counters.weekly
            );
        }
    });

    // 观察 60 秒
    sleep(Duration::from_secs(60)).await;

    let counters = sdk.counters();
    println!("\n【最终计数】");
    println!("   未读: {}", counters.new);
    println!("   24 小时内: {}", counters.recent);
    println!("   7 天内: {}", counters.weekly);
    println!("   推送通道: {}", sdk.push_state());

    // 停止
    sdk.stop().await;
    watcher.abort();
    println!("\n🛑 演示结束");
    Ok(())
}
