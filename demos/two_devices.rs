// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Two-device read-sync walkthrough.
//!
//! Demonstrates:
//! 1. A phone persisting reads to SQLite and flushing at the batch threshold
//! 2. A TV box pulling everything on its first sync
//! 3. A later read on the TV winning on the phone
//! 4. Displaying metrics
//!
//! # Run
//!
//! ```bash
//! RUST_LOG=read_sync_engine=debug cargo run --example two_devices
//! ```

use std::sync::Arc;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use tracing_subscriber::EnvFilter;

use read_sync_engine::{
    DeviceClass, InMemoryLocalStore, InMemoryRemoteStore, InMemoryWatermarkStore, ReadSyncEngine,
    StaticIdentity, SyncConfig, SystemClock,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let clock = Arc::new(SystemClock);
    let identity = Arc::new(StaticIdentity::signed_in("demo-user"));
    let phone_config = SyncConfig::default();
    let remote = Arc::new(InMemoryRemoteStore::from_config(&phone_config, identity, clock.clone()));
    let dir = tempfile::tempdir()?;

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Phone: durable SQLite store, reads flushed in batches of 10
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📱 Phone reading 12 articles...");
    let phone = ReadSyncEngine::open_sqlite(
        phone_config,
        dir.path().join("phone.db"),
        remote.clone(),
        clock.clone(),
    )
    .await?;
    phone.recover_pending_items().await?;

    for i in 1..=12 {
        if let Some(outcome) = phone.mark_as_read(&format!("article-{i}")).await? {
            println!("   └─ article-{i} triggered a flush: {outcome:?}");
        }
    }
    println!("   └─ Still pending locally: {}", phone.pending_count().await?);
    println!("   └─ Going to background: {:?}", phone.force_flush().await);

    // ─────────────────────────────────────────────────────────────────────────
    // 2. TV box: first sync pulls everything
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📺 TV box syncing for the first time...");
    let tv_config = SyncConfig { device_class: DeviceClass::Box, ..Default::default() };
    let tv = ReadSyncEngine::new(
        tv_config,
        Arc::new(InMemoryLocalStore::new()),
        remote.clone(),
        Arc::new(InMemoryWatermarkStore::new()),
        clock.clone(),
    )?;
    let report = tv.perform_full_sync_with_retry().await?;
    println!(
        "   └─ Downloaded {} (inserted {}), watermark {}",
        report.downloaded, report.merged.inserted, report.watermark.last_download_since
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 3. A read on the TV reaches the phone
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔁 TV reads article-99, phone syncs...");
    tv.mark_as_read("article-99").await?;
    tv.force_flush().await;
    let report = phone.perform_full_sync_with_retry().await?;
    println!(
        "   └─ Phone merged: inserted {}, overwritten {}, kept {}",
        report.merged.inserted, report.merged.overwritten, report.merged.kept_local
    );
    println!("   └─ Phone has article-99: {}", phone.is_read("article-99").await?);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        let rendered = match value {
            DebugValue::Counter(v) => v.to_string(),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={} sum={:.4}", samples.len(), sum)
            }
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }

    lines.sort();
    for line in lines {
        println!("   └─ {line}");
    }
}
