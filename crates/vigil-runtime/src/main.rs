// Copyright 2025 eraflo
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

//! Runs the quality engine against a synthetic scene on simulated time.

mod config;
mod scene;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use vigil_control::{QualityEngine, QualityEvent};
use vigil_core::memory::{ResourceHandle, ResourceId, BYTES_PER_MB};
use vigil_core::platform::BatteryStatus;
use vigil_core::telemetry::ResourceMonitor;
use vigil_core::{Clock, ManualClock};
use vigil_infra::{ProcessMemoryMonitor, SysfsBatterySource, SysinfoCapabilitySource};

use crate::scene::{SyntheticScene, Workload};

/// Simulated render loop driving the adaptive quality engine.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// JSON engine configuration; defaults apply to omitted values.
    config: Option<PathBuf>,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 4_000)]
    frames: u64,

    /// Number of renderables in the synthetic scene.
    #[arg(long, default_value_t = 24)]
    objects: u64,

    /// Simulate a discharging battery starting at this level instead of
    /// reading the host battery.
    #[arg(long)]
    battery_start: Option<f32>,

    /// Query GPU limits through a wgpu adapter.
    #[arg(long)]
    gpu_probe: bool,
}

/// Battery drain of the simulated battery, per simulated second.
const SIMULATED_DRAIN_PER_SEC: f32 = 0.002;

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    let capabilities = if cli.gpu_probe {
        SysinfoCapabilitySource::new().with_gpu_probe(vigil_infra::WgpuGpuProbe::new())
    } else {
        SysinfoCapabilitySource::new()
    };

    let clock = ManualClock::new(0.0);
    let scene = SyntheticScene::new(cli.objects);

    let process_memory = Arc::new(ProcessMemoryMonitor::new("process_memory"));
    let mut builder = QualityEngine::builder()
        .config(config)
        .with_capability_source(capabilities)
        .with_memory_monitor(process_memory.clone())
        .with_clock(Arc::new(clock.clone()))
        .with_scene(scene.clone());
    if cli.battery_start.is_none() {
        builder = builder.with_battery_source(SysfsBatterySource::new());
    }
    let (mut engine, events) = builder.build().context("Failed to build quality engine")?;

    register_scene_resources(&mut engine, cli.objects);

    let battery = engine.battery_notifier();
    let workload = Workload::default();

    for frame in 0..cli.frames {
        let budget = engine
            .current_budget()
            .cloned()
            .context("Engine has no active budget")?;
        let frame_ms = workload.frame_time_ms(&budget, frame);
        // A frame rate cap stretches short frames to the capped interval.
        let presented_ms = budget
            .frame_rate_cap
            .map_or(frame_ms, |fps| frame_ms.max(1000.0 / fps as f64));

        clock.advance(presented_ms);

        if let Some(start) = cli.battery_start {
            let elapsed_s = clock_seconds(&clock) as f32;
            let level = start - elapsed_s * SIMULATED_DRAIN_PER_SEC;
            battery.publish(BatteryStatus::new(level, false));
        }

        engine.on_frame(presented_ms);

        for event in events.try_iter() {
            log_event(&event);
        }
    }

    let snapshot = engine.get_metrics_snapshot();
    log::info!(
        "Finished {} frames in {:.1} simulated seconds: {} at {:.1} FPS (target {:.0}), {} budget pushes.",
        cli.frames,
        clock_seconds(&clock),
        snapshot.current_level,
        snapshot.ema_fps,
        snapshot.target_fps,
        scene.budgets_received()
    );
    log::info!("LOD bands in use: {:?}", scene.lod_histogram());
    let stats = engine.memory_stats();
    log::info!(
        "Memory guard: {} registered ({} pinned), {} evicted, {:.0} of {:.0} MB.",
        stats.registered,
        stats.pinned,
        stats.evicted_total,
        stats.usage_bytes as f64 / BYTES_PER_MB as f64,
        stats.budget_bytes as f64 / BYTES_PER_MB as f64
    );
    if let Some(peak_mb) = process_memory
        .get_usage_report()
        .and_then(|report| report.peak_mb())
    {
        log::info!("Process memory peaked at {peak_mb:.1} MB.");
    }
    for recommendation in engine.get_recommendations() {
        log::info!("Recommendation: {recommendation}");
    }

    engine.shutdown();
    Ok(())
}

fn clock_seconds(clock: &ManualClock) -> f64 {
    clock.now_ms() / 1000.0
}

/// Registers one buffer per particle system and one pinned texture per mesh.
fn register_scene_resources(engine: &mut QualityEngine, objects: u64) {
    for id in 0..objects {
        let handle = if id % 3 == 1 {
            ResourceHandle::new(ResourceId(id), 64 * BYTES_PER_MB, move || {
                log::debug!("Scene: Released particle buffer {id}.");
            })
        } else {
            ResourceHandle::pinned(ResourceId(id), 16 * BYTES_PER_MB, move || {
                log::debug!("Scene: Released texture {id}.");
            })
        };
        engine.register_resource(handle);
    }
}

fn log_event(event: &QualityEvent) {
    match event {
        QualityEvent::LevelChanged {
            from,
            to,
            cause,
            timestamp_ms,
        } => log::info!(
            "[{:>8.1}s] Quality {} -> {} ({:?}).",
            timestamp_ms / 1000.0,
            from,
            to,
            cause
        ),
        QualityEvent::BatteryCapChanged {
            active,
            timestamp_ms,
        } => log::info!(
            "[{:>8.1}s] Battery saver {}.",
            timestamp_ms / 1000.0,
            if *active { "engaged" } else { "released" }
        ),
        QualityEvent::ResourcesEvicted { ids, freed_bytes } => log::info!(
            "Evicted {} resource(s), {:.0} MB freed.",
            ids.len(),
            *freed_bytes as f64 / BYTES_PER_MB as f64
        ),
        QualityEvent::BudgetViolation {
            usage_bytes,
            budget_bytes,
        } => log::warn!(
            "Memory still over budget: {:.0} of {:.0} MB.",
            *usage_bytes as f64 / BYTES_PER_MB as f64,
            *budget_bytes as f64 / BYTES_PER_MB as f64
        ),
    }
}
