//! Bridge metrics
//!
//! Prometheus-facing recorders plus an in-memory aggregator that summarises
//! a run from its `TickReport`s.

use contracts::{LidarOutcome, TickReport};
use metrics::{counter, gauge, histogram};

/// Record one main-loop tick
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_tick_metrics;
///
/// let report = poll_loop.tick().await?;
/// record_tick_metrics(&report);
/// ```
pub fn record_tick_metrics(report: &TickReport) {
    counter!("airsim_bridge_ticks_total").increment(1);
    gauge!("airsim_bridge_last_tick").set(report.tick as f64);
    histogram!("airsim_bridge_tick_duration_ms").record(report.duration_ms);

    if report.image_subtick {
        counter!("airsim_bridge_image_subticks_total").increment(1);
        histogram!("airsim_bridge_images_per_subtick").record(report.images_published as f64);
    }

    if let Some(outcome) = report.lidar {
        counter!("airsim_bridge_lidar_frames_total", "outcome" => outcome.label()).increment(1);
        if let LidarOutcome::Published { points } = outcome {
            histogram!("airsim_bridge_lidar_points").record(points as f64);
        }
    }
}

/// Record one message handed to the bus
pub fn record_message_published(topic: &str, kind: &'static str) {
    counter!(
        "airsim_bridge_messages_published_total",
        "topic" => topic.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// Record one simulator client call
pub fn record_client_call(method: &'static str, latency_ms: f64, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "airsim_bridge_client_calls_total",
        "method" => method,
        "status" => status
    )
    .increment(1);
    histogram!("airsim_bridge_client_call_ms", "method" => method).record(latency_ms);
}

/// Record one velocity command applied to the vehicle
pub fn record_command_relayed(reverse: bool) {
    let gear = if reverse { "reverse" } else { "auto" };
    counter!("airsim_bridge_commands_relayed_total", "gear" => gear).increment(1);
}

/// Record one pose override turned into a transform
pub fn record_transform_relayed() {
    counter!("airsim_bridge_transforms_relayed_total").increment(1);
}

/// Publish a sink's running totals
pub fn record_sink_totals(sink_name: &str, written: u64, failed: u64, dropped: u64) {
    let sink = sink_name.to_string();
    gauge!("airsim_bridge_sink_written", "sink" => sink.clone()).set(written as f64);
    gauge!("airsim_bridge_sink_failed", "sink" => sink.clone()).set(failed as f64);
    gauge!("airsim_bridge_sink_dropped", "sink" => sink).set(dropped as f64);
}

/// In-memory run statistics built from tick reports
#[derive(Debug, Clone, Default)]
pub struct BridgeMetricsAggregator {
    pub ticks: u64,
    pub image_subticks: u64,
    pub images_published: u64,
    pub lidar_published: u64,
    pub lidar_duplicates: u64,
    pub lidar_empty: u64,
    pub imu_published: u64,
    pub poses_published: u64,

    /// Tick body duration (ms)
    pub tick_duration: RunningStats,

    /// Points per published LIDAR frame
    pub lidar_points: RunningStats,
}

impl BridgeMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.tick_duration.push(report.duration_ms);

        if report.image_subtick {
            self.image_subticks += 1;
            self.images_published += report.images_published as u64;
        }

        match report.lidar {
            Some(LidarOutcome::Published { points }) => {
                self.lidar_published += 1;
                self.lidar_points.push(points as f64);
            }
            Some(LidarOutcome::Duplicate) => self.lidar_duplicates += 1,
            Some(LidarOutcome::Empty) => self.lidar_empty += 1,
            None => {}
        }

        if report.imu_published {
            self.imu_published += 1;
        }
        if report.pose_published {
            self.poses_published += 1;
        }
    }

    pub fn summary(&self) -> BridgeMetricsSummary {
        let lidar_fetched = self.lidar_published + self.lidar_duplicates + self.lidar_empty;
        BridgeMetricsSummary {
            ticks: self.ticks,
            image_subticks: self.image_subticks,
            images_published: self.images_published,
            lidar_published: self.lidar_published,
            lidar_duplicate_rate: if lidar_fetched > 0 {
                self.lidar_duplicates as f64 / lidar_fetched as f64 * 100.0
            } else {
                0.0
            },
            imu_published: self.imu_published,
            poses_published: self.poses_published,
            tick_duration_ms: StatsSummary::from(&self.tick_duration),
            lidar_points: StatsSummary::from(&self.lidar_points),
        }
    }
}

/// Printable run summary
#[derive(Debug, Clone, Default)]
pub struct BridgeMetricsSummary {
    pub ticks: u64,
    pub image_subticks: u64,
    pub images_published: u64,
    pub lidar_published: u64,
    pub lidar_duplicate_rate: f64,
    pub imu_published: u64,
    pub poses_published: u64,
    pub tick_duration_ms: StatsSummary,
    pub lidar_points: StatsSummary,
}

impl std::fmt::Display for BridgeMetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Bridge Metrics Summary ===")?;
        writeln!(f, "Ticks: {}", self.ticks)?;
        writeln!(f, "Image sub-ticks: {}", self.image_subticks)?;
        writeln!(f, "Images published: {}", self.images_published)?;
        writeln!(
            f,
            "LIDAR frames published: {} (duplicates {:.2}%)",
            self.lidar_published, self.lidar_duplicate_rate
        )?;
        writeln!(f, "IMU samples published: {}", self.imu_published)?;
        writeln!(f, "Poses published: {}", self.poses_published)?;
        writeln!(f, "Tick duration (ms): {}", self.tick_duration_ms)?;
        writeln!(f, "LIDAR points: {}", self.lidar_points)?;
        Ok(())
    }
}

/// Summary of a `RunningStats`
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(tick: u64, subtick: bool, lidar: Option<LidarOutcome>) -> TickReport {
        TickReport {
            tick,
            image_subtick: subtick,
            images_published: if subtick { 3 } else { 0 },
            lidar,
            imu_published: true,
            pose_published: true,
            duration_ms: tick as f64,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = BridgeMetricsAggregator::new();
        aggregator.update(&report(1, false, None));
        aggregator.update(&report(2, true, Some(LidarOutcome::Published { points: 100 })));
        aggregator.update(&report(3, false, None));
        aggregator.update(&report(4, true, Some(LidarOutcome::Duplicate)));

        assert_eq!(aggregator.ticks, 4);
        assert_eq!(aggregator.image_subticks, 2);
        assert_eq!(aggregator.images_published, 6);
        assert_eq!(aggregator.lidar_published, 1);
        assert_eq!(aggregator.lidar_duplicates, 1);
        assert_eq!(aggregator.imu_published, 4);

        let summary = aggregator.summary();
        assert!((summary.lidar_duplicate_rate - 50.0).abs() < 1e-10);
        assert!((summary.tick_duration_ms.mean - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = BridgeMetricsAggregator::new();
        aggregator.update(&report(1, true, Some(LidarOutcome::Empty)));

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Ticks: 1"));
        assert!(output.contains("duplicates 0.00%"));
        assert!(output.contains("LIDAR points: N/A"));
    }
}
