//! Pipeline statistics.

use std::time::Duration;

use bridge::BridgeReport;
use dispatcher::DispatchSummary;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Poll loop and relay totals
    pub report: BridgeReport,

    /// Dispatcher totals (None if it failed to drain)
    pub dispatch: Option<DispatchSummary>,

    /// Number of sinks that received data
    pub active_sinks: usize,

    /// Total duration of the run
    pub duration: Duration,
}

impl PipelineStats {
    /// Main-loop ticks per second
    pub fn tick_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.report.poll.ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Bridge Statistics ===\n");

        println!("Overview");
        println!("   Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   Tick rate: {:.2} Hz", self.tick_rate());
        println!("   Active sinks: {}", self.active_sinks);

        println!("\n{}", self.report.poll.summary());

        if let Some(commands) = self.report.commands {
            println!(
                "Velocity commands: {} applied, {} ignored",
                commands.applied, commands.ignored
            );
        }
        if let Some(count) = self.report.transforms_relayed {
            println!("Pose overrides relayed: {count}");
        }

        if let Some(dispatch) = &self.dispatch {
            println!("\nDispatcher");
            println!("   Envelopes: {}", dispatch.envelopes);
            println!("   Lagged: {}", dispatch.lagged);
            for (sink, snapshot) in &dispatch.sinks {
                println!(
                    "   {}: written={} failed={} dropped={}",
                    sink, snapshot.write_count, snapshot.failure_count, snapshot.dropped_count
                );
            }
        }

        println!();
    }
}
