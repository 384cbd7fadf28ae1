use dcvgcmd::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

const SPINNER_TICK_MS: u64 = 80;

/// Running tallies of a flux run, rendered into the bar message.
#[derive(Debug, Default, Clone, PartialEq)]
struct RunTally {
    mc_bursts: u64,
    mc_attempted: u64,
    mc_accepted: u64,
    md_steps: u64,
    molecules: usize,
    net_exchange: i64,
}

impl RunTally {
    fn acceptance(&self) -> f64 {
        if self.mc_attempted == 0 {
            0.0
        } else {
            100.0 * self.mc_accepted as f64 / self.mc_attempted as f64
        }
    }

    fn status(&self) -> String {
        format!(
            "MC {} ({:.0}% acc) | MD {} | N={} net={:+}",
            self.mc_bursts,
            self.acceptance(),
            self.md_steps,
            self.molecules,
            self.net_exchange
        )
    }
}

struct RunDisplay {
    pb: ProgressBar,
    tally: RunTally,
    // The next step increment closes an MC burst rather than an MD step.
    burst_pending: bool,
}

impl RunDisplay {
    fn apply(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                self.pb.reset();
                self.pb.set_length(0);
                self.pb.set_style(spinner_style());
                self.pb
                    .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                self.pb.set_message(name);
            }
            Progress::PhaseFinish => {
                self.pb.disable_steady_tick();
                self.pb.finish_with_message("✓ Done");
            }
            Progress::TaskStart { total_steps } => {
                self.tally = RunTally::default();
                self.burst_pending = false;
                self.pb.disable_steady_tick();
                self.pb.reset();
                self.pb.set_length(total_steps);
                self.pb.set_style(bar_style());
                self.pb.set_message(self.tally.status());
            }
            Progress::McBurst {
                attempted,
                accepted,
            } => {
                self.tally.mc_bursts += 1;
                self.tally.mc_attempted += attempted as u64;
                self.tally.mc_accepted += accepted as u64;
                self.burst_pending = true;
            }
            Progress::TaskIncrement => {
                if !std::mem::take(&mut self.burst_pending) {
                    self.tally.md_steps += 1;
                }
                self.pb.inc(1);
                self.pb.set_message(self.tally.status());
            }
            Progress::TaskFinish => {
                if let Some(len) = self.pb.length() {
                    self.pb.set_position(len);
                }
                self.pb.finish_with_message(self.tally.status());
            }
            Progress::Snapshot {
                step,
                time,
                molecules,
                net_exchange,
            } => {
                self.tally.molecules = molecules;
                self.tally.net_exchange = net_exchange;
                info!(step, time, molecules, net_exchange, "Snapshot.");
                self.pb.set_message(self.tally.status());
            }
            Progress::Message(msg) => {
                if self.pb.is_finished() {
                    self.pb.set_message(msg);
                } else {
                    self.pb.println(format!("  {msg}"));
                }
            }
        }
    }
}

/// Renders a flux run's progress events on stderr.
#[derive(Clone)]
pub struct CliProgressHandler {
    display: Arc<Mutex<RunDisplay>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr())
            .with_style(spinner_style());
        pb.finish_and_clear();

        Self {
            display: Arc::new(Mutex::new(RunDisplay {
                pb,
                tally: RunTally::default(),
                burst_pending: false,
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let display = self.display.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut display) = display.lock() else {
                warn!("Progress display mutex was poisoned. Cannot update progress.");
                return;
            };
            display.apply(progress);
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .expect("Failed to create spinner style template")
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{bar:30.cyan/blue}] {pos}/{len} steps ({per_sec}, ETA {eta}) {msg}",
    )
    .expect("Failed to create bar style template")
    .progress_chars("##-")
}
