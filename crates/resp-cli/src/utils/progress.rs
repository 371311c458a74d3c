use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use respfit::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// Renders engine progress events as an indicatif spinner or bar on stderr.
#[derive(Clone)]
pub struct CliProgressHandler {
    bar: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0)
            .with_style(Self::spinner_style())
            .with_message("Initializing...");
        bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        bar.disable_steady_tick();
        bar.finish_and_clear();

        Self {
            bar: Arc::new(Mutex::new(bar)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let bar = self.bar.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut guard) = bar.lock() else {
                warn!("Progress bar mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::StageStart { name } => {
                    guard.reset();
                    guard.set_length(0);
                    guard.set_style(Self::spinner_style());
                    guard.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    guard.set_message(name.to_string());
                }
                Progress::StageFinish => {
                    guard.disable_steady_tick();
                    guard.finish_with_message("✓ Done");
                }
                Progress::TaskStart { total_steps } => {
                    guard.disable_steady_tick();
                    guard.reset();
                    guard.set_length(total_steps);
                    guard.set_position(0);
                    guard.set_style(Self::bar_style());
                }
                Progress::TaskIncrement => {
                    guard.inc(1);
                }
                Progress::TaskFinish => {
                    if guard.position() < guard.length().unwrap_or(0) {
                        guard.set_position(guard.length().unwrap_or(0));
                    }
                    guard.finish();
                }
                Progress::Message(msg) => {
                    if !guard.is_finished() {
                        guard.println(format!("  {}", msg));
                    } else {
                        guard.set_message(msg);
                    }
                }
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .expect("Failed to create spinner style template")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<20} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("Failed to create bar style template")
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    write!(w, "{:.1}s", state.eta().as_secs_f64()).unwrap()
                },
            )
            .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
