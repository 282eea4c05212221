//! Progress indicators using indicatif

use hitch_engine::HookDefinition;
use hitch_engine::hooks::{HookReport, RunObserver};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indeterminate operations
///
/// Drawn on stderr; hidden when `visible` is false.
pub fn create_spinner(message: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Shows which hook is running while reports are held back for ordered output
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    /// Progress over `total` hooks; hidden when `visible` is false
    pub fn new(total: usize, visible: bool) -> Self {
        let bar = ProgressBar::with_draw_target(
            Some(total as u64),
            if visible {
                ProgressDrawTarget::stderr()
            } else {
                ProgressDrawTarget::hidden()
            },
        );
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner} [{pos}/{len}] {msg}")
        {
            bar.set_style(style);
        }
        if visible {
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        Self { bar }
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl RunObserver for ProgressObserver {
    fn hook_started(&self, hook: &HookDefinition) {
        self.bar.set_message(hook.name.clone());
    }

    fn hook_finished(&self, _report: &HookReport) {
        self.bar.inc(1);
    }
}
