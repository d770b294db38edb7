//! Terminal progress rendering for the `hazard_scan` binary.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use hazard_scan::pipeline::Progress;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    /// `disable_pretty` only affects `auto`; an explicit `pretty` still draws
    /// bars whenever stderr is a terminal.
    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Reporter fed by pipeline progress callbacks. The frame total is taken
    /// from the first update, since it is only known once the source is open.
    pub fn frames(&self) -> FrameProgress {
        if !self.use_pretty() {
            return FrameProgress { bar: None };
        }
        let bar = ProgressBar::new(0);
        bar.set_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template("{bar:40} {pos}/{len} frames ({percent}%)")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        FrameProgress { bar: Some(bar) }
    }
}

/// Cloneable so it can move into a `Send` progress callback.
#[derive(Clone)]
pub struct FrameProgress {
    bar: Option<ProgressBar>,
}

impl FrameProgress {
    pub fn update(&self, progress: Progress) {
        match (&self.bar, progress.percent()) {
            (Some(bar), _) => {
                if progress.total_frames > 0 {
                    bar.set_length(progress.total_frames);
                }
                bar.set_position(progress.frames_read);
            }
            (None, Some(percent)) => eprintln!(
                "    {:.1}% ({}/{} frames)",
                percent, progress.frames_read, progress.total_frames
            ),
            (None, None) => eprintln!("    {} frames", progress.frames_read),
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_never_draws_bars() {
        let ui = Ui::from_args(Some("plain"), true, false);
        assert!(!ui.use_pretty());
        assert!(ui.frames().bar.is_none());
        assert!(!Ui::from_args(Some("pretty"), false, false).use_pretty());
        assert!(Ui::from_args(None, true, false).use_pretty());
    }

    #[test]
    fn redirected_stdout_only_quiets_auto_mode() {
        assert!(!Ui::from_args(Some("auto"), true, true).use_pretty());
        assert!(Ui::from_args(Some("pretty"), true, true).use_pretty());
        assert!(Ui::new(UiMode::Pretty, true, true).frames().bar.is_some());
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
