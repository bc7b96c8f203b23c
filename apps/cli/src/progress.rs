use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use vidscribe_core::{Progress, Stage};

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Terminal progress: one spinner per running stage, finished with a check
/// mark and the elapsed time.
#[derive(Default)]
pub struct CliProgress {
    active: Mutex<Option<(ProgressBar, Instant)>>,
}

impl CliProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn take(&self) -> Option<(ProgressBar, Instant)> {
        self.active.lock().ok().and_then(|mut active| active.take())
    }

    /// Print above the running spinner, if there is one.
    fn print(&self, line: String) {
        match self.active.lock() {
            Ok(active) => match active.as_ref() {
                Some((pb, _)) => pb.suspend(|| eprintln!("{}", line)),
                None => eprintln!("{}", line),
            },
            Err(_) => eprintln!("{}", line),
        }
    }
}

impl Progress for CliProgress {
    fn stage_started(&self, stage: Stage) {
        let spinner = create_spinner(stage.activity());
        if let Ok(mut active) = self.active.lock() {
            if let Some((previous, _)) = active.replace((spinner, Instant::now())) {
                previous.finish_and_clear();
            }
        }
    }

    fn stage_finished(&self, _stage: Stage, detail: &str) {
        let line = |elapsed: Duration| {
            format!(
                "{} {} {}",
                style("✓").green().bold(),
                detail,
                style(format!("[{}]", format_duration(elapsed))).dim()
            )
        };
        match self.take() {
            Some((pb, started)) => pb.finish_with_message(line(started.elapsed())),
            None => println!("{}", line(Duration::ZERO)),
        }
    }

    fn stage_failed(&self, _stage: Stage, message: &str) {
        let line = format!("{} {}", style("✗").red().bold(), message);
        match self.take() {
            Some((pb, _)) => pb.finish_with_message(line),
            None => eprintln!("{}", line),
        }
    }

    fn warning(&self, _stage: Stage, message: &str) {
        self.print(format!("{} {}", style("⚠").yellow().bold(), style(message).yellow()));
    }

    fn info(&self, message: &str) {
        self.print(format!("{} {}", style("ℹ").blue().bold(), message));
    }
}
