use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

/// Stage and per-stream progress reporting on stderr.
#[derive(Clone, Debug)]
pub struct Ui {
    pretty: bool,
    bars: MultiProgress,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let pretty = is_tty
            && match mode {
                UiMode::Pretty => true,
                UiMode::Auto => std::env::var_os("NO_COLOR").is_none(),
                UiMode::Plain => false,
            };
        let bars = MultiProgress::with_draw_target(if pretty {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        });
        Self { pretty, bars }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        Self::new(UiMode::parse(ui_flag), is_tty)
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty {
            let spinner = self.bars.add(ProgressBar::new_spinner());
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

    /// Frame counter for one stream. Silent in plain mode.
    pub fn stream(&self, name: &str) -> StreamProgress {
        let bar = self.pretty.then(|| {
            let bar = self.bars.add(ProgressBar::new_spinner());
            let style = ProgressStyle::with_template("{spinner} {prefix}: {pos} frames, {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.set_prefix(name.to_string());
            bar.set_message("0 alerts");
            bar
        });
        StreamProgress { bar, alerts: 0 }
    }
}

pub struct StreamProgress {
    bar: Option<ProgressBar>,
    alerts: u64,
}

impl StreamProgress {
    pub fn frame(&mut self, alerts: usize) {
        self.alerts += alerts as u64;
        if let Some(bar) = &self.bar {
            bar.inc(1);
            bar.set_message(format!("{} alerts", self.alerts));
        }
    }
}

impl Drop for StreamProgress {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            bar.finish();
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
