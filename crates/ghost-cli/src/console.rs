//! Terminal side of the human boundary
//!
//! Prints assistant text and tool-call banners, reads lines from stdin on
//! the blocking pool, and shows `indicatif` spinners when stdout is a
//! terminal.

use std::io::{IsTerminal, Write};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use ghost_core::{BootstrapProgress, GhostError, HumanConsole, Notice, Result};

const TICK: Duration = Duration::from_millis(120);
const BANNER_RULE: &str = "=======================";

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn new_spinner(message: &str, len: Option<u64>) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(len, ProgressDrawTarget::stdout());
    bar.set_style(spinner_style());
    bar.set_message(message.to_string());
    bar.enable_steady_tick(TICK);
    bar
}

/// Stdin/stdout console
pub struct TerminalConsole {
    interactive: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal(),
            spinner: Mutex::new(None),
        }
    }

    fn stop_spinner(&self) {
        if let Some(bar) = self.spinner.lock().ok().and_then(|mut s| s.take()) {
            bar.finish_and_clear();
        }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

/// Text shown for one notice
pub fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::Assistant(text) => text.clone(),
        Notice::ToolCallPending { name, arguments } => format!(
            "{}\n{BANNER_RULE}\nName: {name}\nArguments:\n{arguments}\n{BANNER_RULE}",
            "Confirm tool call:".magenta()
        ),
        Notice::ToolOutput(summary) => summary.dimmed().to_string(),
        Notice::Info(text) => text.cyan().to_string(),
    }
}

#[async_trait]
impl HumanConsole for TerminalConsole {
    fn show(&self, notice: Notice) {
        self.stop_spinner();
        println!("{}", render_notice(&notice));
    }

    async fn read_line(&self, prompt: &str) -> Result<String> {
        self.stop_spinner();
        print!("{prompt}");
        std::io::stdout()
            .flush()
            .map_err(|e| GhostError::HumanInput(e.to_string()))?;

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            // EOF leaves the line empty, which ends the session
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(|e| GhostError::HumanInput(e.to_string()))?
        .map_err(|e| GhostError::HumanInput(format!("error reading user input: {e}")))?;

        Ok(line.trim().to_string())
    }

    fn busy(&self, label: Option<&str>) {
        self.stop_spinner();
        if let (Some(label), true) = (label, self.interactive) {
            if let Ok(mut spinner) = self.spinner.lock() {
                *spinner = Some(new_spinner(label, None));
            }
        }
    }
}

/// Bootstrap progress as `Init MCPs [done/total]`
pub struct BootstrapSpinner {
    interactive: bool,
    state: Mutex<SpinnerState>,
}

#[derive(Default)]
struct SpinnerState {
    bar: Option<ProgressBar>,
    finished: usize,
    total: usize,
}

const BOOTSTRAP_LABEL: &str = "Init MCPs";

impl BootstrapSpinner {
    pub fn new() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal(),
            state: Mutex::new(SpinnerState::default()),
        }
    }

    /// Clear the bar; prints the final count
    pub fn finish(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if let Some(bar) = state.bar.take() {
            bar.finish_and_clear();
            println!(
                "{BOOTSTRAP_LABEL} [{}/{}] {}",
                state.finished,
                state.total,
                "done".green()
            );
        }
    }
}

impl Default for BootstrapSpinner {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapProgress for BootstrapSpinner {
    fn provider_started(&self, total: usize) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.total = total;
        if self.interactive {
            let bar = new_spinner(&format!("{BOOTSTRAP_LABEL} [0/{total}]"), Some(total as u64));
            state.bar = Some(bar);
        }
    }

    fn provider_finished(&self, name: &str, ok: bool) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.finished += 1;
        let progress = format!("{BOOTSTRAP_LABEL} [{}/{}]", state.finished, state.total);
        match &state.bar {
            Some(bar) => {
                bar.inc(1);
                bar.set_message(progress);
            }
            None => {
                let status = if ok { "ok".green() } else { "failed".red() };
                println!("{progress} {name} {status}");
            }
        }
    }
}
