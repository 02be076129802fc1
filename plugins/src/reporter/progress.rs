use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use autocheck_core::executor::ProgressKey;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bars created by actions, drawn above the status log.
///
/// When disabled (output is not a terminal) bars are hidden and log lines go
/// straight to stdout.
pub struct ProgressBars {
    multi: MultiProgress,
    bars: Mutex<HashMap<ProgressKey, ProgressBar>>,
    next_key: AtomicU64,
    enabled: bool,
    ascii: bool,
}

impl ProgressBars {
    pub fn new(enabled: bool, ascii: bool) -> Self {
        let multi = if enabled {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            next_key: AtomicU64::new(1),
            enabled,
            ascii,
        }
    }

    fn style(&self) -> ProgressStyle {
        let chars = if self.ascii { "#>-" } else { "█▓▒░  " };
        ProgressStyle::with_template("  {prefix} {bar:30.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars(chars)
    }

    pub fn create(&self, task: &str, label: &str, max: f64, unit: &str) -> ProgressKey {
        let key = ProgressKey(self.next_key.fetch_add(1, Ordering::Relaxed));
        let bar = if self.enabled {
            self.multi.add(ProgressBar::new(max.max(0.0) as u64))
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(self.style());
        bar.set_prefix(format!("{task}: {label}"));
        bar.set_message(unit.to_string());

        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(key, bar);
        }
        key
    }

    pub fn update(&self, key: ProgressKey, current: f64) {
        if let Ok(bars) = self.bars.lock() {
            if let Some(bar) = bars.get(&key) {
                bar.set_position(current.max(0.0) as u64);
            }
        }
    }

    pub fn delete(&self, key: ProgressKey) {
        let bar = self.bars.lock().ok().and_then(|mut bars| bars.remove(&key));
        if let Some(bar) = bar {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }

    /// Print a line without tearing any bar currently drawn.
    pub fn println(&self, line: &str) {
        if self.enabled && self.multi.println(line).is_ok() {
            return;
        }
        println!("{line}");
    }

    /// Hide bars while a prompt owns the terminal.
    pub fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        self.multi.suspend(f)
    }

    pub fn active(&self) -> usize {
        self.bars.lock().map(|b| b.len()).unwrap_or(0)
    }
}

impl Drop for ProgressBars {
    fn drop(&mut self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, bar) in bars.drain() {
                bar.finish_and_clear();
            }
        }
    }
}
