//! Download progress rendering

use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::fmt::Write;
use std::path::Path;
use std::sync::Mutex;

use ardlib_core::catalog::CatalogEntry;
use ardlib_core::fetcher::FetchObserver;

fn bytes_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {prefix:24!} [{elapsed_precise}] [{bar:24!.bright.yellow/dim.white}] {bytes:>8}/{total_bytes:8} @ {smoothed_bytes_per_sec:8}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
        .with_key(
            "smoothed_bytes_per_sec",
            |s: &ProgressState, w: &mut dyn Write| {
                let _ = match (s.pos(), s.elapsed().as_millis()) {
                    (pos, elapsed_ms) if elapsed_ms > 0 => write!(
                        w,
                        "{}/s",
                        HumanBytes((pos as f64 * 1000_f64 / elapsed_ms as f64) as u64)
                    ),
                    _ => write!(w, "-"),
                };
            },
        )
}

/// Renders archive downloads as a byte progress bar on stderr
///
/// Each download gets a fresh bar. Downloads whose size the server does not
/// announce are not drawn.
#[derive(Default)]
pub struct ProgressBarObserver {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressBarObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|bar| bar.clone())
    }
}

impl FetchObserver for ProgressBarObserver {
    fn started(&self, entry: &CatalogEntry, total_bytes: Option<u64>) {
        println!("Downloading {} v{}...", entry.name, entry.version);

        let bar = match total_bytes {
            Some(total) => {
                let bar = ProgressBar::with_draw_target(
                    Some(total),
                    ProgressDrawTarget::stderr_with_hz(20),
                );
                bar.set_style(bytes_style());
                bar.set_prefix(format!("{} {}", entry.name, entry.version));
                bar
            }
            None => ProgressBar::hidden(),
        };

        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn progressed(&self, written: u64, _total: u64) {
        if let Some(bar) = self.current() {
            bar.set_position(written);
        }
    }

    fn finished(&self, path: &Path) {
        if let Some(bar) = self.current() {
            bar.finish_and_clear();
        }
        tracing::debug!("Archive stored at {}", path.display());
    }

    fn failed(&self, entry: &CatalogEntry) {
        let bar = self.bar.lock().ok().and_then(|mut slot| slot.take());
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        tracing::debug!("Download of {} {} abandoned", entry.name, entry.version);
    }
}
