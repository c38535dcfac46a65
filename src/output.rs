use std::io::{self, Write};

use serde::Serialize;

use crate::transfer::{Progress, ProgressObserver};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressObserver for JsonOutput {
    fn progress(&self, _progress: Progress) {}
}

const BAR_WIDTH: usize = 50;

/// Draws an in-place progress bar on stderr. Falls back to a plain byte
/// counter when the total size is unknown.
pub struct ConsoleProgress;

impl ProgressObserver for ConsoleProgress {
    fn progress(&self, progress: Progress) {
        let mut stderr = io::stderr();
        let elapsed = progress.elapsed.as_secs_f64();
        let speed = if elapsed > 0.0 {
            progress.bytes_transferred as f64 / elapsed
        } else {
            0.0
        };

        match progress.total_bytes {
            Some(total) if total > 0 => {
                let done = progress.bytes_transferred.min(total);
                let percentage = done as f64 / total as f64 * 100.0;
                let filled = (BAR_WIDTH as u64 * done / total) as usize;
                let bar: String = "#".repeat(filled) + &"-".repeat(BAR_WIDTH - filled);
                let eta = if speed > 0.0 && done < total {
                    format!("ETA: {:.1}s", (total - done) as f64 / speed)
                } else {
                    "done".to_string()
                };
                let _ = write!(
                    stderr,
                    "\r[{bar}] {percentage:5.1}% | {:.1}MB/{:.1}MB | {:.1}MB/s | {eta}",
                    mb(done),
                    mb(total),
                    mb(speed as u64),
                );
            }
            _ => {
                let _ = write!(
                    stderr,
                    "\r{:.1}MB | {:.1}MB/s",
                    mb(progress.bytes_transferred),
                    mb(speed as u64),
                );
            }
        }
        let _ = stderr.flush();
    }
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
