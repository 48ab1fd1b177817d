use indicatif::{ProgressBar, ProgressStyle};
use reelup_upload::{ProgressReporter, UploadProgress};

const BAR_STYLE: &str =
    "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}) {msg}";

const BAR_CHARS: &str = "█▓▒░  ";

/// Terminal progress bar fed by upload progress snapshots.
pub struct BarReporter {
    pb: ProgressBar,
}

impl BarReporter {
    pub fn new(total_bytes: u64) -> Self {
        let pb = ProgressBar::new(total_bytes);
        if let Ok(style) = ProgressStyle::with_template(BAR_STYLE) {
            pb.set_style(style.progress_chars(BAR_CHARS));
        }
        Self { pb }
    }

    pub fn finish(&self, message: String) {
        self.pb.finish_with_message(message);
    }

    pub fn abandon(&self) {
        self.pb.abandon();
    }
}

impl ProgressReporter for BarReporter {
    fn report(&self, progress: &UploadProgress) {
        self.pb.set_length(progress.total_bytes);
        self.pb.set_position(progress.bytes_uploaded);
        self.pb.set_message(status_line(progress));
    }
}

fn status_line(progress: &UploadProgress) -> String {
    let chunks = format!("chunk {}/{}", progress.chunks_uploaded, progress.total_chunks);
    match progress.estimated_time_remaining_seconds {
        Some(eta) => format!("{chunks}, {} left", format_eta(eta)),
        None => chunks,
    }
}

pub fn format_eta(seconds: u64) -> String {
    match seconds {
        0..60 => format!("{seconds}s"),
        60..3600 => format!("{}m {:02}s", seconds / 60, seconds % 60),
        _ => format!("{}h {:02}m", seconds / 3600, seconds % 3600 / 60),
    }
}
