use reelup_types::VideoContainer;
use reelup_types::limits::{MAX_DURATION_SECONDS, MAX_FILE_SIZE, MIB, MIN_DURATION_SECONDS};

/// Pre-flight rejection. The message is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Video file too large. Please upload a file under 500MB. Current file: {}MB", rounded_mib(.size))]
    Oversize { size: u64 },

    #[error("Unsupported format. Please upload MP4, MOV, or WebM. Detected format: {}", detected_or_unknown(.detected))]
    UnsupportedFormat { detected: String },

    #[error("Video must be between 1 and 3 minutes. Current duration: {}", describe_duration(.seconds))]
    DurationOutOfRange { seconds: u32 },
}

/// Checks size, container type and duration, in that order. First failure wins.
///
/// Pure: nothing here touches the file or the network.
pub fn validate(size: u64, content_type: &str, duration_seconds: u32) -> Result<(), ValidationError> {
    if size > MAX_FILE_SIZE {
        return Err(ValidationError::Oversize { size });
    }

    if VideoContainer::from_mime(content_type).is_none() {
        return Err(ValidationError::UnsupportedFormat {
            detected: content_type.to_string(),
        });
    }

    if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&duration_seconds) {
        return Err(ValidationError::DurationOutOfRange {
            seconds: duration_seconds,
        });
    }

    Ok(())
}

fn rounded_mib(size: &u64) -> u64 {
    (size + MIB / 2) / MIB
}

fn detected_or_unknown(detected: &str) -> &str {
    if detected.is_empty() { "unknown" } else { detected }
}

fn describe_duration(seconds: &u32) -> String {
    let seconds = *seconds;
    if seconds < MIN_DURATION_SECONDS {
        format!("{seconds} seconds")
    } else {
        format!("{} minutes", (seconds + 30) / 60)
    }
}
