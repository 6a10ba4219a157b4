use std::time::Duration;

/// Converts bytes to human-readable file size format
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Smoothed throughput for the transfer bar; `None` renders as unknown.
pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{}/s", format_file_size(r as u64)),
        None => "--/s".to_string(),
    }
}

/// Remaining-time estimate, `--:--` while unknown.
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(d) => {
            let secs = d.as_secs();
            if secs >= 3600 {
                format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
            } else {
                format!("{}:{:02}", secs / 60, secs % 60)
            }
        }
        None => "--:--".to_string(),
    }
}

/// Truncates filename to max length with ellipsis
pub fn truncate_filename(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        name.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        format!("{}...", &name[..max_len - 3])
    }
}
