//! Download progress formatting.

/// Human readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Status text for a download: a percentage when the total is known,
/// otherwise just the bytes received so far.
pub fn format_download_progress(current: u64, total: Option<u64>) -> String {
    match total.filter(|&t| t > 0) {
        Some(total) => {
            let percent = (current.min(total) * 100) / total;
            format!(
                "{percent:>3}% ({} / {})",
                format_size(current),
                format_size(total)
            )
        }
        None => format!("{} received", format_size(current)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn test_progress_with_total() {
        let result = format_download_progress(512, Some(1024));
        assert!(result.starts_with(" 50%"));

        let result = format_download_progress(1024, Some(1024));
        assert!(result.starts_with("100%"));
    }

    #[test]
    fn test_progress_without_total() {
        assert_eq!(format_download_progress(2048, None), "2.0 KiB received");
        assert_eq!(format_download_progress(10, Some(0)), "10 B received");
    }
}
