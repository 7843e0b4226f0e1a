/// Unit suffixes for [`human_readable_size`], in 1024 steps.
const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Formats a byte count for display, e.g. `"512 B"`, `"1.5 KB"`, `"3.2 GB"`.
///
/// Byte values below one kilobyte are printed exactly; larger values use one
/// decimal place and binary (1024) multiples.
pub fn human_readable_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_exact() {
        assert_eq!(human_readable_size(0), "0 B");
        assert_eq!(human_readable_size(1023), "1023 B");
    }

    #[test]
    fn kilobytes_and_up() {
        assert_eq!(human_readable_size(1024), "1.0 KB");
        assert_eq!(human_readable_size(1536), "1.5 KB");
        assert_eq!(human_readable_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(human_readable_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn caps_at_largest_unit() {
        let s = human_readable_size(u64::MAX);
        assert!(s.ends_with(" PB"), "got {s}");
    }
}
