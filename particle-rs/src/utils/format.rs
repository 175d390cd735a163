//! Formatting utilities

use humansize::{DECIMAL, format_size};

/// Format file size in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// Format a float slice as a compact vector, e.g. `[0, 1.5, -2]`
pub fn format_floats(values: &[f32]) -> String {
    let parts: Vec<String> = values.iter().map(|value| format!("{value}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1024), "1.02 kB");
        assert_eq!(format_bytes(1048576), "1.05 MB");
    }

    #[test]
    fn test_format_floats() {
        assert_eq!(format_floats(&[]), "[]");
        assert_eq!(format_floats(&[0.0, 1.5, -2.0]), "[0, 1.5, -2]");
    }
}
