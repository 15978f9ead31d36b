use crate::models::BYTES_PER_MB;

const PDF_MAGIC: &[u8] = b"%PDF-";

pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.len() >= PDF_MAGIC.len() && bytes.starts_with(PDF_MAGIC)
}

/// Best-effort format name from magic bytes, used when the decoder cannot
/// name the container.
pub fn detect_format_from_bytes(bytes: &[u8]) -> &'static str {
    if bytes.len() < 8 {
        return "unknown";
    }

    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return "png";
    }

    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "jpeg";
    }

    if bytes.len() > 12
        && bytes[0..4] == [0x52, 0x49, 0x46, 0x46]
        && bytes[8..12] == [0x57, 0x45, 0x42, 0x50]
    {
        return "webp";
    }

    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return "gif";
    }

    if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        return "tiff";
    }

    if bytes.len() > 12 && &bytes[4..8] == b"ftyp" && (&bytes[8..12] == b"avif" || &bytes[8..12] == b"avis") {
        return "avif";
    }

    "unknown"
}

/// Megabytes with two decimals, as sent in the enhancer's size headers.
pub fn format_megabytes(bytes: usize) -> String {
    format!("{:.2}", bytes as f64 / BYTES_PER_MB as f64)
}

pub fn format_file_size(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log(THRESHOLD) as usize).min(UNITS.len() - 1);
    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    format!("{:.2} {}", size, UNITS[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_magic() {
        assert!(is_pdf(b"%PDF-1.7\n..."));
        assert!(!is_pdf(b"%PD"));
        assert!(!is_pdf(b"PK\x03\x04"));
    }

    #[test]
    fn magic_byte_detection() {
        assert_eq!(detect_format_from_bytes(b"GIF89a\0\0\0\0"), "gif");
        assert_eq!(detect_format_from_bytes(b"II*\0\x08\0\0\0"), "tiff");
        assert_eq!(
            detect_format_from_bytes(b"\0\0\0\x1cftypavif\0\0\0\0"),
            "avif"
        );
        assert_eq!(detect_format_from_bytes(b"short"), "unknown");
    }

    #[test]
    fn megabytes_two_decimals() {
        assert_eq!(format_megabytes(BYTES_PER_MB * 10), "10.00");
        assert_eq!(format_megabytes(1_572_864), "1.50");
    }

    #[test]
    fn human_file_sizes() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(2_097_152), "2.00 MB");
    }
}
