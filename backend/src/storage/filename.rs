pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

const WINDOWS_DEVICE_FILES: [&str; 23] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9", "CONIN$",
];

/// Lower-cased text after the last dot, if it is one of the accepted image types.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Reduces a client supplied name to something safe to join onto the upload
/// directory. May return an empty string.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let cleaned = kept.trim_matches(|c| c == '.' || c == '_');

    let stem = cleaned.split('.').next().unwrap_or_default();
    if !cleaned.is_empty() && WINDOWS_DEVICE_FILES.contains(&stem.to_ascii_uppercase().as_str()) {
        return format!("_{cleaned}");
    }
    cleaned.to_string()
}
