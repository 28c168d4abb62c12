//! Upload safety validation for blocking executables and dangerous file
//! types before classification.
//!
//! Two layers: magic byte detection for compiled binaries, then an
//! extension blocklist.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Magic byte signatures for executable files
pub const MAGIC_SIGNATURES: &[(&str, &[u8])] = &[
    ("Windows PE/MZ", &[0x4D, 0x5A]),           // MZ header
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),         // Linux ELF
    ("Mach-O 32", &[0xFE, 0xED, 0xFA, 0xCE]),   // macOS 32-bit
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),   // macOS 64-bit
    ("Mach-O Fat", &[0xCA, 0xFE, 0xBA, 0xBE]),  // Universal binary (also Java)
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]), // WASM
];

/// Blocked file extensions (case-insensitive)
static BLOCKED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Windows executables
        "exe", "dll", "scr", "pif", "com", "msi", "msp", "mst",
        // Unix executables (compiled binaries only — text scripts are allowed)
        "so", "dylib", "out", // Java/JVM
        "jar", "war", "ear", "class", // Packages
        "deb", "rpm", "apk", "app", "dmg", "pkg", // Office macros
        "xlsm", "xlsb", "xltm", "docm", "dotm", "pptm", "potm", "ppam",
        // Other dangerous
        "reg", "inf", "scf", "lnk", "url", "hta",
    ]
    .into_iter()
    .collect()
});

/// Result of upload safety validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub allowed: bool,
    pub block_reason: Option<String>,
    pub detected_type: Option<String>,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            block_reason: None,
            detected_type: None,
        }
    }

    pub fn blocked(reason: impl Into<String>, detected: impl Into<String>) -> Self {
        Self {
            allowed: false,
            block_reason: Some(reason.into()),
            detected_type: Some(detected.into()),
        }
    }
}

/// Validate that an upload is not executable content. Size limits are
/// enforced separately by the orchestrator.
pub fn validate_upload(filename: &str, data: &[u8]) -> ValidationResult {
    // Check extension blocklist
    if let Some(ext) = filename.rsplit('.').next() {
        if BLOCKED_EXTENSIONS.contains(ext.to_lowercase().as_str()) {
            return ValidationResult::blocked(
                format!("File extension .{} is not allowed", ext),
                format!("blocked_extension:{}", ext),
            );
        }
    }

    // Check magic bytes
    for (name, magic) in MAGIC_SIGNATURES {
        if data.len() >= magic.len() && &data[..magic.len()] == *magic {
            // CA FE BA BE could be Java or Mach-O Fat
            if magic == &[0xCA, 0xFE, 0xBA, 0xBE] {
                return ValidationResult::blocked(
                    "Java class files and Mach-O binaries are not allowed",
                    "java_or_macho",
                );
            }

            return ValidationResult::blocked(
                format!("Executable file detected: {}", name),
                format!("executable:{}", name.to_lowercase().replace(' ', "_")),
            );
        }
    }

    ValidationResult::allowed()
}
