//! Editor language ids by file extension.

/// Returns the editor language id for `ext` (with or without leading dot).
///
/// Unknown extensions map to `"plaintext"`.
pub fn language_for(ext: &str) -> &'static str {
    let ext = ext.strip_prefix('.').unwrap_or(ext).to_ascii_lowercase();
    match ext.as_str() {
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "md" => "markdown",
        "py" => "python",
        "java" => "java",
        "c" => "c",
        "cpp" => "cpp",
        "cs" => "csharp",
        "go" => "go",
        "php" => "php",
        "rb" => "ruby",
        "rs" => "rust",
        "swift" => "swift",
        "sh" => "shell",
        "yaml" | "yml" => "yaml",
        "xml" => "xml",
        "sql" => "sql",
        _ => "plaintext",
    }
}
