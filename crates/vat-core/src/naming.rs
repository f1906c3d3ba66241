//! Folder names for projects.
//!
//! Project display names are free text; the folder a project lives in must be
//! valid on every filesystem the application runs on, Windows included.

pub const MAX_FOLDER_NAME_CHARS: usize = 100;
pub const FALLBACK_FOLDER_NAME: &str = "Project";

const FORBIDDEN_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const RESERVED_NAMES: [&str; 4] = ["CON", "PRN", "AUX", "NUL"];
const RESERVED_NUMBERED_PREFIXES: [&str; 2] = ["COM", "LPT"];

fn is_forbidden(c: char) -> bool {
    c.is_control() || FORBIDDEN_CHARS.contains(&c)
}

fn trim_edges(name: &str) -> &str {
    name.trim_matches(|c: char| c == '.' || c == '_' || c.is_whitespace())
}

/// True for Windows device names such as `CON`, `nul.txt` or `COM3`.
pub fn is_reserved_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or("").trim().to_ascii_uppercase();
    if RESERVED_NAMES.contains(&stem.as_str()) {
        return true;
    }
    RESERVED_NUMBERED_PREFIXES.iter().any(|prefix| {
        stem.len() == prefix.len() + 1
            && stem.starts_with(prefix)
            && stem.chars().last().is_some_and(|c| c.is_ascii_digit())
    })
}

pub fn sanitize_project_name(name: &str) -> String {
    let mut replaced = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == '_' && replaced.ends_with('_') {
            continue;
        }
        replaced.push(c);
    }

    let trimmed = trim_edges(&replaced);
    let capped: String = trimmed.chars().take(MAX_FOLDER_NAME_CHARS).collect();
    let mut folder = trim_edges(&capped).to_string();

    if folder.is_empty() {
        folder = FALLBACK_FOLDER_NAME.to_string();
    }
    if is_reserved_name(&folder) {
        folder.insert(0, '_');
    }
    folder
}
