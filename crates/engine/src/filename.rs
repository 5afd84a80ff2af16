//! Output filename derivation for captured streams.
//!
//! Titles come straight from platform APIs and routinely contain characters
//! that are invalid in Windows filenames. Instead of dropping them, each
//! reserved character is replaced with its full-width Unicode counterpart so
//! the title stays readable.

/// Reserved filename characters and their full-width substitutes.
const FULLWIDTH_SUBSTITUTIONS: &[(char, char)] = &[
    ('"', '＂'),
    ('*', '＊'),
    (':', '：'),
    ('<', '＜'),
    ('>', '＞'),
    ('?', '？'),
    ('/', '／'),
    ('\\', '＼'),
    ('|', '｜'),
];

/// Maximum number of title characters carried into a filename.
pub const MAX_TITLE_CHARS: usize = 50;

/// Sanitize a stream title for use in a filename: full-width substitution of
/// the nine reserved characters, then truncation to [`MAX_TITLE_CHARS`].
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            FULLWIDTH_SUBSTITUTIONS
                .iter()
                .find(|(half, _)| *half == c)
                .map(|(_, full)| *full)
                .unwrap_or(c)
        })
        .take(MAX_TITLE_CHARS)
        .collect()
}

/// Derive the output filename for a capture starting now:
/// `[YYYY.MM.DD HH.MM.SS][platform][name]{title}.{extension}`.
pub fn derive_filename(flag: &str, title: &str, extension: &str) -> String {
    let stamp = chrono::Local::now().format("%Y.%m.%d %H.%M.%S");
    format!("[{stamp}]{flag}{}.{extension}", sanitize_title(title))
}
