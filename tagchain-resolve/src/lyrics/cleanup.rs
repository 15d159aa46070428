//! Lyrics text normalization and fuzzy matching

use crate::error::{ResolveError, ResolveResult};
use regex::{Regex, RegexBuilder};

/// Built-in boilerplate patterns, matched case-insensitively against each
/// trimmed line
pub const DEFAULT_BOILERPLATE_PATTERNS: &[&str] = &[
    // copyright notices
    r"^(copyright\b|©|℗|\(c\))",
    r"lyrics (provided|licensed) by",
    // bare URLs
    r"^(https?://|www\.)\S+$",
    // separator rules
    r"^[-_=*~]{3,}$",
    r"^advertisement$",
    r"not for commercial use",
    // musixmatch tracking id
    r"^\(\d{6,}\)$",
];

/// Strips boilerplate lines and normalizes whitespace
#[derive(Debug, Clone)]
pub struct LyricsCleaner {
    patterns: Vec<Regex>,
}

impl LyricsCleaner {
    /// Compile `patterns`; an invalid pattern is a configuration error
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> ResolveResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        ResolveError::Config(format!(
                            "Invalid lyrics boilerplate pattern '{}': {}",
                            p.as_ref(),
                            e
                        ))
                    })
            })
            .collect::<ResolveResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_boilerplate(&self, line: &str) -> bool {
        let line = line.trim();
        !line.is_empty() && self.patterns.iter().any(|p| p.is_match(line))
    }

    /// Normalize line endings, drop boilerplate lines, trim each line's end,
    /// collapse runs of 3+ blank lines to one, trim the whole text
    pub fn clean(&self, raw: &str) -> String {
        let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");

        let mut lines: Vec<&str> = Vec::new();
        let mut blank_run = 0usize;
        for line in normalized.split('\n').map(str::trim_end) {
            if line.is_empty() {
                blank_run += 1;
                continue;
            }
            if self.is_boilerplate(line) {
                continue;
            }
            if !lines.is_empty() {
                let keep = if blank_run >= 3 { 1 } else { blank_run };
                lines.extend(std::iter::repeat("").take(keep));
            }
            blank_run = 0;
            lines.push(line);
        }

        lines.join("\n").trim().to_string()
    }
}

/// Case-insensitive substring containment in either direction
pub fn fuzzy_matches(query: &str, reported: &str) -> bool {
    let query = query.trim().to_lowercase();
    let reported = reported.trim().to_lowercase();
    if query.is_empty() || reported.is_empty() {
        return false;
    }
    query.contains(&reported) || reported.contains(&query)
}

/// Placeholder text some providers return for instrumental tracks
pub fn is_instrumental_text(text: &str) -> bool {
    let text = text.trim();
    text.eq_ignore_ascii_case("[instrumental]") || text.eq_ignore_ascii_case("instrumental")
}

/// Drop leading `[mm:ss.xx]` timestamps from synced (LRC) lyrics
pub fn strip_timestamps(synced: &str) -> String {
    synced
        .lines()
        .map(|line| {
            let mut rest = line.trim_start();
            while let Some(tail) = strip_one_timestamp(rest) {
                rest = tail.trim_start();
            }
            rest
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_one_timestamp(line: &str) -> Option<&str> {
    let inner_end = line.strip_prefix('[')?.find(']')?;
    let inner = &line[1..1 + inner_end];
    let is_time = !inner.is_empty()
        && inner.contains(':')
        && inner.chars().all(|c| c.is_ascii_digit() || c == ':' || c == '.');
    is_time.then(|| &line[inner_end + 2..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> LyricsCleaner {
        LyricsCleaner::new(DEFAULT_BOILERPLATE_PATTERNS).unwrap()
    }

    #[test]
    fn test_clean_strips_boilerplate() {
        let raw = "Is this the real life?\r\nIs this just fantasy?   \r\n\r\n\
                   Lyrics provided by SomeSite\r\n\
                   Copyright 1975 Queen\r\n\
                   https://example.com/lyrics\r\n\
                   ------\r\n\
                   ******* This Lyrics is NOT for Commercial use *******\r\n\
                   (1409617829315)";
        assert_eq!(
            cleaner().clean(raw),
            "Is this the real life?\nIs this just fantasy?"
        );
    }

    #[test]
    fn test_clean_collapses_long_blank_runs() {
        let raw = "verse one\n\n\n\n\nverse two\n\nverse three\n";
        assert_eq!(cleaner().clean(raw), "verse one\n\nverse two\n\nverse three");
    }

    #[test]
    fn test_clean_keeps_short_blank_runs() {
        assert_eq!(cleaner().clean("a\n\n\nb"), "a\n\n\nb");
        assert_eq!(cleaner().clean("a\n\nb"), "a\n\nb");
        assert_eq!(cleaner().clean("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_clean_only_boilerplate_is_empty() {
        assert_eq!(cleaner().clean("Advertisement\n\n===\n"), "");
    }

    #[test]
    fn test_custom_patterns() {
        let cleaner = LyricsCleaner::new(&["^source:"]).unwrap();
        assert_eq!(cleaner.clean("SOURCE: radio\nline"), "line");
        assert!(matches!(LyricsCleaner::new(&["(unclosed"]), Err(ResolveError::Config(_))));
    }

    #[test]
    fn test_fuzzy_matches() {
        assert!(fuzzy_matches("Queen", "queen"));
        assert!(fuzzy_matches("Bohemian Rhapsody", "Bohemian Rhapsody (Remastered 2011)"));
        assert!(fuzzy_matches("The Beatles", "Beatles"));
        assert!(!fuzzy_matches("Queen", "Abba"));
        assert!(!fuzzy_matches("", "Queen"));
    }

    #[test]
    fn test_instrumental_text() {
        assert!(is_instrumental_text(" [Instrumental] "));
        assert!(!is_instrumental_text("Instrumental break in the second verse"));
    }

    #[test]
    fn test_strip_timestamps() {
        let synced = "[00:12.34] Is this the real life?\n[00:15.00][01:15.00]Chorus\n[ar:Queen]";
        assert_eq!(
            strip_timestamps(synced),
            "Is this the real life?\nChorus\n[ar:Queen]"
        );
    }
}
