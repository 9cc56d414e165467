//! Pattern helpers for prompt detection.

use regex::bytes::Regex;

/// Compile a prompt pattern string into a regex.
///
/// Patterns without an end anchor get `\s*$` appended, since a prompt is
/// only a prompt when nothing follows it.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("{}\\s*$", pattern)
    };

    Regex::new(&pattern)
}

/// Build a single regex matching any of `patterns`.
pub fn combine(patterns: &[Regex]) -> Result<Regex, regex::Error> {
    let alternatives: Vec<String> = patterns
        .iter()
        .map(|p| format!("(?:{})", p.as_str()))
        .collect();
    Regex::new(&alternatives.join("|"))
}

/// Index of the first pattern (in priority order) matching `data`.
pub fn first_match(patterns: &[&Regex], data: &[u8]) -> Option<usize> {
    patterns.iter().position(|p| p.is_match(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_prompt_pattern() {
        let pattern = compile_prompt_pattern(r"router#").unwrap();
        assert!(pattern.is_match(b"router# "));
        assert!(!pattern.is_match(b"router# show"));

        let pattern = compile_prompt_pattern(r"router#$").unwrap();
        assert!(pattern.is_match(b"router#"));
    }

    #[test]
    fn test_combine() {
        let a = Regex::new(r">\s*$").unwrap();
        let b = Regex::new(r"#\s*$").unwrap();
        let combined = combine(&[a, b]).unwrap();
        assert!(combined.is_match(b"router>"));
        assert!(combined.is_match(b"router#"));
        assert!(!combined.is_match(b"router$"));
    }

    #[test]
    fn test_first_match_priority() {
        let failure = Regex::new(r"(?i)login invalid").unwrap();
        let user = Regex::new(r"(?i)username:\s*$").unwrap();
        let data = b"% Login invalid\n\nUsername: ";
        assert_eq!(first_match(&[&failure, &user], data), Some(0));
        assert_eq!(first_match(&[&user, &failure], data), Some(0));
        assert_eq!(first_match(&[&failure], b"Username: "), None);
    }
}
