//! Best-effort extraction of executable code from a model reply.
//!
//! This is a line heuristic, not a parser. Misclassified lines are left to
//! the retry loop.

use std::sync::LazyLock;

/// Closes a reasoning preamble; everything up to it is discarded.
const THINK_END: &str = "</think>";

static FENCE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^\s*```[\w+#.-]*\s*$").expect("invalid fence regex")
});

/// Lowercased fragments that mark a line as prose.
const PROSE_MARKERS: &[&str] = &[
    "here is",
    "here's",
    "this code",
    "this function",
    "explanation:",
    "solution:",
    "answer:",
    "output:",
    "the above",
    "this will",
    "this should",
];

const CODE_TOKENS: &[&str] = &[
    "def ", "class ", "import ", "from ", "return", "print(", "if ", "elif ", "else:", "for ",
    "while ", "try:", "except", "finally:", "with ", "lambda", "yield", "raise ", "=", "@",
];

pub fn clean_response(raw: &str) -> String {
    let body = match raw.find(THINK_END) {
        Some(idx) => &raw[idx + THINK_END.len()..],
        None => raw,
    };

    let mut kept: Vec<&str> = Vec::new();
    let mut in_fence = false;
    let mut seen_code = false;

    for line in body.lines() {
        if FENCE.is_match(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            kept.push(line);
            seen_code = true;
            continue;
        }
        if line.trim().is_empty() || is_prose(line) {
            continue;
        }
        if seen_code || looks_like_code(line) {
            kept.push(line);
            seen_code = true;
        }
    }

    let code = kept.join("\n");
    match code.trim() {
        "" => body.trim().to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn is_prose(line: &str) -> bool {
    let lower = line.to_lowercase();
    PROSE_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn looks_like_code(line: &str) -> bool {
    line.starts_with("    ")
        || line.starts_with('\t')
        || CODE_TOKENS.iter().any(|token| line.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_fence_round_trip() {
        assert_eq!(clean_response("```\ncode\n```"), "code");
    }

    #[test]
    fn test_language_tagged_fence_with_prose() {
        let raw = "Here is the solution:\n\n```python\ndef add(a, b):\n    return a + b\n```\n\nThis function adds two numbers.";
        assert_eq!(clean_response(raw), "def add(a, b):\n    return a + b");
    }

    #[test]
    fn test_fenced_lines_kept_verbatim() {
        let raw = "```py\n# here is a comment\nx = 1\n\nprint(x)\n```";
        assert_eq!(clean_response(raw), "# here is a comment\nx = 1\n\nprint(x)");
    }

    #[test]
    fn test_think_block_is_discarded() {
        let raw = "<think>\nI should write x = 1 here\n</think>\nresult = 2 + 2";
        assert_eq!(clean_response(raw), "result = 2 + 2");
    }

    #[test]
    fn test_unfenced_prose_is_dropped() {
        let raw = "Sure! Here's my answer\ndef f(n):\n    return n * 2\nf(3)\nThis will return 6.";
        assert_eq!(clean_response(raw), "def f(n):\n    return n * 2\nf(3)");
    }

    #[test]
    fn test_leading_non_code_line_is_skipped() {
        let raw = "Sure thing\nprint('Hello, World!')";
        assert_eq!(clean_response(raw), "print('Hello, World!')");
    }

    #[test]
    fn test_falls_back_to_trimmed_text() {
        assert_eq!(clean_response("  just words  \n"), "just words");
        assert_eq!(clean_response("Here is nothing useful"), "Here is nothing useful");
    }

    #[test]
    fn test_plain_code_is_unchanged() {
        let code = "def is_even(n):\n    return n % 2 == 0";
        assert_eq!(clean_response(code), code);
    }
}
