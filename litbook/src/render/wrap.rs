//! Reversible wrapping of comment-prefixed output lines.
//!
//! A captured line longer than the column budget is split into chunks. The
//! first chunk gets the plain comment prefix (`// `); every continuation
//! chunk gets the continuation marker (`//+ `). `unwrap_comment_lines`
//! rejoins them, so the unwrapped text can always be recovered. A prefix
//! without trailing whitespace gets a space appended, otherwise a captured
//! line starting with `+ ` would read as a continuation.

/// Narrowest chunk ever produced, whatever the budget.
const MIN_CHUNK: usize = 8;

/// Marker starting a continuation line for the given comment prefix.
pub fn continuation_marker(comment_prefix: &str) -> String {
    format!("{}+ ", comment_prefix.trim_end())
}

/// Prefix of a first chunk: never followed directly by the captured text.
fn line_prefix(comment_prefix: &str) -> String {
    if comment_prefix.ends_with(char::is_whitespace) {
        comment_prefix.to_string()
    } else {
        format!("{} ", comment_prefix)
    }
}

/// Render `text` as comment lines no wider than `width` characters.
pub fn comment_lines(text: &str, comment_prefix: &str, width: usize) -> Vec<String> {
    let marker = continuation_marker(comment_prefix);
    let prefix = line_prefix(comment_prefix);
    let bare = comment_prefix.trim_end();
    let room = width
        .saturating_sub(marker.chars().count())
        .max(MIN_CHUNK);

    let mut lines = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            lines.push(bare.to_string());
            continue;
        }
        let chars: Vec<char> = line.chars().collect();
        for (i, chunk) in chars.chunks(room).enumerate() {
            let chunk: String = chunk.iter().collect();
            if i == 0 {
                lines.push(format!("{}{}", prefix, chunk));
            } else {
                lines.push(format!("{}{}", marker, chunk));
            }
        }
    }
    lines
}

/// Reverse `comment_lines`: strip prefixes and rejoin continuation chunks.
/// Lines that are not comments in this convention are ignored.
pub fn unwrap_comment_lines<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    comment_prefix: &str,
) -> String {
    let marker = continuation_marker(comment_prefix);
    let prefix = line_prefix(comment_prefix);
    let bare = comment_prefix.trim_end();
    let mut out: Vec<String> = Vec::new();

    for line in lines {
        if let Some(rest) = line.strip_prefix(marker.as_str()) {
            match out.last_mut() {
                Some(last) => last.push_str(rest),
                None => out.push(rest.to_string()),
            }
        } else if let Some(rest) = line.strip_prefix(prefix.as_str()) {
            out.push(rest.to_string());
        } else if line == bare {
            out.push(String::new());
        }
    }

    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_are_prefixed_only() {
        assert_eq!(
            comment_lines("res0: Int = 2", "// ", 80),
            vec!["// res0: Int = 2".to_string()]
        );
    }

    #[test]
    fn long_lines_wrap_with_continuation_marker() {
        let text = "x".repeat(30);
        let lines = comment_lines(&text, "// ", 20);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("// "));
        assert!(lines[1].starts_with("//+ "));
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
    }

    #[test]
    fn wrapping_is_reversible() {
        let text = "type mismatch;\n found   : String(\"oops\")\n\n required: Int and then a very long tail that certainly exceeds the budget";
        let lines = comment_lines(text, "// ", 24);
        assert_eq!(unwrap_comment_lines(lines.iter().map(String::as_str), "// "), text);
    }

    #[test]
    fn other_comment_prefixes() {
        let lines = comment_lines(&"y".repeat(20), "# ", 12);
        assert!(lines[1].starts_with("#+ "));
        assert_eq!(
            unwrap_comment_lines(lines.iter().map(String::as_str), "# "),
            "y".repeat(20)
        );
    }

    #[test]
    fn plus_lines_survive_a_prefix_without_trailing_space() {
        let text = "a\n+ b\n+";
        let lines = comment_lines(text, "#", 80);
        assert_eq!(lines, vec!["# a", "# + b", "# +"]);
        assert_eq!(unwrap_comment_lines(lines.iter().map(String::as_str), "#"), text);
    }
}
