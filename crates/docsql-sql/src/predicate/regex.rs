//! Translation of document-API regular expressions to POSIX patterns.

use serde_json::Value as Json;

/// Expands `\Q...\E` literal quoting and keeps `^`/`$` anchors.
pub fn process_regex_pattern(pattern: &str) -> String {
    if let Some(rest) = pattern.strip_prefix('^') {
        format!("^{}", literalize(rest))
    } else if let Some(rest) = pattern.strip_suffix('$') {
        format!("{}$", literalize(rest))
    } else {
        literalize(pattern)
    }
}

fn literalize(s: &str) -> String {
    if let Some(start) = s.find("\\Q") {
        let prefix = &s[..start];
        let quoted = &s[start + 2..];
        let quoted = quoted.strip_suffix("\\E").unwrap_or(quoted);
        return literalize(prefix) + &escape_literal(quoted);
    }

    // A stray `\E` with no opening `\Q` is dropped.
    let s = s.strip_prefix("\\E").unwrap_or(s);
    let mut prev = None;
    for (i, c) in s.char_indices() {
        if c == '\\' && prev != Some('\\') && s[i..].starts_with("\\E") {
            return format!("{}{}", &s[..i], &s[i + 2..]);
        }
        prev = Some(c);
    }
    s.to_string()
}

/// Backslash-escapes everything except letters, digits and spaces.
fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if !(c.is_ascii_digit() || c == ' ' || c.is_alphabetic()) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Strips unescaped whitespace and `#` comments for the `x` option.
pub fn remove_white_space(regex: &str) -> String {
    let mut out = String::with_capacity(regex.len());
    let mut chars = regex.chars();
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }

        match c {
            '\\' => {
                out.push(c);
                escaped = true;
            }
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => {}
            c => out.push(c),
        }
    }

    out.trim().to_string()
}

/// `true` for a `^\Q...\E` starts-with pattern.
pub fn is_starts_with_regex(value: Option<&Json>) -> bool {
    let Some(Json::String(s)) = value else {
        return false;
    };
    s.starts_with('^')
        && s.find("^\\Q")
            .is_some_and(|start| s[start + 3..].contains("\\E"))
}

/// `$all` members must either all be starts-with patterns or none be.
pub fn is_all_regex_or_none(values: &[Json]) -> bool {
    let Some((first, rest)) = values.split_first() else {
        return true;
    };
    let first = is_starts_with_regex(first.get("$regex"));
    if rest.is_empty() {
        return first;
    }
    rest.iter()
        .all(|value| is_starts_with_regex(value.get("$regex")) == first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quoted_literals_are_escaped() {
        assert_eq!(process_regex_pattern("^\\Qa.b\\E"), "^a\\.b");
        assert_eq!(process_regex_pattern("\\Q(x)\\E$"), "\\(x\\)$");
        assert_eq!(process_regex_pattern("foo\\Q+\\E"), "foo\\+");
        assert_eq!(process_regex_pattern("^\\Qit's\\E"), "^it\\'s");
        assert_eq!(process_regex_pattern("ab.*"), "ab.*");
    }

    #[test]
    fn unterminated_quote() {
        assert_eq!(process_regex_pattern("\\Qa b?"), "a b\\?");
    }

    #[test]
    fn free_spacing() {
        assert_eq!(remove_white_space("a b  # comment\n c"), "abc");
        assert_eq!(remove_white_space("a\\ b"), "a\\ b");
        assert_eq!(remove_white_space("  ^x # tail"), "^x");
    }

    #[test]
    fn starts_with_detection() {
        assert!(is_starts_with_regex(Some(&json!("^\\Qfoo\\E"))));
        assert!(!is_starts_with_regex(Some(&json!("foo"))));
        assert!(!is_starts_with_regex(None));

        assert!(is_all_regex_or_none(&[]));
        assert!(is_all_regex_or_none(&[
            json!({"$regex": "^\\Qa\\E"}),
            json!({"$regex": "^\\Qb\\E"})
        ]));
        assert!(!is_all_regex_or_none(&[json!({"$regex": "^\\Qa\\E"}), json!("b")]));
        assert!(!is_all_regex_or_none(&[json!("b")]));
    }
}
