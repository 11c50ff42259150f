//! Locating and repairing the JSON document inside generated text

/// Remove markdown code-fence markers
pub fn strip_code_fences(text: &str) -> String {
    if text.contains("```json") {
        text.replace("```json", "").replace("```", "")
    } else if text.contains("```") {
        text.replace("```", "")
    } else {
        text.to_string()
    }
}

/// Slice from the first `{` to the last `}`, inclusive
pub fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Repair the usual defects of generated JSON
///
/// Outside string literals: strips `//` and `/* */` comments, lowercases
/// Python-style `True`/`False` (and maps `None` to `null`), and drops
/// trailing commas before `}`/`]`. Inside string literals: escapes raw
/// control characters. At the end: closes an unterminated string, then
/// appends exactly the missing `}`/`]` in nesting order, which recovers
/// output truncated by a token limit.
pub fn repair_json(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut open: Vec<char> = Vec::new();
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => {}
                c => out.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '{' => {
                open.push('}');
                out.push(c);
            }
            '[' => {
                open.push(']');
                out.push(c);
            }
            '}' | ']' => {
                if open.last() == Some(&c) {
                    open.pop();
                }
                close_with(&mut out, c);
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            c => out.push(c),
        }
    }

    if in_string {
        // A dangling backslash would escape the closing quote
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    while let Some(closer) = open.pop() {
        close_with(&mut out, closer);
    }

    out
}

/// Append a closer, dropping a trailing comma in front of it
fn close_with(out: &mut String, closer: char) {
    let kept = out.trim_end().len();
    out.truncate(kept);
    if out.ends_with(',') {
        out.pop();
    }
    out.push(closer);
}
