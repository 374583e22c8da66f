use serde_json::Value;

/// Heuristic recovery for model output that almost parses as JSON.
///
/// Extracts the substring between the first `{` and the last `}` and
/// tries, in order: the substring unmodified, the substring with
/// dangling commas removed, with missing commas inserted, and with both
/// fixes combined. The first candidate that parses wins.
pub fn repair_json(malformed: &str) -> Option<Value> {
    let start = malformed.find('{')?;
    let end = malformed.rfind('}')?;
    if end <= start {
        return None;
    }

    let candidate = &malformed[start..=end];
    let mut attempts: Vec<String> = vec![candidate.to_string()];
    for variant in repair_candidates(candidate) {
        if !attempts.contains(&variant) {
            attempts.push(variant);
        }
    }

    attempts
        .iter()
        .find_map(|attempt| serde_json::from_str(attempt).ok())
}

fn repair_candidates(text: &str) -> Vec<String> {
    let mut variants = Vec::new();
    let no_dangling = remove_dangling_commas(text);
    if no_dangling != text {
        variants.push(no_dangling.clone());
    }

    let both_fixes = insert_missing_commas(&no_dangling);
    if both_fixes != no_dangling {
        variants.push(both_fixes);
    }

    let inserted_only = insert_missing_commas(text);
    if inserted_only != text {
        variants.push(inserted_only);
    }

    variants
}

/// Drops commas that directly precede a closing brace or bracket.
/// String-literal aware so `", }"` inside a quoted value survives.
pub fn remove_dangling_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape = false;
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        if in_string {
            result.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            index += 1;
            continue;
        }
        if ch == '"' {
            in_string = true;
            result.push(ch);
            index += 1;
            continue;
        }
        if ch == ',' {
            let mut lookahead = index + 1;
            while lookahead < chars.len() && chars[lookahead].is_whitespace() {
                lookahead += 1;
            }
            if lookahead < chars.len() && (chars[lookahead] == '}' || chars[lookahead] == ']') {
                index += 1;
                continue;
            }
        }
        result.push(ch);
        index += 1;
    }

    result
}

/// Inserts a comma after a closing quote when the next non-whitespace
/// character starts another value. The scan tracks whether a position
/// lies inside a quoted literal, with backslash-escape awareness, so
/// quotes inside strings never trigger an insertion.
pub fn insert_missing_commas(text: &str) -> String {
    if !text.contains('"') {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len() + 8);
    let mut in_string = false;
    let mut escape = false;

    for (index, &ch) in chars.iter().enumerate() {
        result.push(ch);

        if in_string {
            if escape {
                escape = false;
                continue;
            }
            if ch == '\\' {
                escape = true;
                continue;
            }
            if ch == '"' {
                in_string = false;
                let mut lookahead = index + 1;
                let mut saw_comma = false;
                while lookahead < chars.len() {
                    let next = chars[lookahead];
                    if next == ',' {
                        saw_comma = true;
                        break;
                    }
                    if !next.is_whitespace() {
                        break;
                    }
                    lookahead += 1;
                }
                if saw_comma || lookahead >= chars.len() {
                    continue;
                }
                let next = chars[lookahead];
                if next != ':' && next != ']' && next != '}' && is_likely_value_start(next) {
                    result.push(',');
                }
            }
            continue;
        }

        if ch == '"' {
            in_string = true;
        }
    }

    result
}

fn is_likely_value_start(ch: char) -> bool {
    matches!(ch, '"' | '{' | '[' | '-' | '0'..='9' | 't' | 'f' | 'n')
}
