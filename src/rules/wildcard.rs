//! Wildcard string matching.
//!
//! `*` matches zero or more characters and `?` matches exactly one. Runs of
//! `*` are collapsed to a single `*` before matching, which bounds the
//! backtracking on pathological patterns.

/// Return true if `input` matches the wildcard `pattern`.
#[must_use]
pub fn match_pattern(pattern: &str, input: &str) -> bool {
    let pattern: Vec<char> = collapse_repeats(pattern, '*').chars().collect();
    let input: Vec<char> = input.chars().collect();
    match_chars(&pattern, &input)
}

fn match_chars(pattern: &[char], input: &[char]) -> bool {
    if pattern.is_empty() {
        return input.is_empty();
    }
    if pattern.len() == 1 && pattern[0] == '*' {
        return true;
    }
    match pattern[0] {
        // A star consumes either no input (advance the pattern) or one
        // character (retry the pattern).
        '*' => match_chars(&pattern[1..], input) || (!input.is_empty() && match_chars(pattern, &input[1..])),
        '?' => !input.is_empty() && match_chars(&pattern[1..], &input[1..]),
        c => !input.is_empty() && input[0] == c && match_chars(&pattern[1..], &input[1..]),
    }
}

/// Collapse consecutive repeats of `repeated` into a single occurrence.
fn collapse_repeats(s: &str, repeated: char) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_repeat = false;
    for c in s.chars() {
        if c == repeated {
            if last_was_repeat {
                continue;
            }
            last_was_repeat = true;
        } else {
            last_was_repeat = false;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_pattern() {
        let tests = [
            ("*", "helloworld", true),
            ("hell*orld", "helloworld", true),
            ("h*world", "hello", false),
            ("*hello", "helloworld", false),
            ("he?lo*d", "helloworld", true),
            ("*elo*", "helloworld", false),
            ("*abc***/*d*e*f*/**gh**ij*k*", "aabc/def/ghijk", true),
            ("abc***/*d*e*f*/**gh**ij*k*", "aabc/def/ghijk", false),
            ("/users/*", "/users/login", true),
            ("/user*/log??", "/users/login", true),
            ("", "", true),
            ("", "x", false),
            ("?", "", false),
        ];
        for (pattern, input, expected) in tests {
            assert_eq!(
                match_pattern(pattern, input),
                expected,
                "pattern={pattern:?} input={input:?}"
            );
        }
    }

    #[test]
    fn test_collapse_repeats() {
        let tests = [
            ("*****", "*"),
            ("** ** **", "* * *"),
            ("a***b", "a*b"),
            ("***aaa", "*aaa"),
            ("abc", "abc"),
            ("abc***", "abc*"),
        ];
        for (input, expected) in tests {
            assert_eq!(collapse_repeats(input, '*'), expected);
        }
    }

    #[test]
    fn test_match_stable_under_collapse() {
        let cases = [
            ("a***b*c", "axxbyc"),
            ("**x**", "zzxzz"),
            ("a**", "a"),
            ("**", ""),
        ];
        for (pattern, input) in cases {
            assert_eq!(
                match_pattern(pattern, input),
                match_pattern(&collapse_repeats(pattern, '*'), input),
                "pattern={pattern:?}"
            );
        }
    }
}
