//! Parser for function-call shaped commands in model replies.
//!
//! ```text
//! command  := name "(" args? ")"
//! args     := token ("," token)*
//! token    := identifier "=" value | value
//! value    := quoted-string | bareword
//! ```
//!
//! Only the first fenced block is considered when the reply contains one.

use std::collections::BTreeMap;

use crate::error::CommandError;

const FENCE: &str = "```";

/// A command split into name, positional and keyword arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub positional: Vec<String>,
    /// Last occurrence wins on duplicate keys.
    pub keyword: BTreeMap<String, String>,
}

/// Parse model text into a command.
pub fn parse(text: &str) -> Result<ParsedCommand, CommandError> {
    let body = command_body(text);
    let (name, open) = find_call(body).ok_or(CommandError::NotACommand)?;
    let tokens = split_args(&body[open + 1..]).ok_or(CommandError::NotACommand)?;

    let mut command = ParsedCommand {
        name: name.to_string(),
        ..Default::default()
    };
    for token in tokens {
        match token.keyword() {
            Some((key, value)) => {
                command.keyword.insert(key.to_string(), unquote(value));
            }
            None => command.positional.push(unquote(token.raw.trim())),
        }
    }
    Ok(command)
}

/// The text to parse: the first fenced block's content, or the whole text.
fn command_body(text: &str) -> &str {
    let Some(start) = text.find(FENCE) else {
        return text.trim();
    };
    let inner = &text[start + FENCE.len()..];
    let inner = match inner.find(FENCE) {
        Some(end) => &inner[..end],
        None => inner,
    };

    // A leading line without a call on it is an info string (```python).
    match inner.split_once('\n') {
        Some((first, rest)) if !first.contains('(') => rest.trim(),
        _ => inner.trim(),
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_word)
}

/// Read the leading `name(` and return the name with the byte offset of `(`.
fn find_call(body: &str) -> Option<(&str, usize)> {
    let open = body.find(|c: char| !is_word(c))?;
    let name = &body[..open];
    (!name.is_empty() && body[open..].starts_with('(')).then_some((name, open))
}

/// One comma-separated argument as it appeared in the text.
struct RawToken {
    raw: String,
    /// Byte offset of the first `=` outside quotes and parentheses.
    eq: Option<usize>,
}

impl RawToken {
    fn keyword(&self) -> Option<(&str, &str)> {
        let eq = self.eq?;
        let key = self.raw[..eq].trim();
        is_identifier(key).then(|| (key, self.raw[eq + 1..].trim()))
    }
}

/// Split the text after `(` into tokens, stopping at the matching `)`.
///
/// Returns `None` if the argument list never closes.
fn split_args(args: &str) -> Option<Vec<RawToken>> {
    let mut tokens = Vec::new();
    let mut current = RawToken {
        raw: String::new(),
        eq: None,
    };
    // Quotes only open at the start of a value so apostrophes in barewords are literal.
    let mut segment_blank = true;
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut chars = args.chars();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.raw.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    current.raw.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' if segment_blank => {
                quote = Some(c);
                segment_blank = false;
                current.raw.push(c);
            }
            '(' => {
                depth += 1;
                segment_blank = false;
                current.raw.push(c);
            }
            ')' if depth > 0 => {
                depth -= 1;
                current.raw.push(c);
            }
            ')' => {
                push_token(&mut tokens, current);
                return Some(tokens);
            }
            ',' if depth == 0 => {
                push_token(
                    &mut tokens,
                    std::mem::replace(
                        &mut current,
                        RawToken {
                            raw: String::new(),
                            eq: None,
                        },
                    ),
                );
                segment_blank = true;
            }
            '=' if depth == 0 && current.eq.is_none() => {
                current.eq = Some(current.raw.len());
                current.raw.push(c);
                segment_blank = true;
            }
            c => {
                if !c.is_whitespace() {
                    segment_blank = false;
                }
                current.raw.push(c);
            }
        }
    }
    None
}

fn push_token(tokens: &mut Vec<RawToken>, token: RawToken) {
    if !token.raw.trim().is_empty() {
        tokens.push(token);
    }
}

/// Strip one level of matching quotes and resolve escapes; barewords pass through.
fn unquote(value: &str) -> String {
    let mut chars = value.chars();
    let Some(q @ ('"' | '\'')) = chars.next() else {
        return value.to_string();
    };

    let mut out = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some(e @ ('"' | '\'' | '\\')) => out.push(e),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            c if c == q => {
                // Closing quote must end the value, otherwise keep it verbatim.
                return if chars.as_str().trim().is_empty() {
                    out
                } else {
                    value.to_string()
                };
            }
            c => out.push(c),
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_keyword_arguments_with_comma_in_quotes() {
        let cmd = parse(
            r#"store_summary(interval="daily", start_time="2024-01-01", summary="hello, world")"#,
        )
        .unwrap();
        assert_eq!(cmd.name, "store_summary");
        assert!(cmd.positional.is_empty());
        assert_eq!(
            cmd.keyword,
            kw(&[
                ("interval", "daily"),
                ("start_time", "2024-01-01"),
                ("summary", "hello, world"),
            ])
        );
    }

    #[test]
    fn test_positional_in_order() {
        let cmd = parse("get_users(!abc:matrix.org, 'second one', 3)").unwrap();
        assert_eq!(cmd.positional, vec!["!abc:matrix.org", "second one", "3"]);
        assert!(cmd.keyword.is_empty());
    }

    #[test]
    fn test_empty_call() {
        let cmd = parse("help()").unwrap();
        assert_eq!(cmd.name, "help");
        assert!(cmd.positional.is_empty());
        assert!(cmd.keyword.is_empty());
    }

    #[test]
    fn test_fenced_block_with_info_string() {
        let text = "Sure, here it is:\n```python\ntimeout(seconds=3600)\n```\nand nothing else";
        let cmd = parse(text).unwrap();
        assert_eq!(cmd.name, "timeout");
        assert_eq!(cmd.keyword, kw(&[("seconds", "3600")]));
    }

    #[test]
    fn test_only_first_fenced_block() {
        let text = "```\nget_mind_map()\n```\n```\nhelp()\n```";
        assert_eq!(parse(text).unwrap().name, "get_mind_map");
    }

    #[test]
    fn test_prose_before_call() {
        assert_eq!(
            parse("I will now call get_my_name() to check."),
            Err(CommandError::NotACommand)
        );
        assert_eq!(
            parse("Results look fine, see summary(daily) for details."),
            Err(CommandError::NotACommand)
        );
        assert_eq!(parse("(see below) help()"), Err(CommandError::NotACommand));
        assert_eq!(parse("help ()"), Err(CommandError::NotACommand));
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let cmd = parse("  \n get_my_name()  \n").unwrap();
        assert_eq!(cmd.name, "get_my_name");
    }

    #[test]
    fn test_trailing_text_ignored() {
        let cmd = parse("timeout(60) and then some (more) text").unwrap();
        assert_eq!(cmd.positional, vec!["60"]);
    }

    #[test]
    fn test_nested_parentheses_kept_in_value() {
        let cmd = parse("store_mind_map(text=a (b) c)").unwrap();
        assert_eq!(cmd.keyword, kw(&[("text", "a (b) c")]));
    }

    #[test]
    fn test_escapes_inside_quotes() {
        let cmd = parse(r#"send_message(message="say \"hi\"\nbye", receiver_room_id='it\'s')"#)
            .unwrap();
        assert_eq!(cmd.keyword["message"], "say \"hi\"\nbye");
        assert_eq!(cmd.keyword["receiver_room_id"], "it's");
    }

    #[test]
    fn test_parens_and_equals_inside_quotes() {
        let cmd = parse(r#"store_mind_map(text="f(x) = y, done")"#).unwrap();
        assert_eq!(cmd.keyword["text"], "f(x) = y, done");
    }

    #[test]
    fn test_value_may_contain_equals() {
        let cmd = parse("store_mind_map(text=a=b)").unwrap();
        assert_eq!(cmd.keyword, kw(&[("text", "a=b")]));
    }

    #[test]
    fn test_non_identifier_key_is_positional() {
        let cmd = parse("store_mind_map(1 + 1 = 2)").unwrap();
        assert_eq!(cmd.positional, vec!["1 + 1 = 2"]);
        assert!(cmd.keyword.is_empty());
    }

    #[test]
    fn test_duplicate_keyword_last_wins() {
        let cmd = parse("timeout(seconds=1, seconds=2)").unwrap();
        assert_eq!(cmd.keyword, kw(&[("seconds", "2")]));
    }

    #[test]
    fn test_empty_tokens_skipped() {
        let cmd = parse("get_users(a, , b,)").unwrap();
        assert_eq!(cmd.positional, vec!["a", "b"]);
    }

    #[test]
    fn test_apostrophe_in_bareword() {
        let cmd = parse("store_mind_map(it's fine)").unwrap();
        assert_eq!(cmd.positional, vec!["it's fine"]);
    }

    #[test]
    fn test_quoted_empty_string_is_kept() {
        let cmd = parse(r#"store_mind_map(text="")"#).unwrap();
        assert_eq!(cmd.keyword, kw(&[("text", "")]));
    }

    #[test]
    fn test_not_a_command() {
        assert_eq!(parse("just chatting"), Err(CommandError::NotACommand));
        assert_eq!(parse("(no name)"), Err(CommandError::NotACommand));
        assert_eq!(parse("help(\"unterminated)"), Err(CommandError::NotACommand));
        assert_eq!(parse(""), Err(CommandError::NotACommand));
    }
}
