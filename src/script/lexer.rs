// ── Template lexer ────────────────────────────────────────────────────────────

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),

    // Keywords
    And,
    Or,
    Not,
    If,
    Then,
    Elseif,
    Else,
    End,
    Local,
    True,
    False,
    Nil,

    // Operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    Caret,
    Hash,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    LParen,
    RParen,
    Comma,
    Semi,
    Colon,
    Dot,
    DotDot,

    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Int(v) => return write!(f, "{v}"),
            Token::Float(v) => return write!(f, "{v}"),
            Token::Str(s) => return write!(f, "'{s}'"),
            Token::Name(n) => return write!(f, "{n}"),
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::If => "if",
            Token::Then => "then",
            Token::Elseif => "elseif",
            Token::Else => "else",
            Token::End => "end",
            Token::Local => "local",
            Token::True => "true",
            Token::False => "false",
            Token::Nil => "nil",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::SlashSlash => "//",
            Token::Percent => "%",
            Token::Caret => "^",
            Token::Hash => "#",
            Token::EqEq => "==",
            Token::NotEq => "~=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Assign => "=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::Semi => ";",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::DotDot => "..",
            Token::Eof => "<eof>",
        };
        f.write_str(text)
    }
}

/// A token with the 1-based line it started on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
}

fn keyword(word: &str) -> Option<Token> {
    Some(match word {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "if" => Token::If,
        "then" => Token::Then,
        "elseif" => Token::Elseif,
        "else" => Token::Else,
        "end" => Token::End,
        "local" => Token::Local,
        "true" => Token::True,
        "false" => Token::False,
        "nil" => Token::Nil,
        _ => return None,
    })
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let peek = chars.get(i + 1).copied();

        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        // Line comment.
        if c == '-' && peek == Some('-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        let start_line = line;
        let token = if c.is_ascii_digit() || (c == '.' && peek.is_some_and(|p| p.is_ascii_digit())) {
            let (tok, next) = number(&chars, i).map_err(|e| format!("line {line}: {e}"))?;
            i = next;
            tok
        } else if c.is_alphabetic() || c == '_' {
            let begin = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[begin..i].iter().collect();
            keyword(&word).unwrap_or(Token::Name(word))
        } else if c == '"' || c == '\'' {
            let (text, next, lines) = string(&chars, i).map_err(|e| format!("line {line}: {e}"))?;
            i = next;
            line += lines;
            Token::Str(text)
        } else {
            let (tok, width) = match (c, peek) {
                ('/', Some('/')) => (Token::SlashSlash, 2),
                ('=', Some('=')) => (Token::EqEq, 2),
                ('~', Some('=')) => (Token::NotEq, 2),
                ('<', Some('=')) => (Token::Le, 2),
                ('>', Some('=')) => (Token::Ge, 2),
                ('.', Some('.')) => (Token::DotDot, 2),
                ('+', _) => (Token::Plus, 1),
                ('-', _) => (Token::Minus, 1),
                ('*', _) => (Token::Star, 1),
                ('/', _) => (Token::Slash, 1),
                ('%', _) => (Token::Percent, 1),
                ('^', _) => (Token::Caret, 1),
                ('#', _) => (Token::Hash, 1),
                ('<', _) => (Token::Lt, 1),
                ('>', _) => (Token::Gt, 1),
                ('=', _) => (Token::Assign, 1),
                ('(', _) => (Token::LParen, 1),
                (')', _) => (Token::RParen, 1),
                (',', _) => (Token::Comma, 1),
                (';', _) => (Token::Semi, 1),
                (':', _) => (Token::Colon, 1),
                ('.', _) => (Token::Dot, 1),
                _ => return Err(format!("line {line}: unexpected symbol near '{c}'")),
            };
            i += width;
            tok
        };
        out.push(Spanned { token, line: start_line });
    }

    out.push(Spanned { token: Token::Eof, line });
    Ok(out)
}

fn number(chars: &[char], start: usize) -> Result<(Token, usize), String> {
    let mut i = start;
    if chars[i] == '0' && matches!(chars.get(i + 1), Some('x' | 'X')) {
        i += 2;
        let begin = i;
        while i < chars.len() && chars[i].is_ascii_hexdigit() {
            i += 1;
        }
        let digits: String = chars[begin..i].iter().collect();
        return i64::from_str_radix(&digits, 16)
            .map(|v| (Token::Int(v), i))
            .map_err(|_| format!("malformed number near '0x{digits}'"));
    }

    let mut is_float = false;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    // `1..2` is concatenation, not a decimal point.
    if chars.get(i) == Some(&'.') && chars.get(i + 1) != Some(&'.') {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if matches!(chars.get(i), Some('e' | 'E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+' | '-')) {
            j += 1;
        }
        if chars.get(j).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text: String = chars[start..i].iter().collect();
    if i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
        return Err(format!("malformed number near '{text}{}'", chars[i]));
    }
    if !is_float {
        if let Ok(v) = text.parse::<i64>() {
            return Ok((Token::Int(v), i));
        }
    }
    text.parse::<f64>()
        .map(|v| (Token::Float(v), i))
        .map_err(|_| format!("malformed number near '{text}'"))
}

/// Returns the decoded text, the index after the closing quote, and how many
/// newlines were consumed.
fn string(chars: &[char], start: usize) -> Result<(String, usize, usize), String> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    let mut lines = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return Ok((out, i + 1, lines));
        }
        if c == '\n' {
            return Err("unfinished string".into());
        }
        if c == '\\' {
            let Some(&e) = chars.get(i + 1) else {
                return Err("unfinished string".into());
            };
            match e {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                '\\' => out.push('\\'),
                '"' => out.push('"'),
                '\'' => out.push('\''),
                '\n' => {
                    out.push('\n');
                    lines += 1;
                }
                other => return Err(format!("invalid escape sequence '\\{other}'")),
            }
            i += 2;
            continue;
        }
        out.push(c);
        i += 1;
    }
    Err("unfinished string".into())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn numbers_and_concat() {
        assert_eq!(
            kinds("1 .. 2.5 0x1F 3e2"),
            vec![Token::Int(1), Token::DotDot, Token::Float(2.5), Token::Int(31), Token::Float(300.0), Token::Eof]
        );
        assert_eq!(kinds("1..2"), vec![Token::Int(1), Token::DotDot, Token::Int(2), Token::Eof]);
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(kinds(r#"'a\'b' "c\nd""#), vec![
            Token::Str("a'b".into()),
            Token::Str("c\nd".into()),
            Token::Eof,
        ]);
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn comments_and_lines() {
        let toks = tokenize("a = 1 -- note\nset(a)").unwrap();
        assert_eq!(toks[3].token, Token::Name("set".into()));
        assert_eq!(toks[3].line, 2);
    }

    #[test]
    fn keywords_and_operators() {
        assert_eq!(
            kinds("if not x ~= y then end"),
            vec![
                Token::If,
                Token::Not,
                Token::Name("x".into()),
                Token::NotEq,
                Token::Name("y".into()),
                Token::Then,
                Token::End,
                Token::Eof
            ]
        );
    }

    #[test]
    fn malformed_number() {
        assert!(tokenize("3abc").is_err());
    }
}
