// ABOUTME: Tokenizer for definition files, written as an explicit state machine.
// ABOUTME: Skips whitespace, comments and string literals while tracking line numbers.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::ExtractError;

/// Kind of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier, dotted name, keyword or number.
    Word(String),
    /// String literal contents, escapes left as written.
    Str(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    Semi,
    /// Any other punctuation (`=`, `<`, `,`, ...).
    Symbol(char),
}

/// A token and the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    /// Whether this token is the word `word`.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w == word)
    }

    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            _ => None,
        }
    }
}

/// Scanner state between characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Slash,
    LineComment,
    BlockComment,
    BlockCommentStar,
    Str { quote: char, escaped: bool },
}

/// Tokenizer for one definition file.
pub struct Scanner<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
        }
    }

    /// Tokenize the entire source.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ExtractError> {
        let mut tokens = Vec::new();
        let mut state = State::Start;
        let mut start = 0usize;
        let mut start_line = 1usize;

        while let Some((i, c)) = self.chars.next() {
            state = match state {
                State::Start => {
                    start = i;
                    start_line = self.line;
                    self.start(i, c, &mut tokens)
                }
                State::Slash => match c {
                    '/' => State::LineComment,
                    '*' => State::BlockComment,
                    _ => {
                        tokens.push(Token {
                            kind: TokenKind::Symbol('/'),
                            line: start_line,
                        });
                        start = i;
                        start_line = self.line;
                        self.start(i, c, &mut tokens)
                    }
                },
                State::LineComment => match c {
                    '\n' => State::Start,
                    _ => State::LineComment,
                },
                State::BlockComment => match c {
                    '*' => State::BlockCommentStar,
                    _ => State::BlockComment,
                },
                State::BlockCommentStar => match c {
                    '/' => State::Start,
                    '*' => State::BlockCommentStar,
                    _ => State::BlockComment,
                },
                State::Str { quote, escaped } => {
                    if escaped {
                        State::Str {
                            quote,
                            escaped: false,
                        }
                    } else if c == '\\' {
                        State::Str {
                            quote,
                            escaped: true,
                        }
                    } else if c == quote {
                        tokens.push(Token {
                            kind: TokenKind::Str(self.source[start + 1..i].to_string()),
                            line: start_line,
                        });
                        State::Start
                    } else {
                        State::Str { quote, escaped }
                    }
                }
            };

            if c == '\n' {
                self.line += 1;
            }
        }

        match state {
            State::BlockComment | State::BlockCommentStar => {
                Err(ExtractError::UnterminatedComment { line: start_line })
            }
            State::Str { .. } => Err(ExtractError::UnterminatedString { line: start_line }),
            State::Slash => {
                tokens.push(Token {
                    kind: TokenKind::Symbol('/'),
                    line: start_line,
                });
                Ok(tokens)
            }
            _ => Ok(tokens),
        }
    }

    /// Handle the first character of a token, found at offset `at`.
    ///
    /// Words are consumed whole; every other token either completes here
    /// or moves the scanner into a comment or string state.
    fn start(&mut self, at: usize, c: char, tokens: &mut Vec<Token>) -> State {
        let punct = match c {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ';' => TokenKind::Semi,
            '/' => return State::Slash,
            '"' | '\'' => {
                return State::Str {
                    quote: c,
                    escaped: false,
                }
            }
            c if c.is_whitespace() => return State::Start,
            c if is_word_char(c) => {
                let end = self.take_word();
                TokenKind::Word(self.source[at..end].to_string())
            }
            other => TokenKind::Symbol(other),
        };
        tokens.push(Token {
            kind: punct,
            line: self.line,
        });
        State::Start
    }

    /// Consume the rest of a word and return its end offset.
    fn take_word(&mut self) -> usize {
        while let Some(&(i, c)) = self.chars.peek() {
            if !is_word_char(c) {
                return i;
            }
            self.chars.next();
        }
        self.source.len()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn word(w: &str) -> TokenKind {
        TokenKind::Word(w.to_string())
    }

    #[test]
    fn test_tokenize_rpc_line() {
        assert_eq!(
            kinds("rpc Bar(stream .pkg.Req) returns (Res);"),
            vec![
                word("rpc"),
                word("Bar"),
                TokenKind::LParen,
                word("stream"),
                word(".pkg.Req"),
                TokenKind::RParen,
                word("returns"),
                TokenKind::LParen,
                word("Res"),
                TokenKind::RParen,
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("a // } ignored\n/* { also\n ignored **/ b"),
            vec![word("a"), word("b")]
        );
    }

    #[test]
    fn test_strings_hide_braces() {
        assert_eq!(
            kinds(r#"option x = "}{\"" ;"#),
            vec![
                word("option"),
                word("x"),
                TokenKind::Symbol('='),
                TokenKind::Str(r#"}{\""#.to_string()),
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn test_lone_slash_is_symbol() {
        assert_eq!(
            kinds("a / b"),
            vec![word("a"), TokenKind::Symbol('/'), word("b")]
        );
    }

    #[test]
    fn test_line_numbers() {
        let tokens = Scanner::new("a\n\n/* x\n y */ b\n  c").tokenize().unwrap();
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 4, 5]);
    }

    #[test]
    fn test_unterminated_comment_reports_start_line() {
        let err = Scanner::new("a\n/* never\nclosed").tokenize().unwrap_err();
        assert_eq!(err, ExtractError::UnterminatedComment { line: 2 });
    }

    #[test]
    fn test_unterminated_string_reports_start_line() {
        let err = Scanner::new("a\nb = \"open").tokenize().unwrap_err();
        assert_eq!(err, ExtractError::UnterminatedString { line: 2 });
    }
}
