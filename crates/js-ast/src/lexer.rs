use std::char;
use std::fmt;
use std::iter;
use std::str;

/// Tokenizer for the JavaScript subset understood by this crate.
///
/// Comments and whitespace are consumed here and surface only as the
/// `newline_before` flag on the following token, which drives automatic
/// semicolon insertion in the parser.
pub struct Lexer<'a> {
    it: iter::Peekable<str::CharIndices<'a>>,
    input: &'a str,
    newline_pending: bool,
    last_significant: Option<LastToken>,
}

/// A single token plus the source position it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Tok {
    pub token: Token,
    pub pos: usize,
    pub newline_before: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An identifier or reserved word; the parser decides which.
    Word(String),
    /// A punctuator, longest-match (`=>`, `...`, `===`, ...).
    Punct(&'static str),
    /// A string literal, with escapes already cooked.
    Str(String),
    /// A numeric literal.
    Num(f64),
    /// A template literal: alternating cooked chunks and raw substitution
    /// sources, starting and ending with a chunk.
    Template(Vec<TemplateRaw>),
    /// A regular expression literal, verbatim including flags.
    Regex(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateRaw {
    Chunk(String),
    /// Raw source of a `${...}` substitution, braces stripped.
    Expr(String),
}

/// What category the previous significant token fell into, for deciding
/// whether `/` starts a regex literal or a division operator.
#[derive(Copy, Clone)]
enum LastToken {
    Operand,
    Operator,
}

#[derive(Debug, Clone)]
pub struct LexError {
    inner: Box<LexErrorInner>,
}

#[derive(Debug, Clone)]
struct LexErrorInner {
    line: usize,
    col: usize,
    kind: LexErrorKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LexErrorKind {
    Unexpected(char),
    UnterminatedString,
    UnterminatedTemplate,
    UnterminatedRegex,
    UnterminatedComment,
    InvalidEscape(char),
    InvalidHexDigit(char),
    InvalidUnicodeValue(u32),
    InvalidNumber,
    UnexpectedEof,
}

impl LexError {
    pub fn line(&self) -> usize {
        self.inner.line
    }

    pub fn col(&self) -> usize {
        self.inner.col
    }

    pub fn kind(&self) -> &LexErrorKind {
        &self.inner.kind
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.inner.line + 1,
            self.inner.col + 1,
            self.inner.kind
        )
    }
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use LexErrorKind::*;
        match self {
            Unexpected(c) => write!(f, "unexpected character {c:?}"),
            UnterminatedString => write!(f, "unterminated string literal"),
            UnterminatedTemplate => write!(f, "unterminated template literal"),
            UnterminatedRegex => write!(f, "unterminated regular expression"),
            UnterminatedComment => write!(f, "unterminated block comment"),
            InvalidEscape(c) => write!(f, "invalid escape sequence `\\{c}`"),
            InvalidHexDigit(c) => write!(f, "invalid hex digit {c:?}"),
            InvalidUnicodeValue(v) => write!(f, "invalid unicode escape value {v:#x}"),
            InvalidNumber => write!(f, "invalid numeric literal"),
            UnexpectedEof => write!(f, "unexpected end of input"),
        }
    }
}

impl std::error::Error for LexError {}

/// Keywords after which a `/` begins a regex literal rather than division.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

impl<'a> Lexer<'a> {
    pub fn new(input: &str) -> Lexer<'_> {
        Lexer {
            it: input.char_indices().peekable(),
            input,
            newline_pending: false,
            last_significant: None,
        }
    }

    /// Tokenizes the whole input up front.
    pub fn tokenize(input: &str) -> Result<Vec<Tok>, LexError> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        while let Some(tok) = lexer.next()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    pub fn next(&mut self) -> Result<Option<Tok>, LexError> {
        self.skip_trivia()?;
        let newline_before = self.newline_pending;
        let (pos, ch) = match self.it.peek().cloned() {
            Some(p) => p,
            None => return Ok(None),
        };

        let token = if is_id_start(ch) {
            self.word()
        } else if ch.is_ascii_digit() {
            self.number()?
        } else if ch == '.' && self.peek2_is_digit() {
            self.number()?
        } else if ch == '"' || ch == '\'' {
            self.string(ch)?
        } else if ch == '`' {
            self.template()?
        } else if ch == '/' && self.regex_allowed() {
            self.regex()?
        } else {
            self.punct(pos, ch)?
        };

        self.newline_pending = false;
        self.last_significant = Some(match &token {
            Token::Word(w) if is_keyword_operator(w) => LastToken::Operator,
            Token::Word(_) | Token::Str(_) | Token::Num(_) | Token::Template(_)
            | Token::Regex(_) => LastToken::Operand,
            Token::Punct(p) => match *p {
                ")" | "]" => LastToken::Operand,
                _ => LastToken::Operator,
            },
        });

        Ok(Some(Tok {
            token,
            pos,
            newline_before,
        }))
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.it.peek().cloned() {
                Some((_, c)) if c == '\n' => {
                    self.newline_pending = true;
                    self.it.next();
                }
                Some((_, c)) if c.is_whitespace() => {
                    self.it.next();
                }
                Some((i, '/')) => {
                    let mut ahead = self.input[i..].chars();
                    ahead.next();
                    match ahead.next() {
                        Some('/') => {
                            while let Some((_, c)) = self.it.peek().cloned() {
                                if c == '\n' {
                                    break;
                                }
                                self.it.next();
                            }
                        }
                        Some('*') => {
                            self.it.next();
                            self.it.next();
                            let mut closed = false;
                            while let Some((_, c)) = self.it.next() {
                                if c == '\n' {
                                    self.newline_pending = true;
                                }
                                if c == '*' {
                                    if let Some((_, '/')) = self.it.peek().cloned() {
                                        self.it.next();
                                        closed = true;
                                        break;
                                    }
                                }
                            }
                            if !closed {
                                return Err(self.error(i, LexErrorKind::UnterminatedComment));
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn word(&mut self) -> Token {
        let start = self.cur();
        while let Some((_, c)) = self.it.peek().cloned() {
            if is_id_continue(c) {
                self.it.next();
            } else {
                break;
            }
        }
        Token::Word(self.input[start..self.cur()].to_string())
    }

    fn number(&mut self) -> Result<Token, LexError> {
        let start = self.cur();
        let rest = &self.input[start..];
        if rest.starts_with("0x") || rest.starts_with("0X") {
            self.it.next();
            self.it.next();
            let digits = self.eat_while(|c| c.is_ascii_hexdigit());
            let val = u64::from_str_radix(&self.input[digits.0..digits.1], 16)
                .map_err(|_| self.error(start, LexErrorKind::InvalidNumber))?;
            return Ok(Token::Num(val as f64));
        }
        if rest.starts_with("0o") || rest.starts_with("0O") {
            self.it.next();
            self.it.next();
            let digits = self.eat_while(|c| ('0'..='7').contains(&c));
            let val = u64::from_str_radix(&self.input[digits.0..digits.1], 8)
                .map_err(|_| self.error(start, LexErrorKind::InvalidNumber))?;
            return Ok(Token::Num(val as f64));
        }
        if rest.starts_with("0b") || rest.starts_with("0B") {
            self.it.next();
            self.it.next();
            let digits = self.eat_while(|c| c == '0' || c == '1');
            let val = u64::from_str_radix(&self.input[digits.0..digits.1], 2)
                .map_err(|_| self.error(start, LexErrorKind::InvalidNumber))?;
            return Ok(Token::Num(val as f64));
        }

        self.eat_while(|c| c.is_ascii_digit());
        if let Some((_, '.')) = self.it.peek().cloned() {
            self.it.next();
            self.eat_while(|c| c.is_ascii_digit());
        }
        if let Some((_, c)) = self.it.peek().cloned() {
            if c == 'e' || c == 'E' {
                self.it.next();
                if let Some((_, s)) = self.it.peek().cloned() {
                    if s == '+' || s == '-' {
                        self.it.next();
                    }
                }
                let (ds, de) = self.eat_while(|c| c.is_ascii_digit());
                if ds == de {
                    return Err(self.error(start, LexErrorKind::InvalidNumber));
                }
            }
        }
        let src = &self.input[start..self.cur()];
        src.parse::<f64>()
            .map(Token::Num)
            .map_err(|_| self.error(start, LexErrorKind::InvalidNumber))
    }

    fn string(&mut self, quote: char) -> Result<Token, LexError> {
        let start = self.cur();
        self.it.next();
        let mut val = String::new();
        loop {
            match self.it.next() {
                Some((_, c)) if c == quote => return Ok(Token::Str(val)),
                Some((_, '\\')) => {
                    if let Some(c) = self.escape(start)? {
                        val.push(c);
                    }
                }
                Some((_, '\n')) | None => {
                    return Err(self.error(start, LexErrorKind::UnterminatedString))
                }
                Some((_, c)) => val.push(c),
            }
        }
    }

    /// Cooks one escape sequence after the backslash has been consumed.
    /// Returns `None` for a line continuation.
    fn escape(&mut self, err_pos: usize) -> Result<Option<char>, LexError> {
        let (i, c) = match self.it.next() {
            Some(p) => p,
            None => return Err(self.error(err_pos, LexErrorKind::UnexpectedEof)),
        };
        Ok(Some(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' => '\0',
            '\n' => return Ok(None),
            'x' => {
                let hi = self.hex_digit()?;
                let lo = self.hex_digit()?;
                char::from_u32(hi * 16 + lo)
                    .ok_or_else(|| self.error(i, LexErrorKind::InvalidUnicodeValue(hi * 16 + lo)))?
            }
            'u' => {
                if let Some((_, '{')) = self.it.peek().cloned() {
                    self.it.next();
                    let mut v: u32 = 0;
                    loop {
                        match self.it.peek().cloned() {
                            Some((_, '}')) => {
                                self.it.next();
                                break;
                            }
                            Some(_) => v = v * 16 + self.hex_digit()?,
                            None => return Err(self.error(i, LexErrorKind::UnexpectedEof)),
                        }
                    }
                    char::from_u32(v).ok_or_else(|| {
                        self.error(i, LexErrorKind::InvalidUnicodeValue(v))
                    })?
                } else {
                    let mut v: u32 = 0;
                    for _ in 0..4 {
                        v = v * 16 + self.hex_digit()?;
                    }
                    char::from_u32(v).ok_or_else(|| {
                        self.error(i, LexErrorKind::InvalidUnicodeValue(v))
                    })?
                }
            }
            c => c,
        }))
    }

    fn hex_digit(&mut self) -> Result<u32, LexError> {
        match self.it.next() {
            Some((_, c)) => {
                let pos = self.cur();
                c.to_digit(16)
                    .ok_or_else(|| self.error(pos, LexErrorKind::InvalidHexDigit(c)))
            }
            None => {
                let pos = self.cur();
                Err(self.error(pos, LexErrorKind::UnexpectedEof))
            }
        }
    }

    fn template(&mut self) -> Result<Token, LexError> {
        let start = self.cur();
        self.it.next();
        let mut parts = Vec::new();
        let mut chunk = String::new();
        loop {
            match self.it.next() {
                Some((_, '`')) => {
                    parts.push(TemplateRaw::Chunk(chunk));
                    return Ok(Token::Template(parts));
                }
                Some((_, '\\')) => {
                    if let Some(c) = self.escape(start)? {
                        chunk.push(c);
                    }
                }
                Some((i, '$')) => {
                    if let Some((_, '{')) = self.it.peek().cloned() {
                        self.it.next();
                        parts.push(TemplateRaw::Chunk(std::mem::take(&mut chunk)));
                        parts.push(TemplateRaw::Expr(self.template_substitution(i)?));
                    } else {
                        chunk.push('$');
                    }
                }
                Some((_, c)) => chunk.push(c),
                None => return Err(self.error(start, LexErrorKind::UnterminatedTemplate)),
            }
        }
    }

    /// Collects the raw source of a `${...}` substitution, tracking nested
    /// braces, strings and templates so the closing brace is found correctly.
    fn template_substitution(&mut self, err_pos: usize) -> Result<String, LexError> {
        let start = self.cur();
        let mut depth = 0usize;
        loop {
            match self.it.peek().cloned() {
                Some((i, '}')) if depth == 0 => {
                    self.it.next();
                    return Ok(self.input[start..i].to_string());
                }
                Some((_, '}')) => {
                    depth -= 1;
                    self.it.next();
                }
                Some((_, '{')) => {
                    depth += 1;
                    self.it.next();
                }
                Some((_, q)) if q == '"' || q == '\'' => {
                    self.string(q)?;
                }
                Some((_, '`')) => {
                    self.template()?;
                }
                Some(_) => {
                    self.it.next();
                }
                None => return Err(self.error(err_pos, LexErrorKind::UnterminatedTemplate)),
            }
        }
    }

    fn regex(&mut self) -> Result<Token, LexError> {
        let start = self.cur();
        self.it.next();
        let mut in_class = false;
        loop {
            match self.it.next() {
                Some((_, '\\')) => {
                    self.it.next();
                }
                Some((_, '[')) => in_class = true,
                Some((_, ']')) => in_class = false,
                Some((_, '/')) if !in_class => break,
                Some((_, '\n')) | None => {
                    return Err(self.error(start, LexErrorKind::UnterminatedRegex))
                }
                Some(_) => {}
            }
        }
        self.eat_while(is_id_continue);
        Ok(Token::Regex(self.input[start..self.cur()].to_string()))
    }

    fn punct(&mut self, pos: usize, ch: char) -> Result<Token, LexError> {
        // Longest-match against the punctuator table.
        const PUNCTS: &[&str] = &[
            ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "=>", "==", "!=", "<=",
            ">=", "&&", "||", "??", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
            "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*",
            "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".",
        ];
        let rest = &self.input[pos..];
        for p in PUNCTS {
            if rest.starts_with(p) {
                for _ in 0..p.chars().count() {
                    self.it.next();
                }
                return Ok(Token::Punct(p));
            }
        }
        Err(self.error(pos, LexErrorKind::Unexpected(ch)))
    }

    fn regex_allowed(&self) -> bool {
        match self.last_significant {
            None => true,
            Some(LastToken::Operator) => true,
            Some(LastToken::Operand) => false,
        }
    }

    fn peek2_is_digit(&mut self) -> bool {
        let mut chars = self.input[self.cur()..].chars();
        chars.next();
        matches!(chars.next(), Some(c) if c.is_ascii_digit())
    }

    fn eat_while(&mut self, f: impl Fn(char) -> bool) -> (usize, usize) {
        let start = self.cur();
        while let Some((_, c)) = self.it.peek().cloned() {
            if f(c) {
                self.it.next();
            } else {
                break;
            }
        }
        (start, self.cur())
    }

    fn cur(&mut self) -> usize {
        match self.it.peek() {
            Some((i, _)) => *i,
            None => self.input.len(),
        }
    }

    fn error(&mut self, pos: usize, kind: LexErrorKind) -> LexError {
        let (line, col) = line_col(self.input, pos);
        LexError {
            inner: Box::new(LexErrorInner { line, col, kind }),
        }
    }
}

/// Computes a zero-indexed line/column pair for a byte offset.
pub fn line_col(input: &str, pos: usize) -> (usize, usize) {
    let mut cur = 0;
    for (i, line) in input.split_terminator('\n').enumerate() {
        if cur + line.len() + 1 > pos {
            return (i, input[cur..pos].chars().count());
        }
        cur += line.len() + 1;
    }
    (input.lines().count(), 0)
}

fn is_id_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

fn is_id_continue(c: char) -> bool {
    is_id_start(c) || c.is_ascii_digit()
}

fn is_keyword_operator(word: &str) -> bool {
    REGEX_PRECEDING_KEYWORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(input: &str) -> Vec<Token> {
        Lexer::tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn words_and_puncts() {
        assert_eq!(
            toks("const x = a => a;"),
            vec![
                Token::Word("const".to_string()),
                Token::Word("x".to_string()),
                Token::Punct("="),
                Token::Word("a".to_string()),
                Token::Punct("=>"),
                Token::Word("a".to_string()),
                Token::Punct(";"),
            ]
        );
    }

    #[test]
    fn strings_cook_escapes() {
        assert_eq!(
            toks(r#"'a\n\x41B'"#),
            vec![Token::Str("a\nAB".to_string())]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(toks("0x10 1.5 2e3"), vec![
            Token::Num(16.0),
            Token::Num(1.5),
            Token::Num(2000.0),
        ]);
    }

    #[test]
    fn regex_vs_divide() {
        assert_eq!(toks("a / b"), vec![
            Token::Word("a".to_string()),
            Token::Punct("/"),
            Token::Word("b".to_string()),
        ]);
        assert_eq!(toks("= /a[/]b/g"), vec![
            Token::Punct("="),
            Token::Regex("/a[/]b/g".to_string()),
        ]);
    }

    #[test]
    fn newline_flags() {
        let toks = Lexer::tokenize("a\nb c").unwrap();
        assert!(!toks[0].newline_before);
        assert!(toks[1].newline_before);
        assert!(!toks[2].newline_before);
    }

    #[test]
    fn template_parts() {
        let toks = Lexer::tokenize("`a${x + 1}b`").unwrap();
        assert_eq!(
            toks[0].token,
            Token::Template(vec![
                TemplateRaw::Chunk("a".to_string()),
                TemplateRaw::Expr("x + 1".to_string()),
                TemplateRaw::Chunk("b".to_string()),
            ])
        );
    }
}
