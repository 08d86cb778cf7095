use std::fmt::{Display, Formatter};

use chrono::{NaiveDate, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp { Eq, Ne, Gt, Ge, Lt, Le }

impl CompOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompOp::Eq => "==",
            CompOp::Ne => "!=",
            CompOp::Gt => ">",
            CompOp::Ge => ">=",
            CompOp::Lt => "<",
            CompOp::Le => "<=",
        }
    }
}

impl Display for CompOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar literal produced by the CASE and filter grammars.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Literal {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Literal::Int(_) | Literal::Float(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Int(_) => "integer",
            Literal::Float(_) => "float",
            Literal::Text(_) => "text",
            Literal::DateTime(_) => "datetime",
        }
    }

    /// Text rendering used when a literal has to live in a text column.
    pub fn render_text(&self) -> String {
        match self {
            Literal::Int(i) => i.to_string(),
            Literal::Float(x) => format!("{:?}", x),
            Literal::Text(s) => s.clone(),
            Literal::DateTime(dt) => render_iso(dt),
        }
    }
}

/// Quoted literals use doubled single quotes for escaping, numerals print bare.
impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            other => f.write_str(&other.render_text()),
        }
    }
}

/// ISO-8601 text form; the time part is dropped for midnight values.
pub fn render_iso(dt: &NaiveDateTime) -> String {
    if dt.time() == chrono::NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Parse an ISO-8601 date or date-time literal (`YYYY-MM-DD`, with an optional
/// `T` or space separated `HH:MM[:SS[.fff]]` part).
pub fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) { return Some(dt); }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(|d| d.and_time(chrono::NaiveTime::MIN))
}

/// `<column> <op> <literal>` over a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub column: String,
    pub op: CompOp,
    pub value: Literal,
}

impl Comparison {
    pub fn with_column(&self, column: String) -> Self {
        Self { column, op: self.op, value: self.value.clone() }
    }
}

/// Parsed `CASE WHEN [col] op value THEN value ELSE value END FROM table`.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRule {
    pub column: String,
    pub op: CompOp,
    pub comparison: Literal,
    pub then_value: Literal,
    pub else_value: Literal,
    pub table: String,
}

impl Display for CaseRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CASE WHEN [{}] {} {} THEN {} ELSE {} END FROM {}",
            self.column, self.op, self.comparison, self.then_value, self.else_value, self.table
        )
    }
}

/// Minimal cursor over a statement's characters shared by the hand-written grammars.
pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(src: &'a str) -> Self { Self { src, pos: 0 } }

    pub(crate) fn rest(&self) -> &'a str { &self.src[self.pos..] }

    pub(crate) fn at_end(&self) -> bool { self.pos >= self.src.len() }

    pub(crate) fn peek(&self) -> Option<char> { self.rest().chars().next() }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    pub(crate) fn skip_ws(&mut self) -> usize {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() { break; }
            self.pos += ch.len_utf8();
        }
        self.pos - start
    }

    /// Consume `kw` case-insensitively. The keyword must not run into a following identifier character.
    pub(crate) fn eat_keyword(&mut self, kw: &str) -> bool {
        let rest = self.rest();
        if rest.len() < kw.len() || !rest.is_char_boundary(kw.len()) { return false; }
        if !rest[..kw.len()].eq_ignore_ascii_case(kw) { return false; }
        let next = rest[kw.len()..].chars().next();
        if next.map(|c| c.is_alphanumeric() || c == '_').unwrap_or(false) { return false; }
        self.pos += kw.len();
        true
    }

    pub(crate) fn eat_char(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) { self.pos += ch.len_utf8(); true } else { false }
    }

    /// Longest-match operator at the cursor.
    pub(crate) fn eat_op(&mut self) -> Option<CompOp> {
        let rest = self.rest();
        let (op, len) = if rest.starts_with(">=") { (CompOp::Ge, 2) }
            else if rest.starts_with("<=") { (CompOp::Le, 2) }
            else if rest.starts_with("==") { (CompOp::Eq, 2) }
            else if rest.starts_with("!=") { (CompOp::Ne, 2) }
            else if rest.starts_with('>') { (CompOp::Gt, 1) }
            else if rest.starts_with('<') { (CompOp::Lt, 1) }
            else { return None };
        self.pos += len;
        Some(op)
    }

    pub(crate) fn take_while<F: Fn(char) -> bool>(&mut self, pred: F) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !pred(ch) { break; }
            self.pos += ch.len_utf8();
        }
        &self.src[start..self.pos]
    }
}

/// Byte offset of the first comparison operator in `s`, with its length.
pub(crate) fn find_operator(s: &str) -> Option<(usize, usize, CompOp)> {
    let bytes = s.as_bytes();
    for i in 0..bytes.len() {
        let two = if i + 1 < bytes.len() { &bytes[i..i + 2] } else { &bytes[i..i + 1] };
        match two {
            b">=" => return Some((i, 2, CompOp::Ge)),
            b"<=" => return Some((i, 2, CompOp::Le)),
            b"==" => return Some((i, 2, CompOp::Eq)),
            b"!=" => return Some((i, 2, CompOp::Ne)),
            _ => {}
        }
        match bytes[i] {
            b'>' => return Some((i, 1, CompOp::Gt)),
            b'<' => return Some((i, 1, CompOp::Lt)),
            _ => {}
        }
    }
    None
}
