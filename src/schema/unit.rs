use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Physical unit attached to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    /// The schema declares no unit.
    #[default]
    Unknown,
    /// `unitless`, `dimensionless` or an empty unit string.
    Dimensionless,
    /// A syntactically valid unit expression such as `N*m` or `m s-2`.
    Named(String),
}

impl Unit {
    /// Parses a schema unit string; `None` when the expression is malformed.
    pub fn parse(text: &str) -> Option<Unit> {
        let trimmed = text.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("unitless")
            || trimmed.eq_ignore_ascii_case("dimensionless")
        {
            return Some(Unit::Dimensionless);
        }
        let mut parser = UnitParser {
            chars: trimmed.chars().peekable(),
        };
        if parser.expr() && parser.chars.peek().is_none() {
            Some(Unit::Named(trimmed.to_string()))
        } else {
            None
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Unit::Unknown)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Unknown => f.write_str("unknown"),
            Unit::Dimensionless => f.write_str("dimensionless"),
            Unit::Named(name) => f.write_str(name),
        }
    }
}

/// Recursive-descent check of the unit grammar:
///
/// ```text
/// expr   := term ((op | ' ') term)*
/// op     := '*' | '/' | '.'
/// term   := factor [('^' | '**') int | int]
/// factor := name | number | '(' expr ')'
/// ```
struct UnitParser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl UnitParser<'_> {
    fn expr(&mut self) -> bool {
        if !self.term() {
            return false;
        }
        loop {
            let spaced = self.skip_spaces();
            match self.chars.peek().copied() {
                None | Some(')') => return true,
                Some('*') | Some('/') | Some('.') => {
                    self.chars.next();
                    // `**` directly after a term is an exponent, handled in term().
                    self.skip_spaces();
                    if !self.term() {
                        return false;
                    }
                }
                Some(_) if spaced => {
                    if !self.term() {
                        return false;
                    }
                }
                Some(_) => return false,
            }
        }
    }

    fn term(&mut self) -> bool {
        let is_name = match self.chars.peek().copied() {
            Some('(') => {
                self.chars.next();
                self.skip_spaces();
                if !self.expr() {
                    return false;
                }
                if self.chars.next() != Some(')') {
                    return false;
                }
                false
            }
            Some(c) if c.is_ascii_digit() => {
                self.number();
                false
            }
            Some(c) if is_name_char(c) => {
                while self.chars.peek().copied().is_some_and(is_name_char) {
                    self.chars.next();
                }
                true
            }
            _ => return false,
        };

        match self.chars.peek().copied() {
            Some('^') => {
                self.chars.next();
                self.signed_int()
            }
            Some('*') => {
                let mut lookahead = self.chars.clone();
                lookahead.next();
                if lookahead.peek() == Some(&'*') {
                    self.chars.next();
                    self.chars.next();
                    self.signed_int()
                } else {
                    true
                }
            }
            Some(c) if is_name && (c.is_ascii_digit() || c == '-' || c == '+') => {
                self.signed_int()
            }
            _ => true,
        }
    }

    fn number(&mut self) {
        while self
            .chars
            .peek()
            .is_some_and(|c| c.is_ascii_digit())
        {
            self.chars.next();
        }
    }

    fn signed_int(&mut self) -> bool {
        if matches!(self.chars.peek(), Some('-') | Some('+')) {
            self.chars.next();
        }
        let mut digits = 0;
        while self.chars.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.chars.next();
            digits += 1;
        }
        digits > 0
    }

    fn skip_spaces(&mut self) -> bool {
        let mut skipped = false;
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
            skipped = true;
        }
        skipped
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphabetic() || c == '%' || c == '°' || c == '_'
}
