//! Statement splitter
//!
//! Splits Oracle script text into statements following the SQL*Plus
//! conventions:
//! - `;` ends a SQL statement (the `;` is not part of the statement)
//! - PL/SQL units (`BEGIN`, `DECLARE`, `CREATE [OR REPLACE] PROCEDURE` and
//!   friends) keep their inner `;` and end at a line holding only `/`
//! - a line holding only `/` also ends any other pending statement
//! - quotes, `q'[...]'` literals and comments are never split inside
//! - SQL*Plus directives (`SET`, `SPOOL`, `PROMPT`, ...) are skipped
//!
//! Splitting never fails. Input that does not follow the conventions ends up
//! as one larger statement, and the database reports what is wrong with it.

/// One executable unit of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based position in the script
    pub index: usize,
    pub sql: String,
    /// Line the statement starts on
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexical {
    Code,
    SingleQuote,
    QuotedIdent,
    /// Inside `q'<open> ... <close>'`
    QQuote(char),
    LineComment,
    BlockComment,
}

struct Splitter {
    statements: Vec<Statement>,
    current: String,
    started: bool,
    start_line: usize,
    state: Lexical,
}

/// Splits `text` into statements in source order
pub fn split_script(text: &str) -> Vec<Statement> {
    let mut splitter = Splitter {
        statements: Vec::new(),
        current: String::new(),
        started: false,
        start_line: 1,
        state: Lexical::Code,
    };

    for (n, line) in text.split_inclusive('\n').enumerate() {
        splitter.feed_line(n + 1, line);
    }

    splitter.finish()
}

impl Splitter {
    fn feed_line(&mut self, line_no: usize, line: &str) {
        let trimmed = line.trim();

        if self.state == Lexical::Code {
            if trimmed == "/" {
                self.push();
                return;
            }
            if !self.started && (trimmed.is_empty() || is_sqlplus_directive(trimmed)) {
                return;
            }
        }

        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            if !self.started && !c.is_whitespace() {
                self.started = true;
                self.start_line = line_no;
            }

            match self.state {
                Lexical::Code => {
                    if c == '-' && next == Some('-') {
                        self.state = Lexical::LineComment;
                        self.current.push_str("--");
                        i += 2;
                        continue;
                    }
                    if c == '/' && next == Some('*') {
                        self.state = Lexical::BlockComment;
                        self.current.push_str("/*");
                        i += 2;
                        continue;
                    }
                    if matches!(c, 'q' | 'Q') && next == Some('\'') && self.q_quote_allowed() {
                        if let Some(&open) = chars.get(i + 2) {
                            self.state = Lexical::QQuote(closing_delimiter(open));
                            self.current.push(c);
                            self.current.push('\'');
                            self.current.push(open);
                            i += 3;
                            continue;
                        }
                    }
                    match c {
                        '\'' => self.state = Lexical::SingleQuote,
                        '"' => self.state = Lexical::QuotedIdent,
                        ';' if !is_plsql_unit(&self.current) => {
                            self.push();
                            i += 1;
                            continue;
                        }
                        _ => {}
                    }
                    self.current.push(c);
                }
                Lexical::SingleQuote => {
                    self.current.push(c);
                    if c == '\'' {
                        // '' is an escaped quote
                        if next == Some('\'') {
                            self.current.push('\'');
                            i += 2;
                            continue;
                        }
                        self.state = Lexical::Code;
                    }
                }
                Lexical::QuotedIdent => {
                    self.current.push(c);
                    if c == '"' {
                        self.state = Lexical::Code;
                    }
                }
                Lexical::QQuote(close) => {
                    self.current.push(c);
                    if c == close && next == Some('\'') {
                        self.current.push('\'');
                        self.state = Lexical::Code;
                        i += 2;
                        continue;
                    }
                }
                Lexical::LineComment => {
                    self.current.push(c);
                    if c == '\n' {
                        self.state = Lexical::Code;
                    }
                }
                Lexical::BlockComment => {
                    self.current.push(c);
                    if c == '*' && next == Some('/') {
                        self.current.push('/');
                        self.state = Lexical::Code;
                        i += 2;
                        continue;
                    }
                }
            }

            i += 1;
        }
    }

    /// `q'` opens a literal only at a word start, or after an `N` prefix
    fn q_quote_allowed(&self) -> bool {
        let mut tail = self.current.chars().rev();
        match tail.next() {
            None => true,
            Some(c) if !is_ident_char(c) => true,
            Some('n' | 'N') => !tail.next().is_some_and(is_ident_char),
            Some(_) => false,
        }
    }

    fn push(&mut self) {
        let text = std::mem::take(&mut self.current);
        self.started = false;
        self.state = Lexical::Code;

        let sql = strip_leading_comments(&text).trim();
        if sql.is_empty() {
            return;
        }

        self.statements.push(Statement {
            index: self.statements.len() + 1,
            sql: sql.to_string(),
            line: self.start_line,
        });
    }

    fn finish(mut self) -> Vec<Statement> {
        self.push();
        self.statements
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '#')
}

fn closing_delimiter(open: char) -> char {
    match open {
        '[' => ']',
        '{' => '}',
        '(' => ')',
        '<' => '>',
        other => other,
    }
}

/// Skips whitespace and comments at the start of `text`
fn strip_leading_comments(mut text: &str) -> &str {
    loop {
        text = text.trim_start();
        if let Some(rest) = text.strip_prefix("--") {
            text = rest.split_once('\n').map_or("", |(_, after)| after);
        } else if let Some(rest) = text.strip_prefix("/*") {
            text = rest.split_once("*/").map_or("", |(_, after)| after);
        } else {
            return text;
        }
    }
}

/// First few words of a statement, upper-cased
fn leading_words(text: &str, count: usize) -> Vec<String> {
    strip_leading_comments(text)
        .split(|c: char| !is_ident_char(c))
        .filter(|word| !word.is_empty())
        .take(count)
        .map(|word| word.to_ascii_uppercase())
        .collect()
}

/// Whether the pending statement is a PL/SQL unit, whose `;` do not split
fn is_plsql_unit(text: &str) -> bool {
    let words = leading_words(text, 6);
    let mut words = words.iter().map(String::as_str);

    match words.next() {
        Some("BEGIN" | "DECLARE") => true,
        Some("CREATE") => {
            let mut word = words.next();
            if word == Some("OR") {
                words.next(); // REPLACE
                word = words.next();
            }
            if matches!(word, Some("EDITIONABLE" | "NONEDITIONABLE")) {
                word = words.next();
            }
            matches!(
                word,
                Some("PROCEDURE" | "FUNCTION" | "PACKAGE" | "TRIGGER" | "TYPE" | "LIBRARY")
            )
        }
        _ => false,
    }
}

/// SQL*Plus commands that have no meaning to the database
fn is_sqlplus_directive(line: &str) -> bool {
    let words = leading_words(line, 2);
    match words.first().map(String::as_str) {
        Some("SPOOL" | "PROMPT" | "WHENEVER" | "EXIT" | "QUIT" | "REM" | "REMARK") => true,
        // SET TRANSACTION, SET ROLE and SET CONSTRAINT(S) are SQL
        Some("SET") => !matches!(
            words.get(1).map(String::as_str),
            Some("TRANSACTION" | "ROLE" | "CONSTRAINT" | "CONSTRAINTS")
        ),
        _ => false,
    }
}
