use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineStyle {
    Plain,
    Bold,
    Italic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSpan {
    pub text: String,
    pub style: InlineStyle,
}

impl InlineSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: InlineStyle::Plain,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: InlineStyle::Bold,
        }
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: InlineStyle::Italic,
        }
    }
}

/// One renderable unit of formatted response content.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: u8, text: String },
    Paragraph { spans: Vec<InlineSpan> },
    BulletItem(String),
    NumberedItem(String),
    CodeBlock(String),
    Spacer,
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    SourceList {
        entries: Vec<(String, String)>,
    },
}

fn delimiter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,\t]| {2,}").expect("valid regex"))
}

fn numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d+)?$").expect("valid regex"))
}

fn spaces_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" {2,}").expect("valid regex"))
}

fn numbered_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\s").expect("valid regex"))
}

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"))
}

fn italic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*(.+?)\*").expect("valid regex"))
}

/// Split a line on comma, tab, or a run of 2+ spaces, dropping empty tokens.
fn tokenize(line: &str) -> Vec<&str> {
    delimiter_re()
        .split(line)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Heuristic: should this response text render as a table?
///
/// Pipe anywhere means a markdown-style table. Otherwise the first two
/// non-blank lines must tokenize into the same number of columns (at least
/// two), and some token somewhere must look numeric. Delimited text with no
/// numeric token at all stays prose.
pub fn is_table(text: &str) -> bool {
    if text.contains('|') && text.lines().any(|line| line.contains('|')) {
        return true;
    }

    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return false;
    }

    let first = tokenize(lines[0]);
    let second = tokenize(lines[1]);
    if first.len() != second.len() || first.len() < 2 {
        return false;
    }

    lines
        .iter()
        .any(|line| tokenize(line).iter().any(|t| numeric_re().is_match(t)))
}

/// Format one message body into display blocks, choosing the table or the
/// regular-text path. Pure: the same input always yields the same blocks.
pub fn format_message(content: &str) -> Vec<Block> {
    if is_table(content) {
        render_table(content)
    } else {
        render_text(content)
    }
}

pub fn render_table(text: &str) -> Vec<Block> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

    if lines.iter().any(|l| l.contains('|')) {
        render_pipe_table(&lines)
    } else {
        render_delimited_table(&lines)
    }
}

/// Split a markdown table line into cells, tolerating leading/trailing pipes
/// by discarding empty cells.
fn split_pipe_row(line: &str) -> Vec<String> {
    line.split('|')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// A separator line has nothing but dashes, colons and whitespace once the
/// pipes are stripped.
fn is_separator_row(line: &str) -> bool {
    let body: String = line.chars().filter(|c| *c != '|').collect();
    !body.trim().is_empty() && body.chars().all(|c| c == '-' || c == ':' || c.is_whitespace())
}

fn render_pipe_table(lines: &[&str]) -> Vec<Block> {
    let mut blocks = Vec::new();

    let first_pipe = lines.iter().position(|l| l.contains('|')).unwrap_or(0);
    if first_pipe > 0 {
        // Anything before the table region passes through untouched.
        let leading = lines[..first_pipe].join("\n");
        blocks.push(Block::Paragraph {
            spans: vec![InlineSpan::plain(leading)],
        });
    }

    let table_lines: Vec<&str> = lines[first_pipe..]
        .iter()
        .filter(|l| l.contains('|'))
        .copied()
        .collect();

    let headers = match table_lines.first() {
        Some(line) => split_pipe_row(line),
        None => return blocks,
    };

    let data_start = if table_lines.len() > 1 && is_separator_row(table_lines[1]) {
        2
    } else {
        1
    };

    let rows = table_lines[data_start..]
        .iter()
        .map(|line| {
            split_pipe_row(line)
                .iter()
                .map(|cell| format_cell(cell))
                .collect()
        })
        .collect();

    blocks.push(Block::Table { headers, rows });
    blocks
}

#[derive(Debug, Clone, Copy)]
enum Delimiter {
    Tab,
    Spaces,
    Comma,
}

impl Delimiter {
    /// Pick one delimiter for the whole block from the first line: tab wins,
    /// then a run of 2+ spaces when no comma is present, comma by default.
    fn detect(first_line: &str) -> Self {
        if first_line.contains('\t') {
            Delimiter::Tab
        } else if !first_line.contains(',') && spaces_run_re().is_match(first_line) {
            Delimiter::Spaces
        } else {
            Delimiter::Comma
        }
    }

    fn split(self, line: &str) -> Vec<String> {
        let cells: Vec<&str> = match self {
            Delimiter::Tab => line.split('\t').collect(),
            Delimiter::Spaces => spaces_run_re().split(line).collect(),
            Delimiter::Comma => line.split(',').collect(),
        };
        cells.into_iter().map(|c| c.trim().to_string()).collect()
    }
}

fn render_delimited_table(lines: &[&str]) -> Vec<Block> {
    let first = match lines.first() {
        Some(line) => *line,
        None => return Vec::new(),
    };

    let delimiter = Delimiter::detect(first);
    let headers = delimiter.split(first);
    let rows = lines[1..]
        .iter()
        .map(|line| {
            delimiter
                .split(line)
                .iter()
                .map(|cell| format_cell(cell))
                .collect()
        })
        .collect();

    vec![Block::Table { headers, rows }]
}

/// Numeric cells get thousands grouping; anything else renders trimmed as-is.
fn format_cell(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => group_thousands(n),
        _ => trimmed.to_string(),
    }
}

fn group_thousands(n: f64) -> String {
    let s = n.to_string();
    // Scientific notation falls outside grouping; leave it alone.
    if s.contains('e') || s.contains('E') {
        return s;
    }

    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (rest, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

pub fn render_text(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut in_code = false;
    let mut code = String::new();

    for line in text.lines() {
        if line.starts_with("```") {
            if in_code {
                blocks.push(flush_code(&mut code));
                in_code = false;
            } else {
                in_code = true;
            }
            continue;
        }

        if in_code {
            code.push_str(line);
            code.push('\n');
            continue;
        }

        let trimmed = line.trim();
        if trimmed.starts_with("- ") || trimmed.starts_with("* ") {
            blocks.push(Block::BulletItem(trimmed[2..].to_string()));
        } else if let Some(m) = numbered_re().find(trimmed) {
            blocks.push(Block::NumberedItem(trimmed[m.end()..].to_string()));
        } else if let Some(rest) = line.strip_prefix("### ") {
            blocks.push(Block::Heading {
                level: 3,
                text: rest.to_string(),
            });
        } else if let Some(rest) = line.strip_prefix("## ") {
            blocks.push(Block::Heading {
                level: 2,
                text: rest.to_string(),
            });
        } else if let Some(rest) = line.strip_prefix("# ") {
            blocks.push(Block::Heading {
                level: 1,
                text: rest.to_string(),
            });
        } else if !trimmed.is_empty() {
            blocks.push(Block::Paragraph {
                spans: parse_inline(line),
            });
        } else {
            blocks.push(Block::Spacer);
        }
    }

    // An unterminated fence is tolerated: flush whatever accumulated.
    if in_code {
        blocks.push(flush_code(&mut code));
    }

    blocks
}

fn flush_code(code: &mut String) -> Block {
    let body = std::mem::take(code);
    Block::CodeBlock(body.trim_end_matches('\n').to_string())
}

/// Apply the two inline emphasis substitutions: `**x**` first, then `*x*` on
/// the remaining plain stretches. Bold content is never re-scanned, so the
/// passes cannot mis-nest; unmatched markers stay literal.
fn parse_inline(text: &str) -> Vec<InlineSpan> {
    let mut spans = Vec::new();
    let mut last = 0;

    for m in bold_re().find_iter(text) {
        if m.start() > last {
            italic_pass(&text[last..m.start()], &mut spans);
        }
        spans.push(InlineSpan::bold(&text[m.start() + 2..m.end() - 2]));
        last = m.end();
    }
    if last < text.len() {
        italic_pass(&text[last..], &mut spans);
    }

    spans
}

fn italic_pass(text: &str, out: &mut Vec<InlineSpan>) {
    let mut last = 0;

    for m in italic_re().find_iter(text) {
        if m.start() > last {
            out.push(InlineSpan::plain(&text[last..m.start()]));
        }
        out.push(InlineSpan::italic(&text[m.start() + 1..m.end() - 1]));
        last = m.end();
    }
    if last < text.len() {
        out.push(InlineSpan::plain(&text[last..]));
    }
}

/// Build the source-citation block, if the response carried any sources.
pub fn render_sources(sources: &BTreeMap<String, Value>) -> Option<Block> {
    if sources.is_empty() {
        return None;
    }

    let entries = sources
        .iter()
        .map(|(key, value)| (key.clone(), source_value_text(value)))
        .collect();

    Some(Block::SourceList { entries })
}

fn source_value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
        other => other.to_string(),
    }
}
