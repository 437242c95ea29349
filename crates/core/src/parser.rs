use crate::{ExpansionError, ResultRow};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::{Captures, Regex};
use std::fmt::Display;

pub const AGGREGATE_ROOT: &str = "examples";

const RESPONSE: &[u8] = b"response";
const QUERY: &[u8] = b"query";
const ALTERNATE_QUERIES: &[u8] = b"alternate_queries";
const ALTERNATE_QUERY: &[u8] = b"alternate_query";
const THOUGHT_PROCESS: &[u8] = b"thought_process";

pub fn aggregate_completions<I, S>(completions: I) -> Result<String, ExpansionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut document = format!("<{AGGREGATE_ROOT}>");
    for completion in completions {
        document.push_str(completion.as_ref());
    }
    document.push_str(&format!("</{AGGREGATE_ROOT}>"));

    let document = document.replace(['\n', '\r'], "");
    escape_bare_ampersands(&document)
}

pub fn escape_bare_ampersands(text: &str) -> Result<String, ExpansionError> {
    // CDATA sections and the predefined or numeric references pass through untouched.
    let pattern = Regex::new(
        r"(?s)<!\[CDATA\[.*?\]\]>|&(?:amp|lt|gt|quot|apos|#[0-9]+|#x[0-9A-Fa-f]+);|&",
    )?;
    let escaped = pattern.replace_all(text, |captures: &Captures| {
        let matched = &captures[0];
        if matched == "&" {
            "&amp;".to_string()
        } else {
            matched.to_string()
        }
    });
    Ok(escaped.into_owned())
}

pub fn validate_document(xml: &str) -> Result<(), ExpansionError> {
    parse_rows(xml).map(|_| ())
}

// Rows come from `<response>` children of the root, or from a `<response>` root.
pub fn parse_rows(xml: &str) -> Result<Vec<ResultRow>, ExpansionError> {
    let mut reader = Reader::from_str(xml);
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut rows = Vec::new();
    let mut current: Option<RowBuilder> = None;
    let mut root_closed = false;
    let mut saw_root = false;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event()
            .map_err(|error| xml_error(position, error))?;

        match event {
            Event::Start(start) => {
                if root_closed {
                    return Err(xml_error(position, "multiple root elements"));
                }
                saw_root = true;
                let name = start.name().as_ref().to_vec();

                let starts_row = name == RESPONSE && open.len() <= 1;
                open.push(name);

                if starts_row {
                    current = Some(RowBuilder::default());
                } else if let Some(builder) = current.as_mut() {
                    if builder.active.is_none() {
                        if let Some(field) = field_of(&open) {
                            builder.open_field(field, open.len());
                        }
                    }
                }
            }
            Event::Empty(empty) => {
                if root_closed {
                    return Err(xml_error(position, "multiple root elements"));
                }
                let name = empty.name().as_ref().to_vec();

                if open.is_empty() {
                    saw_root = true;
                    root_closed = true;
                    if name == RESPONSE {
                        rows.push(ResultRow::default());
                    }
                } else if name == RESPONSE && open.len() == 1 {
                    rows.push(ResultRow::default());
                } else if let Some(builder) = current.as_mut() {
                    if builder.active.is_none() {
                        open.push(name);
                        if let Some(field) = field_of(&open) {
                            builder.open_field(field, open.len());
                            builder.close_field(open.len());
                        }
                        open.pop();
                    }
                }
            }
            Event::End(end) => {
                let name = end.name().as_ref().to_vec();
                let depth = open.len();
                match open.pop() {
                    Some(expected) if expected == name => {}
                    Some(expected) => {
                        return Err(xml_error(
                            position,
                            format!(
                                "expected </{}>, found </{}>",
                                String::from_utf8_lossy(&expected),
                                String::from_utf8_lossy(&name)
                            ),
                        ))
                    }
                    None => {
                        return Err(xml_error(
                            position,
                            format!("unmatched </{}>", String::from_utf8_lossy(&name)),
                        ))
                    }
                }

                if name == RESPONSE && open.len() <= 1 {
                    if let Some(builder) = current.take() {
                        rows.push(builder.finish());
                    }
                } else if let Some(builder) = current.as_mut() {
                    builder.close_field(depth);
                }

                if open.is_empty() {
                    root_closed = true;
                }
            }
            Event::Text(text) => {
                let unescaped = text
                    .unescape()
                    .map_err(|error| xml_error(position, error))?;
                if open.is_empty() {
                    if !unescaped.trim().is_empty() {
                        return Err(xml_error(position, "text outside of the root element"));
                    }
                    continue;
                }
                if let Some(builder) = current.as_mut() {
                    builder.push_text(&unescaped);
                }
            }
            Event::CData(data) => {
                if open.is_empty() {
                    return Err(xml_error(position, "cdata outside of the root element"));
                }
                if let Some(builder) = current.as_mut() {
                    builder.push_text(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(xml_error(
            reader.buffer_position() as u64,
            format!("unclosed <{}>", String::from_utf8_lossy(unclosed)),
        ));
    }
    if !saw_root {
        return Err(xml_error(0, "document has no root element"));
    }

    Ok(rows)
}

fn xml_error(position: u64, details: impl Display) -> ExpansionError {
    ExpansionError::XmlParse {
        position,
        details: details.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Query,
    AlternateQuery,
    ThoughtProcess,
}

fn field_of(open: &[Vec<u8>]) -> Option<Field> {
    let response_at = open.iter().rposition(|name| name == RESPONSE)?;
    if response_at > 1 {
        return None;
    }

    match &open[response_at + 1..] {
        [name] if name == QUERY => Some(Field::Query),
        [name] if name == THOUGHT_PROCESS => Some(Field::ThoughtProcess),
        [parent, name] if parent == ALTERNATE_QUERIES && name == ALTERNATE_QUERY => {
            Some(Field::AlternateQuery)
        }
        _ => None,
    }
}

#[derive(Debug, Default)]
struct RowBuilder {
    query: Option<String>,
    alternate_queries: Vec<String>,
    thought_process: Option<String>,
    // Field being collected and the depth of its element; nested markup adds to it.
    active: Option<(Field, usize)>,
    buffer: String,
}

impl RowBuilder {
    fn open_field(&mut self, field: Field, depth: usize) {
        self.active = Some((field, depth));
        self.buffer.clear();
    }

    fn push_text(&mut self, text: &str) {
        if self.active.is_some() {
            self.buffer.push_str(text);
        }
    }

    fn close_field(&mut self, depth: usize) {
        let field = match self.active {
            Some((field, active_depth)) if active_depth == depth => field,
            _ => return,
        };
        self.active = None;
        let value = self.buffer.trim().to_string();
        self.buffer.clear();

        match field {
            Field::Query => {
                self.query.get_or_insert(value);
            }
            Field::ThoughtProcess => {
                self.thought_process.get_or_insert(value);
            }
            Field::AlternateQuery => self.alternate_queries.push(value),
        }
    }

    fn finish(self) -> ResultRow {
        ResultRow {
            query: self.query.unwrap_or_default(),
            alternate_queries: self.alternate_queries,
            thought_process: self.thought_process.unwrap_or_default(),
        }
    }
}
