//! Markdown API definition parser
//!
//! A markdown definition is a sequence of headed sections:
//!
//! ```markdown
//! # API Name
//! weather
//!
//! ## URL
//! https://api.example.com/v1/current
//!
//! ## Parameters
//! | Name | Type   | Required | Description |
//! |------|--------|----------|-------------|
//! | city | string | true     | City name   |
//!
//! ## Headers
//! | Name      | Value |
//! |-----------|-------|
//! | X-Api-Key | abc   |
//! ```
//!
//! Headings are matched case-insensitively against an English/Chinese
//! vocabulary. Any other heading stops capture until the next known one.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::RawApiDefinition;
use super::parser::parse_structured_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Name,
    Description,
    Url,
    BaseUrl,
    Method,
    Parameters,
    Headers,
    ResultPath,
    Timeout,
}

const HEADINGS: &[(&str, Section)] = &[
    ("api name", Section::Name),
    ("api名称", Section::Name),
    ("name", Section::Name),
    ("名称", Section::Name),
    ("description", Section::Description),
    ("描述", Section::Description),
    ("url", Section::Url),
    ("endpoint", Section::Url),
    ("接口地址", Section::Url),
    ("base url", Section::BaseUrl),
    ("基础地址", Section::BaseUrl),
    ("method", Section::Method),
    ("方法", Section::Method),
    ("请求方法", Section::Method),
    ("parameters", Section::Parameters),
    ("参数", Section::Parameters),
    ("headers", Section::Headers),
    ("标头", Section::Headers),
    ("请求头", Section::Headers),
    ("result path", Section::ResultPath),
    ("返回路径", Section::ResultPath),
    ("timeout", Section::Timeout),
    ("超时", Section::Timeout),
];

static TABLE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)*\|?$").expect("valid separator regex")
});

fn classify_heading(text: &str) -> Section {
    let text = text
        .trim()
        .trim_end_matches('#')
        .trim()
        .trim_end_matches([':', '：'])
        .trim()
        .to_lowercase();
    HEADINGS
        .iter()
        .find(|(label, _)| *label == text)
        .map_or(Section::None, |(_, section)| *section)
}

/// "Required" cells accept `true` (any case) or `是`
fn is_truthy(cell: &str) -> bool {
    let cell = cell.trim();
    cell.eq_ignore_ascii_case("true") || cell == "是"
}

fn clean_inline(text: &str) -> String {
    let text = text.trim();
    let text = text
        .strip_prefix("- ")
        .or_else(|| text.strip_prefix("* "))
        .unwrap_or(text);
    text.trim().trim_matches('`').trim().to_string()
}

fn split_row(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(clean_inline).collect()
}

#[derive(Default)]
struct Collector {
    name: Option<String>,
    description: Vec<String>,
    url: Option<String>,
    base_url: Option<String>,
    method: Option<String>,
    result_path: Option<String>,
    timeout: Option<String>,
    parameters: Map<String, Value>,
    headers: Map<String, Value>,
}

impl Collector {
    fn scalar_slot(&mut self, section: Section) -> Option<&mut Option<String>> {
        match section {
            Section::Name => Some(&mut self.name),
            Section::Url => Some(&mut self.url),
            Section::BaseUrl => Some(&mut self.base_url),
            Section::Method => Some(&mut self.method),
            Section::ResultPath => Some(&mut self.result_path),
            Section::Timeout => Some(&mut self.timeout),
            _ => None,
        }
    }

    fn text_line(&mut self, section: Section, line: &str) {
        let value = clean_inline(line);
        if value.is_empty() {
            return;
        }
        if section == Section::Description {
            self.description.push(value);
        } else if let Some(slot) = self.scalar_slot(section) {
            // First line wins; anything after it is prose.
            if slot.is_none() {
                *slot = Some(value);
            }
        }
    }

    fn table_row(&mut self, section: Section, cells: &[String]) {
        match section {
            Section::Parameters => {
                let Some(name) = cells.first().filter(|n| !n.is_empty()) else {
                    return;
                };
                if cells.len() < 2 {
                    return;
                }
                let mut spec = Map::new();
                if !cells[1].is_empty() {
                    spec.insert("type".into(), json!(cells[1]));
                }
                spec.insert(
                    "required".into(),
                    json!(cells.get(2).is_some_and(|c| is_truthy(c))),
                );
                if let Some(desc) = cells.get(3).filter(|d| !d.is_empty()) {
                    spec.insert("description".into(), json!(desc));
                }
                self.parameters.insert(name.clone(), Value::Object(spec));
            }
            Section::Headers => {
                if let [name, value, ..] = cells {
                    if !name.is_empty() {
                        self.headers.insert(name.clone(), json!(value));
                    }
                }
            }
            _ => {}
        }
    }

    fn into_document(self) -> Value {
        let mut doc = Map::new();
        let fields = [
            ("name", self.name),
            ("url", self.url),
            ("baseUrl", self.base_url),
            ("method", self.method),
            ("resultPath", self.result_path),
            ("timeout", self.timeout),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                doc.insert(key.into(), json!(value));
            }
        }
        if !self.description.is_empty() {
            doc.insert("description".into(), json!(self.description.join(" ")));
        }
        if !self.parameters.is_empty() {
            doc.insert("parameters".into(), Value::Object(self.parameters));
        }
        if !self.headers.is_empty() {
            doc.insert("headers".into(), Value::Object(self.headers));
        }
        Value::Object(doc)
    }
}

/// Parse a markdown API definition.
///
/// Returns `None` when the document has no API name or no URL.
pub fn parse_markup(content: &str) -> Option<RawApiDefinition> {
    let mut collector = Collector::default();
    let mut section = Section::None;
    let mut table_header_seen = false;
    let mut in_fence = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        if let Some(heading) = trimmed.strip_prefix('#') {
            section = classify_heading(heading.trim_start_matches('#'));
            table_header_seen = false;
            continue;
        }

        if !trimmed.starts_with('|') {
            // A table ends at the first line that is not a row.
            table_header_seen = false;
        }
        if section == Section::None || trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('|') {
            if TABLE_SEPARATOR.is_match(trimmed) {
                continue;
            }
            if !table_header_seen {
                table_header_seen = true;
                continue;
            }
            collector.table_row(section, &split_row(trimmed));
        } else {
            collector.text_line(section, trimmed);
        }
    }

    let document = collector.into_document();
    debug!(document = %document, "Collected markdown definition");
    parse_structured_value(document)
}
