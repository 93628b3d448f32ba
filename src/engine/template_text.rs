use crate::models::field::StructuredField;
use regex::Regex;
use std::sync::LazyLock;

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]*)\)").expect("static regex must compile"));
static OR_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i) or ").expect("static regex must compile"));
static BARE_DISJUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([A-Za-z-]+)\s+or\s+([A-Za-z-]+)$").expect("static regex must compile")
});

/// A classification step: returns a field when the rule applies to the line.
pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&str) -> Option<StructuredField>,
}

/// Classification rules in precedence order; the first that applies wins.
pub const RULES: &[Rule] = &[
    Rule {
        name: "parenthetical_options",
        apply: parenthetical_options,
    },
    Rule {
        name: "bare_disjunction",
        apply: bare_disjunction,
    },
    Rule {
        name: "default_value_marker",
        apply: default_value_marker,
    },
    Rule {
        name: "plain_text",
        apply: plain_text,
    },
];

/// Converts knowledge-base article text into fields, one per non-empty line.
///
/// Labels are not deduplicated here; callers edit the result before saving.
pub fn parse(raw_text: &str) -> Vec<StructuredField> {
    raw_text
        .split('\n')
        .map(normalize_line)
        .filter(|line| !line.is_empty())
        .map(classify_line)
        .collect()
}

pub fn classify_line(line: &str) -> StructuredField {
    RULES
        .iter()
        .find_map(|rule| (rule.apply)(line))
        .unwrap_or_else(|| StructuredField::text(line))
}

fn normalize_line(line: &str) -> &str {
    let trimmed = line.trim();
    trimmed.strip_suffix(':').unwrap_or(trimmed).trim_end()
}

fn parenthetical_options(line: &str) -> Option<StructuredField> {
    let contents = PARENTHETICAL.captures(line)?.get(1)?.as_str();

    let pieces: Vec<&str> = if contents.contains('/') {
        contents.split('/').collect()
    } else if OR_TOKEN.is_match(contents) {
        OR_TOKEN.split(contents).collect()
    } else {
        // Prose such as "(call back later)" is not an option list.
        return None;
    };

    let options: Vec<String> = pieces
        .into_iter()
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .map(str::to_string)
        .collect();
    if options.is_empty() {
        return None;
    }

    Some(StructuredField::select(line, collapse_yes_no(options)))
}

fn collapse_yes_no(options: Vec<String>) -> Vec<String> {
    let is_yes_no = options.len() == 2
        && options.iter().any(|option| option == "Yes")
        && options.iter().any(|option| option == "No");
    if is_yes_no {
        vec!["Y".to_string(), "N".to_string()]
    } else {
        options
    }
}

fn bare_disjunction(line: &str) -> Option<StructuredField> {
    if line.contains('(') || line.contains(')') {
        return None;
    }
    let captures = BARE_DISJUNCTION.captures(line)?;
    let options = vec![captures[1].to_string(), captures[2].to_string()];
    Some(StructuredField::select(line, options))
}

fn default_value_marker(line: &str) -> Option<StructuredField> {
    let (label, default_value) = line.split_once(';')?;
    let label = normalize_line(label);
    if label.is_empty() {
        return None;
    }
    let default_value = default_value.trim();
    if default_value.is_empty() {
        return Some(StructuredField::text(label));
    }
    Some(StructuredField::text_with_default(label, default_value))
}

fn plain_text(line: &str) -> Option<StructuredField> {
    Some(StructuredField::text(line))
}
