//! Text normalization producing TTS-safe plain text from arbitrary markup/prose.
//!
//! The stages run in a fixed order because later stages assume earlier ones
//! already ran: tables to prose, markup stripping, lists to sentences,
//! lexical normalization (currency, percentages, ordinals, units,
//! abbreviations, dates), unspeakable symbol removal, whitespace cleanup.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::numbers::{ordinal_suffixed, ordinal_to_words};

/// Normalize raw text into speakable plain text. Total over any input; the
/// worst case is an empty string.
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let text = convert_tables(raw);
    let text = strip_markup(&text);
    let text = convert_lists(&text);
    let text = normalize_lexical(&text);
    let text = remove_unspeakable(&text);
    clean_whitespace(&text)
}

static TABLE_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\|[\s\-:|]+\|$").unwrap());

/// Rewrite markdown tables as prose sentences.
///
/// | Item   | Price |
/// |--------|-------|
/// | Apple  | $2    |
///
/// becomes "Item is Apple, Price is $2."
pub(crate) fn convert_tables(text: &str) -> String {
    let mut result_lines: Vec<String> = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    let mut in_table = false;
    let mut table_prose: Vec<String> = Vec::new();

    fn flush_table(
        result_lines: &mut Vec<String>,
        table_prose: &mut Vec<String>,
        headers: &mut Vec<String>,
        in_table: &mut bool,
    ) {
        if !table_prose.is_empty() {
            result_lines.push(table_prose.join(" "));
        }
        *in_table = false;
        headers.clear();
        table_prose.clear();
    }

    for line in text.split('\n') {
        let stripped = line.trim();

        if stripped.starts_with('|') && stripped.ends_with('|') && !stripped.is_empty() {
            let parts: Vec<&str> = stripped.split('|').collect();
            let cells: Vec<String> = parts[1..parts.len() - 1]
                .iter()
                .map(|cell| cell.trim().to_string())
                .collect();

            if !in_table {
                // First row with pipes is the header row
                headers = cells;
                in_table = true;
            } else if TABLE_SEPARATOR_RE.is_match(stripped) {
                // Skip separator row (|---|---|)
                continue;
            } else {
                let pairs: Vec<String> = headers
                    .iter()
                    .zip(cells.iter())
                    .filter(|(_, value)| !value.is_empty())
                    .map(|(header, value)| format!("{header} is {value}"))
                    .collect();
                if !pairs.is_empty() {
                    table_prose.push(format!("{}.", pairs.join(", ")));
                }
            }
        } else {
            flush_table(
                &mut result_lines,
                &mut table_prose,
                &mut headers,
                &mut in_table,
            );
            result_lines.push(line.to_string());
        }
    }

    flush_table(
        &mut result_lines,
        &mut table_prose,
        &mut headers,
        &mut in_table,
    );

    result_lines.join("\n")
}

static CODE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[\s\S]*?```").unwrap());
static HORIZONTAL_RULE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[-*_]{3,}\s*$").unwrap());
static IMAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[.*?\]\(.*?\)").unwrap());
static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\*\*(.+?)\*\*").unwrap());
static ITALIC_STAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\*(.+?)\*").unwrap());
static ITALIC_UNDERSCORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)_(.+?)_").unwrap());
static STRIKETHROUGH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)~~(.+?)~~").unwrap());
static INLINE_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static BLOCKQUOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^>\s+").unwrap());
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Remove markup formatting, keeping plain text content.
pub(crate) fn strip_markup(text: &str) -> String {
    // Code blocks first, before other patterns can match inside them
    let text = CODE_BLOCK_RE.replace_all(text, "");
    let text = HORIZONTAL_RULE_RE.replace_all(&text, "");
    // Images before links, as images use similar syntax
    let text = IMAGE_RE.replace_all(&text, "");
    let text = LINK_RE.replace_all(&text, "${1}");
    let text = HEADING_RE.replace_all(&text, "");
    let text = BOLD_RE.replace_all(&text, "${1}");
    let text = ITALIC_STAR_RE.replace_all(&text, "${1}");
    let text = ITALIC_UNDERSCORE_RE.replace_all(&text, "${1}");
    let text = STRIKETHROUGH_RE.replace_all(&text, "${1}");
    let text = INLINE_CODE_RE.replace_all(&text, "${1}");
    let text = BLOCKQUOTE_RE.replace_all(&text, "");
    let text = HTML_TAG_RE.replace_all(&text, "");
    text.into_owned()
}

static BULLET_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-*+•◦▪▸►●○‣⁃]\s*(.*)$").unwrap());
static NUMBERED_ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+[.)]\s+(.+)$").unwrap());

/// Convert bullet and numbered lists to one sentence per item, so the speech
/// engine inserts natural pauses between items.
pub(crate) fn convert_lists(text: &str) -> String {
    let mut result_lines: Vec<String> = Vec::new();
    let mut current_items: Vec<String> = Vec::new();

    fn flush_list(result_lines: &mut Vec<String>, current_items: &mut Vec<String>) {
        for item in current_items.drain(..) {
            let item = item.trim().to_string();
            if item.is_empty() {
                continue;
            }
            if item.ends_with(['.', '!', '?']) {
                result_lines.push(item);
            } else {
                result_lines.push(format!("{item}."));
            }
        }
    }

    for line in text.split('\n') {
        if let Some(caps) = BULLET_ITEM_RE.captures(line) {
            current_items.push(caps[1].to_string());
        } else if let Some(caps) = NUMBERED_ITEM_RE.captures(line) {
            current_items.push(caps[1].to_string());
        } else {
            flush_list(&mut result_lines, &mut current_items);
            result_lines.push(line.to_string());
        }
    }

    flush_list(&mut result_lines, &mut current_items);
    result_lines.join("\n")
}

/// Common abbreviations, expanded by literal (case-sensitive) substring
/// replacement including the trailing period.
const ABBREVIATIONS: [(&str, &str); 14] = [
    ("Dr.", "Doctor"),
    ("Mr.", "Mister"),
    ("Mrs.", "Missus"),
    ("Ms.", "Miss"),
    ("Jr.", "Junior"),
    ("Sr.", "Senior"),
    ("Prof.", "Professor"),
    ("etc.", "et cetera"),
    ("e.g.", "for example"),
    ("i.e.", "that is"),
    ("vs.", "versus"),
    ("St.", "Saint"),
    ("Ave.", "Avenue"),
    ("Blvd.", "Boulevard"),
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\d+)(?:\.(\d{2}))?").unwrap());
static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)%").unwrap());
static ORDINAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)(?:st|nd|rd|th)\b").unwrap());
// Longest unit first so "cm" is not mis-matched as "m"
static UNIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(km|kg|cm|mm|lb|oz|mi|ft|in|m)\b").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").unwrap());

fn unit_word(unit: &str) -> &'static str {
    match unit {
        "km" => "kilometers",
        "kg" => "kilograms",
        "m" => "meters",
        "cm" => "centimeters",
        "mm" => "millimeters",
        "lb" => "pounds",
        "oz" => "ounces",
        "mi" => "miles",
        "ft" => "feet",
        "in" => "inches",
        _ => "",
    }
}

/// Rewrite numbers, symbols, and abbreviations in spoken form. Each rewrite
/// runs once and must not be re-matched by a later rule, so the order here is
/// load-bearing.
pub(crate) fn normalize_lexical(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    // Currency: $X or $X.XX
    let text = CURRENCY_RE.replace_all(text, |caps: &Captures| {
        let dollars = &caps[1];
        let singular = dollars.parse::<u64>().map(|v| v == 1).unwrap_or(false);
        let dollar_word = if singular { "dollar" } else { "dollars" };
        match caps.get(2) {
            Some(cents) => {
                let cents: u32 = cents.as_str().parse().unwrap_or(0);
                let cent_word = if cents == 1 { "cent" } else { "cents" };
                format!("{dollars} {dollar_word} and {cents} {cent_word}")
            }
            None => format!("{dollars} {dollar_word}"),
        }
    });

    // Percentages: X%
    let text = PERCENT_RE.replace_all(&text, "${1} percent");

    // Ordinals: 1st, 2nd, 3rd, 4th -> first, second, third, fourth
    let text = ORDINAL_RE.replace_all(&text, |caps: &Captures| match caps[1].parse::<u64>() {
        Ok(num) => ordinal_to_words(num),
        Err(_) => caps[0].to_string(),
    });

    // Units: 10km, 5kg
    let text = UNIT_RE.replace_all(&text, |caps: &Captures| {
        format!("{} {}", &caps[1], unit_word(&caps[2]))
    });

    // Abbreviations
    let mut text = text.into_owned();
    for (abbreviation, expansion) in ABBREVIATIONS {
        text = text.replace(abbreviation, expansion);
    }

    // Dates: MM/DD/YYYY -> "Month DDth, YYYY"; out-of-range months are left
    // untouched
    let text = DATE_RE.replace_all(&text, |caps: &Captures| {
        let month: usize = caps[1].parse().unwrap_or(0);
        if !(1..=12).contains(&month) {
            return caps[0].to_string();
        }
        let day: u32 = caps[2].parse().unwrap_or(0);
        format!(
            "{} {}, {}",
            MONTH_NAMES[month - 1],
            ordinal_suffixed(day),
            &caps[3]
        )
    });

    text.into_owned()
}

static SYMBOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[○●◯◉■□▪▫▲△▼▽◆◇★☆♦♣♠♥✓✗✔✘→←↑↓⇒⇐⇔│├└┌┐┘┬┴─═║╔╗╚╝╠╣╬•·©®™°±×÷≠≤≥∞∑∏√∫∂∆∇∈∉⊂⊃∪∩]",
    )
    .unwrap()
});
static PICTOGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[🔹🔸🔷🔶📌📍🔗💡⚠✨🎯📊📈📉\u{FE0F}]").unwrap());

/// Drop symbols a speech engine cannot render.
pub(crate) fn remove_unspeakable(text: &str) -> String {
    let text = SYMBOL_RE.replace_all(text, "");
    PICTOGRAPH_RE.replace_all(&text, "").into_owned()
}

static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static SPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static PARA_EDGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" *\n\n *").unwrap());

const PARA_MARKER: &str = "\u{0}PARA\u{0}";

/// Collapse whitespace while preserving paragraph boundaries. Single newlines
/// within a paragraph become spaces so the speech engine reads continuously
/// instead of pausing at wrapped lines.
pub(crate) fn clean_whitespace(text: &str) -> String {
    // Normalize every line-break variant to \n: CRLF, bare CR, form feed,
    // vertical tab, Unicode line/paragraph separators (common PDF artifacts)
    let text = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{000C}', "\n")
        .replace('\u{000B}', "\n")
        .replace('\u{2028}', "\n")
        .replace('\u{2029}', "\n\n");

    // Collapse runs of blank lines to exactly one paragraph break
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");

    // Park paragraph breaks, join lines within paragraphs, restore
    let text = text.replace("\n\n", PARA_MARKER);
    let text = text.replace('\n', " ");
    let text = text.replace(PARA_MARKER, "\n\n");

    let text = SPACE_RUN_RE.replace_all(&text, " ");
    let text = PARA_EDGE_RE.replace_all(&text, "\n\n");

    text.trim().to_string()
}
