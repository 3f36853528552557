//! Reply formatting: `**strong**` emphasis and line breaks.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub strong: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormattedText {
    pub lines: Vec<Vec<Span>>,
}

impl FormattedText {
    pub fn plain(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.iter().map(|s| s.text.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn format_reply(text: &str) -> FormattedText {
    FormattedText {
        lines: text.split('\n').map(format_line).collect(),
    }
}

pub fn plain_text(text: &str) -> String {
    format_reply(text).plain()
}

// Non-greedy `**...**`; an unmatched opener stays literal.
fn format_line(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = line;
    while let Some(open) = rest.find("**") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("**") else {
            break;
        };
        push_span(&mut spans, &rest[..open], false);
        push_span(&mut spans, &after[..close], true);
        rest = &after[close + 2..];
    }
    push_span(&mut spans, rest, false);
    spans
}

fn push_span(spans: &mut Vec<Span>, text: &str, strong: bool) {
    if text.is_empty() {
        return;
    }
    spans.push(Span {
        text: text.to_string(),
        strong,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasis_and_newlines() {
        let f = format_reply("Visit **Kyoto** and **Nara**\nthen rest");
        assert_eq!(f.lines.len(), 2);
        assert_eq!(
            f.lines[0],
            vec![
                Span { text: "Visit ".into(), strong: false },
                Span { text: "Kyoto".into(), strong: true },
                Span { text: " and ".into(), strong: false },
                Span { text: "Nara".into(), strong: true },
            ]
        );
        assert_eq!(f.plain(), "Visit Kyoto and Nara\nthen rest");
    }

    #[test]
    fn unmatched_marker_is_literal() {
        assert_eq!(plain_text("a ** b"), "a ** b");
        assert_eq!(format_reply("").lines, vec![Vec::<Span>::new()]);
    }
}
