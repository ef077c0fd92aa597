//! Output interpreter: turns raw engine text into a structured step.
//!
//! Raw text first goes through [`NORMALIZERS`], an ordered list of pure text
//! passes that remove the noise models and runtimes tend to add. The cleaned
//! text is then split into labelled fields and checked for a single
//! `Action`/`Action Input` pair or a single `Final Answer`.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use crate::util::truncate_chars;

/// Longest raw excerpt kept on a parse error.
const EXCERPT_CHARS: usize = 200;

/// One structured decision from the reasoning engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedStep {
    ToolInvocation {
        thought: String,
        action: String,
        action_input: String,
    },
    FinalAnswer {
        thought: String,
        text: String,
    },
}

/// Engine output that could not be interpreted. Recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ParseError {
    pub reason: String,
    pub raw_excerpt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Thought,
    Action,
    ActionInput,
    Observation,
    FinalAnswer,
}

impl Label {
    /// `Action Input` must be tried before `Action`.
    const ALL: [Label; 5] = [
        Label::ActionInput,
        Label::FinalAnswer,
        Label::Observation,
        Label::Thought,
        Label::Action,
    ];

    fn text(self) -> &'static str {
        match self {
            Label::Thought => "Thought",
            Label::Action => "Action",
            Label::ActionInput => "Action Input",
            Label::Observation => "Observation",
            Label::FinalAnswer => "Final Answer",
        }
    }
}

/// Split a line into its field label and whatever follows the colon.
fn split_label(line: &str) -> Option<(Label, &str)> {
    let trimmed = line.trim_start();
    Label::ALL.into_iter().find_map(|label| {
        let name = label.text();
        let head = trimmed.get(..name.len())?;
        if !head.eq_ignore_ascii_case(name) {
            return None;
        }
        trimmed[name.len()..]
            .trim_start_matches(|c| c == ' ' || c == '\t')
            .strip_prefix(':')
            .map(|value| (label, value))
    })
}

// ── Normalization ────────────────────────────────────────────────

pub type TextTransform = fn(&str) -> String;

/// Cleanup passes, applied in this order before structural parsing.
pub const NORMALIZERS: [(&str, TextTransform); 3] = [
    ("strip_emphasis", strip_emphasis),
    ("strip_log_lines", strip_log_lines),
    ("collapse_duplicate_labels", collapse_duplicate_labels),
];

/// Run every normalization pass in order.
pub fn normalize(raw: &str) -> String {
    NORMALIZERS
        .iter()
        .fold(raw.to_string(), |text, (_, pass)| pass(&text))
}

/// `**Final Answer: 42**`: the whole line is emphasized.
static WHOLE_LINE_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^([ \t]*)(\*{1,2}|_{1,2})(thought|action input|action|observation|final answer)[ \t]*:[ \t]*([^*_`\s].*?)[ \t]*(\*{1,2}|_{1,2})[ \t]*$",
    )
    .expect("whole-line emphasis regex")
});

/// `**Action:**` or `**Action**:`: markers on both sides of the label.
static LABEL_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^([ \t]*)[*_`]{1,3}[ \t]*(thought|action input|action|observation|final answer)[ \t]*(?::[ \t]*[*_`]{1,3}|[*_`]{1,3}[ \t]*:)",
    )
    .expect("label emphasis regex")
});

/// `**Action: echo`: an opening marker with no closing one before the colon.
static LEADING_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^([ \t]*)[*_`]{1,3}[ \t]*(thought|action input|action|observation|final answer)[ \t]*:",
    )
    .expect("leading emphasis regex")
});

/// Strip emphasis markers around field labels and around the tool name.
pub fn strip_emphasis(text: &str) -> String {
    // Line-anchored patterns below expect `\n` endings only.
    let text = text.lines().collect::<Vec<_>>().join("\n");
    let text = WHOLE_LINE_EMPHASIS.replace_all(&text, |caps: &Captures| {
        let (open, value, close) = (&caps[2], &caps[4], &caps[5]);
        // Underscores inside the value are content (snake_case names), not markers.
        if open != close || (open.starts_with('_') && value.contains('_')) {
            caps[0].to_string()
        } else {
            format!("{}{}: {}", &caps[1], &caps[3], value)
        }
    });
    let text = LABEL_EMPHASIS.replace_all(&text, "${1}${2}:");
    let text = LEADING_EMPHASIS.replace_all(&text, "${1}${2}:");
    text.lines()
        .map(unwrap_action_name)
        .collect::<Vec<_>>()
        .join("\n")
}

fn unwrap_action_name(line: &str) -> String {
    match split_label(line) {
        Some((Label::Action, value)) => {
            let head_len = line.len() - value.len();
            let name = clean_tool_name(value);
            if name.is_empty() {
                line[..head_len].to_string()
            } else {
                format!("{} {}", &line[..head_len], name)
            }
        }
        _ => line.to_string(),
    }
}

fn clean_tool_name(value: &str) -> &str {
    value
        .trim()
        .trim_matches(|c| matches!(c, '*' | '_' | '`' | '"' | '\''))
        .trim()
}

/// Timestamped lines, level-prefixed library lines and chain banners.
static LOG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:\[?\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}|\[?(?:TRACE|DEBUG|INFO|WARN|WARNING|ERROR|CRITICAL)(?:\]|:|\s+-\s)|> (?:Entering|Finished) (?:new )?\S*\s?chain)",
    )
    .expect("log line regex")
});

/// Drop lines that look like runtime log output rather than model text.
pub fn strip_log_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !LOG_LINE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep only the first of consecutive lines carrying the same label.
///
/// Blank lines between them do not break the run.
pub fn collapse_duplicate_labels(text: &str) -> String {
    let mut kept = Vec::new();
    let mut previous: Option<Label> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            kept.push(line);
            continue;
        }
        let label = split_label(line).map(|(label, _)| label);
        if label.is_some() && label == previous {
            continue;
        }
        previous = label;
        kept.push(line);
    }
    kept.join("\n")
}

// ── Structural parsing ───────────────────────────────────────────

struct Field {
    label: Label,
    value: String,
}

/// Split into the unlabelled preamble and the labelled fields.
fn split_fields(text: &str) -> (String, Vec<Field>) {
    let mut preamble: Vec<&str> = Vec::new();
    let mut fields: Vec<(Label, Vec<&str>)> = Vec::new();

    for line in text.lines() {
        match split_label(line) {
            Some((label, rest)) => fields.push((label, vec![rest])),
            None => match fields.last_mut() {
                Some((_, lines)) => lines.push(line),
                None => preamble.push(line),
            },
        }
    }

    let fields = fields
        .into_iter()
        .map(|(label, lines)| Field {
            label,
            value: lines.join("\n").trim().to_string(),
        })
        .collect();
    (preamble.join("\n").trim().to_string(), fields)
}

/// Parse one raw engine response.
pub fn parse(raw: &str) -> Result<ParsedStep, ParseError> {
    let fail = |reason: String| ParseError {
        reason,
        raw_excerpt: truncate_chars(raw.trim(), EXCERPT_CHARS),
    };

    let normalized = normalize(raw);
    let (preamble, mut fields) = split_fields(&normalized);

    // Anything from an invented observation on is not the model's decision.
    if let Some(cut) = fields.iter().position(|f| f.label == Label::Observation) {
        fields.truncate(cut);
    }

    for label in [Label::Action, Label::ActionInput, Label::FinalAnswer] {
        if fields.iter().filter(|f| f.label == label).count() > 1 {
            return Err(fail(format!("more than one `{}:` field", label.text())));
        }
    }

    let position = |label: Label| fields.iter().position(|f| f.label == label);
    let thought = position(Label::Thought)
        .map(|i| fields[i].value.clone())
        .filter(|t| !t.is_empty())
        .unwrap_or(preamble);

    match (
        position(Label::Action),
        position(Label::ActionInput),
        position(Label::FinalAnswer),
    ) {
        (Some(a), Some(i), final_answer) if a < i => {
            let action = fields[a]
                .value
                .lines()
                .map(clean_tool_name)
                .find(|l| !l.is_empty())
                .unwrap_or_default()
                .to_string();
            if action.is_empty() {
                return Err(fail("`Action:` names no tool".to_string()));
            }
            if final_answer.is_some() {
                tracing::debug!("Response has both an action and a final answer; taking the action");
            }
            Ok(ParsedStep::ToolInvocation {
                thought,
                action,
                action_input: fields[i].value.clone(),
            })
        }
        (_, _, Some(f)) => {
            // Without a complete pair, later `Action` lines are answer text.
            let mut text = fields[f].value.clone();
            for field in &fields[f + 1..] {
                if matches!(field.label, Label::Action | Label::ActionInput) {
                    text.push('\n');
                    text.push_str(&format!("{}: {}", field.label.text(), field.value));
                }
            }
            if text.trim().is_empty() {
                return Err(fail("`Final Answer:` is empty".to_string()));
            }
            Ok(ParsedStep::FinalAnswer { thought, text })
        }
        (Some(_), Some(_), None) => Err(fail("`Action Input:` must follow `Action:`".to_string())),
        (Some(_), None, None) => Err(fail("`Action:` without `Action Input:`".to_string())),
        (None, Some(_), None) => Err(fail("`Action Input:` without `Action:`".to_string())),
        (None, None, None) => Err(fail(
            "missing `Action:`/`Action Input:` or `Final Answer:`".to_string(),
        )),
    }
}
