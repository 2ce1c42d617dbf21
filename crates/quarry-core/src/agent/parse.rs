//! Turning free-form model output into a loop directive.

use std::sync::LazyLock;

use regex::Regex;

const FINAL_ANSWER_MARKER: &str = "Final Answer:";

static ACTION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Action:\s*(.+?)(?:\n|$)").ok());
static ACTION_INPUT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Action Input:\s*(.+?)(?:\n|$)").ok());

/// What the model asked the loop to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelDirective {
    /// Invoke `name` with `input`. The name is not validated here.
    Action { name: String, input: String },
    /// Stop with this answer.
    FinalAnswer { text: String },
    /// Neither shape was found.
    Unparsed { raw: String },
}

/// Parse one model response.
///
/// A final answer wins over an action in the same response; the text after
/// the last `Final Answer:` marker is taken. Otherwise the first `Action:`
/// line and the first `Action Input:` line must both be present.
pub fn parse_response(response: &str) -> ModelDirective {
    if let Some(idx) = response.rfind(FINAL_ANSWER_MARKER) {
        let text = response[idx + FINAL_ANSWER_MARKER.len()..].trim();
        return ModelDirective::FinalAnswer {
            text: text.to_string(),
        };
    }

    match (capture(&ACTION_RE, response), capture(&ACTION_INPUT_RE, response)) {
        (Some(name), Some(input)) => ModelDirective::Action { name, input },
        _ => ModelDirective::Unparsed {
            raw: response.to_string(),
        },
    }
}

fn capture(re: &LazyLock<Option<Regex>>, text: &str) -> Option<String> {
    let re = re.as_ref()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}
