//! Bounded think/act/observe loop.
//!
//! Each iteration sends the whole transcript to the model, parses the reply
//! with [`parse::parse_response`], and either stops or runs one tool and
//! appends its observation. The loop stops on the first of:
//!
//! - a `Final Answer:` (success)
//! - a reply with no usable action, or an unknown tool (success, raw reply)
//! - a model error (failure, steps so far)
//! - `max_iterations` model calls without a final answer (failure)

pub mod parse;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Collaborator, CoreError};
use crate::llm::{LanguageModel, DEFAULT_TEMPERATURE};
use crate::models::{AgentResult, ReasoningStep};
use crate::tools::ToolRegistry;

use self::parse::{parse_response, ModelDirective};

pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Most model calls a single run may make.
pub const MAX_ITERATIONS: usize = 10;

/// Answer returned when the loop runs out of iterations.
pub const EXHAUSTED_ANSWER: &str =
    "Reached the maximum number of iterations; could not complete the task";

pub struct Agent {
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    default_max_iterations: usize,
}

impl Agent {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
        default_max_iterations: usize,
    ) -> Self {
        Self {
            model,
            tools,
            default_max_iterations,
        }
    }

    /// Initial transcript for `question`.
    pub fn build_prompt(&self, question: &str) -> String {
        format!(
            "You are a helpful assistant that can use tools to answer questions.

Available tools:
{tools}

Use the following format:

Question: {question}
Thought: think about how to answer the question
Action: the tool name
Action Input: the tool input
Observation: the tool result
... (this Thought/Action/Action Input/Observation can repeat)
Thought: I now know the answer
Final Answer: the final answer

Important:
1. To look something up in the documents, use knowledge_search
2. To do arithmetic, use calculator
3. For the time or date, use current_time or current_date
4. If no tool is needed, give the Final Answer directly

Begin!

Question: {question}
Thought:",
            tools = self.tools.prompt_listing(),
            question = question,
        )
    }

    /// Run the loop. `max_iterations` of `None` uses the configured default.
    /// Limits above [`MAX_ITERATIONS`] are lowered to it.
    pub async fn run(&self, question: &str, max_iterations: Option<usize>) -> AgentResult {
        let max_iterations = max_iterations
            .unwrap_or(self.default_max_iterations)
            .min(MAX_ITERATIONS);
        let mut transcript = self.build_prompt(question);
        let mut steps: Vec<ReasoningStep> = Vec::new();

        for iteration in 1..=max_iterations {
            let response = match self.model.complete(&transcript, DEFAULT_TEMPERATURE).await {
                Ok(r) => r,
                Err(e) => {
                    let err = CoreError::unavailable(Collaborator::Model, e);
                    warn!(iteration, error = %err, "agent model call failed");
                    return AgentResult::finish(
                        false,
                        format!("Agent failed: {}", err),
                        steps,
                        Some(err.to_string()),
                    );
                }
            };
            debug!(iteration, response = %response, "model response");

            match parse_response(&response) {
                ModelDirective::FinalAnswer { text } => {
                    info!(iteration, tool_calls = steps.len(), "agent finished");
                    return AgentResult::finish(true, text, steps, None);
                }
                ModelDirective::Action { name, input } => {
                    let Some(kind) = self.tools.find(&name) else {
                        debug!(tool = %name, "unknown tool, returning raw response");
                        return AgentResult::finish(true, response, steps, None);
                    };
                    let observation = self.tools.observe(kind, &input).await;
                    transcript.push_str(&format!(
                        " {}\nObservation: {}\nThought:",
                        response, observation
                    ));
                    steps.push(ReasoningStep {
                        tool_name: name,
                        tool_input: input,
                        observation,
                    });
                }
                ModelDirective::Unparsed { raw } => {
                    let err = CoreError::ParseFailure(
                        "no Action/Action Input pair or Final Answer".to_string(),
                    );
                    debug!(iteration, error = %err, "returning the raw response as the answer");
                    return AgentResult::finish(true, raw, steps, None);
                }
            }
        }

        let err = CoreError::IterationLimitExceeded {
            iterations: max_iterations,
        };
        warn!(tool_calls = steps.len(), "{}", err);
        AgentResult::finish(
            false,
            EXHAUSTED_ANSWER.to_string(),
            steps,
            Some(err.to_string()),
        )
    }
}
