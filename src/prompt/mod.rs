//! Prompt composition.
//!
//! Two fixed templates, chosen by [`Intent`]. Filling is a single left-to-right
//! pass over the template, so placeholder-looking text inside the retrieved
//! context or the question is copied verbatim and never expanded.

mod templates;

pub use templates::{
    CURRENT_ACHIEVEMENT_PLACEHOLDER, INSUFFICIENT_KNOWLEDGE_PHRASE, MOTIVATIONAL_TEMPLATE,
    STANDARD_TEMPLATE,
};

use crate::intent::Intent;

const CONTEXT_FIELD: &str = "{context}";
const QUESTION_FIELD: &str = "{question}";

/// Section headings every motivational prompt must carry, in order.
pub const MOTIVATIONAL_SECTIONS: [&str; 4] = ["A) ", "B) ", "C) ", "D) "];

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptComposer;

impl PromptComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn template_for(&self, intent: Intent) -> &'static str {
        match intent {
            Intent::Standard => STANDARD_TEMPLATE,
            Intent::Motivational => MOTIVATIONAL_TEMPLATE,
        }
    }

    pub fn compose(&self, intent: Intent, context: &str, question: &str) -> String {
        render(self.template_for(intent), context, question)
    }
}

fn render(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(CONTEXT_FIELD) {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(QUESTION_FIELD) {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
