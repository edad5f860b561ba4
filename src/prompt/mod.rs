// Persona templates
// Each persona is a fixed instruction template with `{context}` and `{question}` slots

pub mod grounding;

#[cfg(test)]
mod tests;

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

/// Rules shared by every persona
const GROUND_RULES: &str = "\
Rules:
- Be technical and specific.
- Structure answers about challenges or conflicts with the STAR method (Situation, Task, Action, Result).
- Cite exact metrics, tool names and technologies exactly as they appear in the context.
- Never invent projects, numbers or tools. If the context does not contain the answer, say that you don't know.";

const ASSISTANT_TEMPLATE: &str = "\
You are a helpful Career Assistant for a Software Engineer. Use the provided context to answer questions about their projects. Always focus on technical actions and quantifiable results.

{rules}

Context:
---------------------
{context}
---------------------

Question: {question}
Answer:";

const INTERVIEW_COACH_TEMPLATE: &str = "\
You are an interview coach preparing a Software Engineer for a technical interview. Answer in the first person, as the engineer would speak to an interviewer, using only the project notes below. Keep the answer concise enough to say out loud in two minutes.

{rules}

Project notes:
---------------------
{context}
---------------------

Interview question: {question}
Answer:";

const CAREER_ADVOCATE_TEMPLATE: &str = "\
You are a Career Advocate representing a Software Engineer to recruiters and hiring managers. Present their work persuasively but truthfully, highlighting impact and ownership, using only the project write-ups below.

{rules}

Project write-ups:
---------------------
{context}
---------------------

Question: {question}
Answer:";

/// Persona used to frame retrieved context for the language model
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Persona {
    /// General career assistant
    Assistant,
    /// Rehearses first-person interview answers
    InterviewCoach,
    /// Pitches the engineer's work to recruiters
    #[default]
    CareerAdvocate,
}

impl Persona {
    pub const ALL: [Self; 3] = [Self::Assistant, Self::InterviewCoach, Self::CareerAdvocate];

    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::InterviewCoach => "interview-coach",
            Self::CareerAdvocate => "career-advocate",
        }
    }

    fn template(self) -> &'static str {
        match self {
            Self::Assistant => ASSISTANT_TEMPLATE,
            Self::InterviewCoach => INTERVIEW_COACH_TEMPLATE,
            Self::CareerAdvocate => CAREER_ADVOCATE_TEMPLATE,
        }
    }

    /// Build the prompt for `question` given the retrieved `context`.
    ///
    /// Substitution is literal and single-pass: braces inside the context or
    /// question are never treated as slots.
    #[inline]
    pub fn render(self, context: &str, question: &str) -> String {
        let template = self.template().replacen("{rules}", GROUND_RULES, 1);

        let mut prompt = String::with_capacity(template.len() + context.len() + question.len());
        let mut rest = template.as_str();

        while let Some(pos) = rest.find('{') {
            let (head, tail) = rest.split_at(pos);
            prompt.push_str(head);
            if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
                prompt.push_str(context.trim());
                rest = after;
            } else if let Some(after) = tail.strip_prefix(QUESTION_SLOT) {
                prompt.push_str(question.trim());
                rest = after;
            } else {
                prompt.push('{');
                rest = tail.split_at(1).1;
            }
        }
        prompt.push_str(rest);

        prompt
    }
}

impl fmt::Display for Persona {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
