//! Renders retrieved comics into the prompt sent to the chat model.
//!
//! The answer format requested here (`[ID] URL`, then an explanation) is what
//! [`crate::selection::parse_selection`] reads back.

use crate::generation::ChatTurn;
use crate::retriever::Candidate;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that selects the most suitable xkcd comic.";

/// One block per candidate, closest first, separated by newlines.
pub fn render_candidates(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(|c| {
            let r = &c.record;
            format!(
                "[{}] {}\nTranscript: {}\nExplanation: {}",
                r.id, r.title, r.transcript, r.explanation
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The user message: the situation, the candidates and the answer format.
pub fn build_prompt(query: &str, candidates: &[Candidate]) -> String {
    format!(
        "Situation: \"{query}\"\n\
         Here are candidate xkcd comics:\n\
         {context}\n\
         \n\
         Which comic fits best and why?\n\
         Answer on the first line with the comic ID in square brackets followed by its URL, \
         exactly like \"[ID] https://xkcd.com/ID/\", then give a short explanation.\n",
        context = render_candidates(candidates),
    )
}

/// System instruction plus the rendered prompt.
pub fn build_messages(query: &str, candidates: &[Candidate]) -> Vec<ChatTurn> {
    vec![
        ChatTurn::system(SYSTEM_PROMPT),
        ChatTurn::user(build_prompt(query, candidates)),
    ]
}
