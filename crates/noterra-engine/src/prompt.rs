//! Deterministic system-prompt assembly.
//!
//! The assembled prompt grounds the model on a context's notes. Assembly is
//! a pure function: identical context state yields byte-identical output, so
//! prompts are testable and cacheable. Absence of a context or of notes is
//! stated explicitly rather than omitted, so the model never infers notes
//! exist when they do not.

use noterra_core::{Context, Note};

/// Fixed persona preamble: identity, role, response posture.
const PERSONA: &str = "\
You are Noterra, a personal knowledge assistant. Your role is to answer the \
user's questions with precision and clarity, drawing on the notes and \
instructions provided below. When the supplied notes do not cover a question, \
say so explicitly and give the best answer you can from general knowledge.";

/// Precedence directive: owner-authored material outranks general knowledge.
const PRECEDENCE: &str = "\
IMPORTANT: the user's custom instructions and the notes below take priority \
over your general knowledge. When they conflict with what you would otherwise \
say, follow the notes.";

const NO_NOTES: &str = "No notes were supplied for this conversation.";

/// Assemble the system prompt for a context. `None` degrades to the default
/// persona prompt with an explicit empty-notes statement.
pub fn assemble(context: Option<&Context>) -> String {
    let mut sections: Vec<String> = vec![PERSONA.to_string(), PRECEDENCE.to_string()];

    match context {
        Some(ctx) => {
            if !ctx.prompt.is_empty() {
                sections.push(format!("User custom instructions:\n{}", ctx.prompt));
            }
            sections.push(render_notes(&ctx.notes));
        }
        None => sections.push(format!("Notes:\n{}", NO_NOTES)),
    }

    sections.join("\n\n")
}

fn render_notes(notes: &[Note]) -> String {
    if notes.is_empty() {
        return format!("Notes:\n{}", NO_NOTES);
    }
    let body = notes
        .iter()
        .map(|n| format!("###### {} ######\n{}", n.title, n.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Notes:\n{}", body)
}
