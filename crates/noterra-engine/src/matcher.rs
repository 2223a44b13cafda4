//! Semantic duplicate detection for notes.
//!
//! One-shot model call that judges whether a candidate note restates an
//! existing one. The model is unreliable input: its output goes through the
//! JSON extractor, is deserialized into the one legal shape, and any returned
//! id is verified against the candidate list before it leaves this module.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};
use uuid::Uuid;

use noterra_core::{extract_json, Error, GenerationBackend, MatchResult, Note, Result};

const MATCH_INSTRUCTIONS: &str = "\
You are an assistant specialized in semantic note matching. Your only task is \
to decide whether a user's new idea corresponds to one of the existing notes \
listed below.

A match exists when the main topic is identical or very similar, the intent \
is the same even if worded differently, and the key concepts substantially \
overlap. A match does NOT exist when the idea covers a different aspect of \
the same general area, is complementary but distinct, or contradicts the \
existing note.

You MUST return only a valid JSON object, with no surrounding text:
- match found:    {\"found_note\": \"NOTE_ID\"}
- no match found: {\"found_note\": null}

Strict rules:
- Return ONLY the JSON, no markdown and no explanation.
- Compare meaning, not exact wording.
- When in doubt, prefer {\"found_note\": null}.
- Never invent a note id.";

/// Judges whether a candidate note duplicates an existing one.
pub struct SemanticMatcher {
    backend: Arc<dyn GenerationBackend>,
}

impl SemanticMatcher {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    fn build_system_prompt(existing: &[Note]) -> String {
        let listing = existing
            .iter()
            .map(|n| format!("ID: {}, Content: {}", n.id, n.content))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{}\n\n####\nAvailable notes:\n{}",
            MATCH_INSTRUCTIONS, listing
        )
    }

    /// Decide whether `candidate` matches exactly one of `existing`.
    ///
    /// Every deviation from the contract — unparseable output, wrong shape,
    /// an id absent from `existing` — is `Error::ModelOutput`. Callers may
    /// recover by treating that as "no match"; an unverified id never
    /// escapes.
    #[instrument(skip(self, candidate, existing), fields(subsystem = "engine", component = "matcher", op = "match_note", model = %self.backend.model_name(), candidate_count = existing.len()))]
    pub async fn match_note(&self, candidate: &str, existing: &[Note]) -> Result<MatchResult> {
        if existing.is_empty() {
            return Ok(MatchResult { found_note: None });
        }

        let start = Instant::now();
        let system = Self::build_system_prompt(existing);
        let raw = self.backend.generate_with_system(&system, candidate).await?;

        let result = Self::verify(&raw, existing)?;
        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            matched = result.found_note.is_some(),
            "Match decision complete"
        );
        Ok(result)
    }

    fn verify(raw: &str, existing: &[Note]) -> Result<MatchResult> {
        let value = extract_json(raw).map_err(|_| {
            Error::ModelOutput("no JSON object found in match response".to_string())
        })?;

        let obj = value
            .as_object()
            .ok_or_else(|| Error::ModelOutput("match response is not an object".to_string()))?;
        let found = obj
            .get("found_note")
            .ok_or_else(|| Error::ModelOutput("match response missing found_note".to_string()))?;

        let id = match found {
            serde_json::Value::Null => return Ok(MatchResult { found_note: None }),
            serde_json::Value::String(s) => Uuid::parse_str(s).map_err(|_| {
                Error::ModelOutput(format!("found_note is not a valid id: {}", s))
            })?,
            other => {
                return Err(Error::ModelOutput(format!(
                    "found_note has unexpected type: {}",
                    other
                )))
            }
        };

        if !existing.iter().any(|n| n.id == id) {
            return Err(Error::ModelOutput(format!(
                "found_note {} is not among the candidates",
                id
            )));
        }

        Ok(MatchResult {
            found_note: Some(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn note(content: &str) -> Note {
        Note {
            id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            title: "t".to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_verify_accepts_known_id() {
        let notes = vec![note("oauth login"), note("api docs")];
        let raw = format!(r#"{{"found_note": "{}"}}"#, notes[0].id);
        let result = SemanticMatcher::verify(&raw, &notes).unwrap();
        assert_eq!(result.found_note, Some(notes[0].id));
    }

    #[test]
    fn test_verify_accepts_null() {
        let notes = vec![note("oauth login")];
        let result = SemanticMatcher::verify(r#"{"found_note": null}"#, &notes).unwrap();
        assert_eq!(result.found_note, None);
    }

    #[test]
    fn test_verify_rejects_unknown_id() {
        let notes = vec![note("oauth login")];
        let raw = format!(r#"{{"found_note": "{}"}}"#, Uuid::now_v7());
        let err = SemanticMatcher::verify(&raw, &notes).unwrap_err();
        assert!(matches!(err, Error::ModelOutput(_)));
    }

    #[test]
    fn test_verify_rejects_non_uuid_string() {
        let notes = vec![note("oauth login")];
        let err = SemanticMatcher::verify(r#"{"found_note": "note_123"}"#, &notes).unwrap_err();
        assert!(matches!(err, Error::ModelOutput(_)));
    }

    #[test]
    fn test_verify_rejects_wrong_shape() {
        let notes = vec![note("oauth login")];
        let err = SemanticMatcher::verify(r#"{"match": true}"#, &notes).unwrap_err();
        assert!(matches!(err, Error::ModelOutput(_)));

        let err = SemanticMatcher::verify(r#"{"found_note": 42}"#, &notes).unwrap_err();
        assert!(matches!(err, Error::ModelOutput(_)));
    }

    #[test]
    fn test_verify_rejects_prose_without_json() {
        let notes = vec![note("oauth login")];
        let err = SemanticMatcher::verify("I think it matches the first one.", &notes).unwrap_err();
        assert!(matches!(err, Error::ModelOutput(_)));
    }

    #[test]
    fn test_verify_recovers_fenced_json() {
        let notes = vec![note("oauth login")];
        let raw = format!(
            "Here is the result:\n```json\n{{\"found_note\": \"{}\"}}\n```\nThanks",
            notes[0].id
        );
        let result = SemanticMatcher::verify(&raw, &notes).unwrap();
        assert_eq!(result.found_note, Some(notes[0].id));
    }

    #[test]
    fn test_system_prompt_enumerates_candidates() {
        let notes = vec![note("first note"), note("second note")];
        let prompt = SemanticMatcher::build_system_prompt(&notes);
        assert!(prompt.contains(&format!("ID: {}, Content: first note", notes[0].id)));
        assert!(prompt.contains(&format!("ID: {}, Content: second note", notes[1].id)));
    }
}
