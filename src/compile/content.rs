//! Placeholder substitution for prompts and documents.
use super::ContentClass;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::placeholder::substitute;
use crate::variables::{PhaseVariables, PROPERTIES_GUIDE_KEY};

/// Prompts keep every placeholder except the properties guide so the voice
/// platform can fill them per call. Documents resolve from Phase 4, then
/// Phase 1, and report what is left.
pub fn compile_content(
    source_path: &str,
    raw: &[u8],
    class: ContentClass,
    phases: &PhaseVariables,
    diagnostics: &mut Diagnostics,
) -> Vec<u8> {
    let Ok(text) = std::str::from_utf8(raw) else {
        tracing::debug!(source = source_path, "binary content copied verbatim");
        return raw.to_vec();
    };
    match class {
        ContentClass::Prompt => {
            let substituted = substitute(text, |key| {
                if key == PROPERTIES_GUIDE_KEY {
                    phases.content.get(key)
                } else {
                    None
                }
            });
            tracing::debug!(
                source = source_path,
                runtime_placeholders = substituted.unresolved.len(),
                "prompt resolved"
            );
            substituted.text.into_bytes()
        }
        ContentClass::Document => {
            let substituted = substitute(text, |key| {
                phases.content.get(key).or_else(|| phases.identity.get(key))
            });
            if !substituted.unresolved.is_empty() {
                diagnostics.warn(
                    WarningKind::Reference,
                    source_path,
                    format!(
                        "placeholders left unresolved: {}",
                        substituted.unresolved.into_iter().collect::<Vec<_>>().join(", ")
                    ),
                );
            }
            substituted.text.into_bytes()
        }
    }
}
