//! Prompt text for every generation call. Pure functions, no I/O.

pub mod model;
pub mod swap;

pub use model::{detail_section_prompt, model_prompt};
pub use swap::{clothing_detail_prompt, retouch_prompt};

/// Caller-controlled inputs to a prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptOptions<'a> {
    /// Free-text notes stored on the session. Empty means none.
    pub additional_notes: &'a str,
    /// One-off tweak supplied with a regenerate request.
    pub adjustment: Option<&'a str>,
    /// Number of material images attached after the subject image.
    pub material_count: usize,
}

/// Appends the notes and adjustment lines, each only when non-blank.
pub(crate) fn with_extras(mut body: String, options: &PromptOptions<'_>) -> String {
    let notes = options.additional_notes.trim();
    if !notes.is_empty() {
        body.push_str("\nAdditional notes: ");
        body.push_str(notes);
    }
    if let Some(adjustment) = options.adjustment.map(str::trim).filter(|a| !a.is_empty()) {
        body.push_str("\nAdjustment request: ");
        body.push_str(adjustment);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extras_skip_blank_values() {
        let options = PromptOptions {
            additional_notes: "  ",
            adjustment: Some(""),
            material_count: 1,
        };
        assert_eq!(with_extras("base".into(), &options), "base");
    }

    #[test]
    fn test_extras_order() {
        let options = PromptOptions {
            additional_notes: "slim fit",
            adjustment: Some("brighter"),
            material_count: 1,
        };
        assert_eq!(
            with_extras("base".into(), &options),
            "base\nAdditional notes: slim fit\nAdjustment request: brighter"
        );
    }
}
