pub const DEFAULT_PROMPT: &str = "Elaborate on this.";
pub const START_CONTEXT: &str = "Start of conversation";

pub fn branch_context(parent_response: &str, excerpt: &str) -> String {
    format!(
        "Full Context of Parent Node:\n\"{parent_response}\"\n\nSpecific Highlighted Text:\n\"{excerpt}\""
    )
}

/// Final prompt context sent to the generation service.
pub fn compose(context: &str, prompt: &str) -> String {
    format!(
        "Context: \"{context}\"\n\nUser Prompt: {prompt}\n\nPlease provide a concise and helpful response."
    )
}

pub fn effective_prompt(prompt: Option<&str>) -> &str {
    match prompt.map(str::trim) {
        Some(p) if !p.is_empty() => p,
        _ => DEFAULT_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prompt_falls_back_to_default() {
        assert_eq!(effective_prompt(None), DEFAULT_PROMPT);
        assert_eq!(effective_prompt(Some("   ")), DEFAULT_PROMPT);
        assert_eq!(effective_prompt(Some(" Where? ")), "Where?");
    }

    #[test]
    fn composed_context_carries_all_parts() {
        let ctx = compose(&branch_context("Tokyo has many districts.", "districts"), "Which one?");
        assert!(ctx.contains("Full Context of Parent Node:\n\"Tokyo has many districts.\""));
        assert!(ctx.contains("Specific Highlighted Text:\n\"districts\""));
        assert!(ctx.contains("User Prompt: Which one?"));
    }
}
