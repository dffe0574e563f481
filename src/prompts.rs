//! Prompt text for the downstream vision collaborators.
//!
//! The library never calls a model. It builds the exact text a caller sends
//! alongside the image bytes it emits ([`crate::output::VisionRequest`] and
//! [`crate::markdown::ImageDescriptionRequest`]), so every caller phrases the
//! request the same way and prompt changes are testable here.

/// System message for full-page vision reconstruction.
pub const PAGE_VISION_SYSTEM_PROMPT: &str = "You are a technical documentation expert.";

/// Build the user message for a full-page vision request.
///
/// `hint` is the raw extracted page text, already truncated to the
/// configured hint length.
pub fn page_vision_prompt(hint: &str) -> String {
    format!(
        r#"I am converting a technical manual page to Markdown.
This specific page contains complex Figures or Tables (Vector Graphics) that standard text extraction misses.

[Raw Extracted Text (For Calibration Only)]
{hint} ... (truncated)

[Task]
1. Reconstruct this page into clean Markdown.
2. CRITICAL: When you see a Figure (Chart, Diagram, etc.), describe it in detail using the visual information from the image.
   - Do NOT just copy the caption. Explain the visual data flow, architecture, or chart values.
   - For Tables, reconstruct them as Markdown tables.
3. Use the [Raw Text] to correct spelling errors in the image analysis, but TRUST THE IMAGE for layout and structure.
4. Remove running headers and footers (page numbers, company names, "Modifications reserved").
5. Do not output "Here is the markdown..." just output the content."#
    )
}

/// System message for describing one image inside a section.
pub const IMAGE_DESCRIPTION_SYSTEM_PROMPT: &str = r#"You are a technical documentation assistant. Your task is to translate the content of an image into text that continues the surrounding document seamlessly.

Rules:
1. NO STOCK OPENINGS: never start with "This image shows..." or "In the picture we can see...".
2. DESCRIBE THE CONTENT DIRECTLY: write as if continuing the preceding text.
3. STAY TECHNICALLY PRECISE: a terminal screenshot becomes a code block; an architecture diagram becomes a description of the data flow.
4. MATCH THE FORMAT: if the preceding text is a list of steps, continue the list.

Example:
- Input: a screenshot of a command-line terminal
- Correct output:
  ```bash
  $ bhy2cli --help
  Usage: bhy2cli [OPTIONS]
  ...
  ```
- Wrong output: "This image shows a command-line terminal in which..."

Decide from the context what the image is meant to convey, then output it in the most fitting format."#;

/// Build the user message for an image-description request.
///
/// `context` is the section text preceding the image, already truncated.
pub fn image_context_prompt(context: &str, section_title: &str) -> String {
    format!(
        r#"This image belongs to the section "{section_title}".

The text preceding the image:
---
{context}
---

Translate the content of this image into Markdown based on that context.
Your output is inserted directly after the text above and must read as its continuation."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_prompt_embeds_hint() {
        let p = page_vision_prompt("Table 3: Register map");
        assert!(p.contains("Table 3: Register map"));
        assert!(p.contains("Markdown tables"));
    }

    #[test]
    fn image_prompt_embeds_title_and_context() {
        let p = image_context_prompt("Run build.bat:", "2.2.2 Compiling BHy2CLI");
        assert!(p.contains("\"2.2.2 Compiling BHy2CLI\""));
        assert!(p.contains("---\nRun build.bat:\n---"));
    }

    #[test]
    fn system_prompts_are_not_empty() {
        assert!(!PAGE_VISION_SYSTEM_PROMPT.is_empty());
        assert!(IMAGE_DESCRIPTION_SYSTEM_PROMPT.contains("code block"));
    }
}
