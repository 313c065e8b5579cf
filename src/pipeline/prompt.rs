//! Instructions and user turns for the two pipeline phases.
//!
//! The proofread phase is a single two-turn conversation: the propose turn
//! asks for structured corrections, the apply turn asks for the corrected
//! text. Both run under the same instruction so the apply call can replay
//! the propose exchange verbatim.

/// Instruction for the translation phase.
pub fn translation_instruction(language_name: &str) -> String {
    format!(
        "You are a professional translator. Translate the text provided by the \
         user into {language_name}. Translate faithfully and preserve the \
         original structure, formatting, and paragraph breaks. Return only the \
         translation, with no commentary."
    )
}

/// Instruction shared by both proofread turns.
pub fn proofread_instruction(language_name: &str) -> String {
    format!(
        "You are an expert {language_name} proofreader reviewing a translated \
         document. Follow the user's requests exactly and add no commentary \
         beyond what is asked for."
    )
}

/// First proofread turn: present the source beside the translation and
/// ask for corrections as structured data.
pub fn propose_input(source_text: &str, translated_text: &str) -> String {
    format!(
        "Review the following translation against its source text and \
         propose corrections. Respond with a JSON array where each element \
         is an object with the fields \"original\" (the text to change), \
         \"change\" (the replacement), and \"reason\" (why). Propose only \
         changes that improve accuracy, grammar, or fluency. If nothing \
         needs changing, return an empty array.\n\n\
         Source text:\n{source_text}\n\n\
         Translation:\n{translated_text}"
    )
}

/// Second proofread turn, sent after replaying the propose exchange.
pub fn apply_input() -> &'static str {
    "Now apply the corrections you proposed to the translation. Preserve \
     the original structure, formatting, and paragraph breaks. Return the \
     complete corrected translation, with no commentary."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_instruction_names_the_language() {
        let instruction = translation_instruction("French");
        assert!(instruction.contains("into French"));
        assert!(instruction.contains("no commentary"));
    }

    #[test]
    fn propose_input_embeds_both_texts_and_names_fields() {
        let input = propose_input("Hello world", "Bonjour le monde");
        assert!(input.contains("Source text:\nHello world"));
        assert!(input.contains("Translation:\nBonjour le monde"));
        assert!(input.contains("\"original\""));
        assert!(input.contains("\"change\""));
        assert!(input.contains("\"reason\""));
    }

    #[test]
    fn apply_input_requests_full_text_only() {
        assert!(apply_input().contains("no commentary"));
        assert!(apply_input().contains("Preserve the original structure"));
    }
}
