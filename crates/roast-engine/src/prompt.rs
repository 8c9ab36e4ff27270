use roast_contracts::schema::{critique_schema, SchemaNode};

use crate::encoder::EncodedImage;

pub const URL_NOT_PROVIDED: &str = "Not provided";

pub const SYSTEM_INSTRUCTION: &str = "\
You are a world-renowned, brutally honest, caustic, and mean Senior UX/UI Designer and Frontend Engineer.
You have zero patience for bad design, sloppy code, or generic templates.
Your job is to roast websites based on a screenshot provided by the user.

Your tone should be:
- Ruthless but technically accurate.
- Sarcastic and witty.
- Not corporate safe. Use harsh language if necessary (but keep it professional-ish, like a mean boss).
- Focus on: Typography, spacing, color theory, alignment, consistency, and \"vibe\".

Do not be polite. Do not start with \"Here is some feedback.\" Start with an insult.";

pub const FOCUS_AREAS: &[&str] = &[
    "Inconsistent padding/margins.",
    "Ugly font choices.",
    "Low contrast text.",
    "Cluttered layouts.",
    "\"Developer design\" aesthetics.",
    "Corporate memphis art or overused stock photos.",
];

/// Everything a gateway needs for one critique call.
#[derive(Debug, Clone, PartialEq)]
pub struct CritiqueRequest {
    pub system_instruction: String,
    pub user_prompt: String,
    pub image: EncodedImage,
    pub schema: SchemaNode,
}

pub fn build_user_prompt(url: Option<&str>) -> String {
    let url_context = url
        .filter(|value| !value.is_empty())
        .unwrap_or(URL_NOT_PROVIDED);
    let focus = FOCUS_AREAS
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Roast this website screenshot.\nURL Context: {url_context}.\n\nLook for:\n{focus}\n\nReturn a JSON response structured exactly as requested."
    )
}

pub fn build_critique_request(image: EncodedImage, url: Option<&str>) -> CritiqueRequest {
    CritiqueRequest {
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        user_prompt: build_user_prompt(url),
        image,
        schema: critique_schema(),
    }
}

#[cfg(test)]
mod tests {
    use roast_contracts::schema::critique_schema;

    use super::{build_critique_request, build_user_prompt, FOCUS_AREAS, SYSTEM_INSTRUCTION};
    use crate::encoder::EncodedImage;

    #[test]
    fn missing_url_uses_sentinel() {
        assert!(build_user_prompt(None).contains("URL Context: Not provided."));
        assert!(build_user_prompt(Some("")).contains("URL Context: Not provided."));
        assert!(build_user_prompt(Some(" x ")).contains("URL Context:  x ."));
    }

    #[test]
    fn url_is_embedded_verbatim() {
        let prompt = build_user_prompt(Some("definitely not a url <b>"));
        assert!(prompt.contains("URL Context: definitely not a url <b>."));
    }

    #[test]
    fn prompt_lists_every_focus_area_in_order() {
        let prompt = build_user_prompt(None);
        let mut cursor = 0;
        for item in FOCUS_AREAS {
            let found = prompt[cursor..]
                .find(item)
                .map(|offset| cursor + offset);
            assert!(found.is_some(), "missing focus area {item}");
            cursor = found.unwrap_or(cursor);
        }
    }

    #[test]
    fn system_instruction_forbids_polite_opening() {
        assert!(SYSTEM_INSTRUCTION.contains("Do not be polite."));
        assert!(SYSTEM_INSTRUCTION.contains("Start with an insult."));
    }

    #[test]
    fn request_carries_image_and_schema() {
        let image = EncodedImage {
            mime_type: "image/webp".to_string(),
            data: "AAAA".to_string(),
        };
        let request = build_critique_request(image.clone(), Some("https://example.com"));
        assert_eq!(request.image, image);
        assert_eq!(request.schema, critique_schema());
        assert!(request.user_prompt.contains("https://example.com"));
    }
}
