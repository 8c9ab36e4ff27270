use roast_contracts::error::UNPARSEABLE_REPLY_MESSAGE;
use roast_contracts::schema::critique_schema;
use roast_contracts::{Critique, RoastError};
use serde_json::Value;

/// Parses gateway text into a `Critique`, all or nothing.
///
/// Shape is checked against the declared schema before deserializing, so a
/// reply that ignored the schema fails with the offending path.
pub fn parse_critique(text: &str) -> Result<Critique, RoastError> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(&body)
        .map_err(|err| RoastError::parse(format!("{UNPARSEABLE_REPLY_MESSAGE} ({err})")))?;
    critique_schema()
        .validate(&value)
        .map_err(|violation| {
            RoastError::parse(format!("{UNPARSEABLE_REPLY_MESSAGE} ({violation})"))
        })?;
    serde_json::from_value(value)
        .map_err(|err| RoastError::parse(format!("{UNPARSEABLE_REPLY_MESSAGE} ({err})")))
}

fn strip_code_fence(text: &str) -> String {
    let raw = text.trim();
    if !(raw.starts_with("```") && raw.ends_with("```")) {
        return raw.to_string();
    }
    let lines: Vec<&str> = raw.lines().collect();
    if lines.len() < 2 {
        return raw.to_string();
    }
    let mut body = lines[1..lines.len() - 1].join("\n").trim().to_string();
    if body.to_ascii_lowercase().starts_with("json") {
        body = body[4..].trim().to_string();
    }
    body
}

#[cfg(test)]
mod tests {
    use roast_contracts::{RoastErrorKind, Severity};

    use super::{parse_critique, strip_code_fence};

    const EXACT: &str = r#"{"score":12,"oneLiner":"Brutal.","sections":[{"title":"Typography","content":"Bad.","severity":"critical"}],"verdict":"Fix it."}"#;

    #[test]
    fn exact_reply_parses_field_for_field() -> anyhow::Result<()> {
        let critique = parse_critique(EXACT)?;
        assert_eq!(critique.score, 12);
        assert_eq!(critique.one_liner, "Brutal.");
        assert_eq!(critique.sections.len(), 1);
        assert_eq!(critique.sections[0].title, "Typography");
        assert_eq!(critique.sections[0].content, "Bad.");
        assert_eq!(critique.sections[0].severity, Severity::Critical);
        assert_eq!(critique.verdict, "Fix it.");
        Ok(())
    }

    #[test]
    fn section_order_is_preserved() -> anyhow::Result<()> {
        let critique = parse_critique(
            r#"{"score":40,"oneLiner":"x","sections":[
                {"title":"Spacing","content":"a","severity":"nitpick"},
                {"title":"Contrast","content":"b","severity":"critical"},
                {"title":"Stock art","content":"c","severity":"bad"}
            ],"verdict":"v"}"#,
        )?;
        let titles: Vec<&str> = critique
            .sections
            .iter()
            .map(|finding| finding.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Spacing", "Contrast", "Stock art"]);
        Ok(())
    }

    #[test]
    fn missing_verdict_is_a_parse_error() {
        let err = parse_critique(r#"{"score":12,"oneLiner":"Brutal.","sections":[]}"#).unwrap_err();
        assert_eq!(err.kind(), RoastErrorKind::Parse);
        assert!(err.message().contains("verdict"));
    }

    #[test]
    fn unknown_severity_is_a_parse_error() {
        let err = parse_critique(
            r#"{"score":12,"oneLiner":"x","sections":[{"title":"t","content":"c","severity":"unknown"}],"verdict":"v"}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), RoastErrorKind::Parse);
        assert!(err.message().contains("$.sections[0].severity"));
    }

    #[test]
    fn finding_missing_content_is_a_parse_error() {
        let err = parse_critique(
            r#"{"score":12,"oneLiner":"x","sections":[{"title":"t","severity":"bad"}],"verdict":"v"}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), RoastErrorKind::Parse);
        assert!(err.message().contains("content"));
    }

    #[test]
    fn non_json_is_a_parse_error() {
        let err = parse_critique("Your site is bad and you should feel bad.").unwrap_err();
        assert_eq!(err.kind(), RoastErrorKind::Parse);
        assert!(err
            .message()
            .starts_with("The roast was so intense it broke the parser."));
    }

    #[test]
    fn out_of_range_scores_and_empty_sections_are_accepted() -> anyhow::Result<()> {
        let low = parse_critique(r#"{"score":-50,"oneLiner":"x","sections":[],"verdict":"v"}"#)?;
        assert_eq!(low.score, -50);
        assert!(low.sections.is_empty());
        let high = parse_critique(r#"{"score":9999,"oneLiner":"x","sections":[],"verdict":"v"}"#)?;
        assert_eq!(high.score, 9999);
        Ok(())
    }

    #[test]
    fn unrepresentable_score_is_a_parse_error() {
        let err = parse_critique(r#"{"score":1e20,"oneLiner":"x","sections":[],"verdict":"v"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), RoastErrorKind::Parse);
        assert!(err.message().contains("score is not a representable integer"));
    }

    #[test]
    fn fenced_reply_is_unwrapped() -> anyhow::Result<()> {
        let fenced = format!("```json\n{EXACT}\n```");
        assert_eq!(parse_critique(&fenced)?.score, 12);
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
        Ok(())
    }
}
