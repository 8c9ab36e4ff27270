use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use roast_contracts::{Critique, Severity};

pub const EMPTY_FINDINGS_NOTE: &str =
    "No findings. Either the site is flawless or the AI ran out of insults.";

pub fn severity_badge(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "CRITICAL FAIL",
        Severity::Bad => "BAD",
        Severity::Nitpick => "NITPICK",
    }
}

pub fn render_terminal(critique: &Critique) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "ROAST SCORE: {}/100 ({})\n",
        critique.score,
        critique.tier().as_str()
    ));
    out.push_str(&format!("\"{}\"\n\n", critique.one_liner));

    if critique.sections.is_empty() {
        out.push_str(EMPTY_FINDINGS_NOTE);
        out.push_str("\n\n");
    } else {
        out.push_str(&format!("Findings: {}\n\n", severity_tally(critique)));
    }
    for finding in &critique.sections {
        out.push_str(&format!(
            "[{}] {}\n",
            severity_badge(finding.severity),
            finding.title
        ));
        for line in finding.content.lines() {
            out.push_str(&format!("  {line}\n"));
        }
        out.push('\n');
    }

    out.push_str("FINAL THOUGHTS\n");
    out.push_str(&critique.verdict);
    out.push('\n');
    out
}

pub fn severity_tally(critique: &Critique) -> String {
    Severity::ALL
        .iter()
        .map(|severity| {
            format!(
                "{} {}",
                critique.count_by_severity(*severity),
                severity.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_html(critique: &Critique, url: Option<&str>) -> String {
    let mut cards = String::new();
    for finding in &critique.sections {
        cards.push_str(&format!(
            "<div class='card {severity}'><div class='badge'>{badge}</div><h3>{title}</h3><p>{content}</p></div>",
            severity = finding.severity.as_str(),
            badge = severity_badge(finding.severity),
            title = escape_html(&finding.title),
            content = escape_html(&finding.content),
        ));
    }
    if cards.is_empty() {
        cards = format!("<p class='empty'>{}</p>", escape_html(EMPTY_FINDINGS_NOTE));
    }
    let subject = url
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| format!("<div class='url'>{}</div>", escape_html(value)))
        .unwrap_or_default();

    format!(
        "<!doctype html>\n<html>\n<head>\n  <meta charset='utf-8'>\n  <title>Roast Report</title>\n  <style>\n    body {{ font-family: Arial, sans-serif; background: #111; color: #eee; margin: 0; padding: 24px; }}\n    .score {{ font-size: 64px; font-weight: bold; }}\n    .score.good {{ color: #4ade80; }}\n    .score.meh {{ color: #facc15; }}\n    .score.trash {{ color: #f87171; }}\n    .one-liner {{ font-size: 20px; font-style: italic; margin: 8px 0 24px; }}\n    .grid {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(280px, 1fr)); gap: 16px; }}\n    .card {{ background: #1c1c1c; border-radius: 10px; padding: 14px; border-left: 4px solid #666; }}\n    .card.critical {{ border-color: #ef4444; }}\n    .card.bad {{ border-color: #f97316; }}\n    .card.nitpick {{ border-color: #a3a3a3; }}\n    .badge {{ font-size: 11px; font-weight: bold; letter-spacing: 1px; }}\n    .verdict {{ margin-top: 24px; padding: 14px; background: #1c1c1c; border-radius: 10px; }}\n  </style>\n</head>\n<body>\n  <h1>Roast Report</h1>\n  {subject}\n  <div class='score {tier}'>{score}/100</div>\n  <div class='one-liner'>&quot;{one_liner}&quot;</div>\n  <div class='grid'>\n    {cards}\n  </div>\n  <div class='verdict'><h2>Final Thoughts</h2><p>{verdict}</p></div>\n</body>\n</html>\n",
        tier = critique.tier().as_str(),
        score = critique.score,
        one_liner = escape_html(&critique.one_liner),
        verdict = escape_html(&critique.verdict),
    )
}

pub fn write_html(critique: &Critique, url: Option<&str>, out_path: &Path) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
    }
    fs::write(out_path, render_html(critique, url))
        .with_context(|| format!("failed writing {}", out_path.display()))?;
    Ok(())
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;

    use roast_contracts::{Critique, Finding, Severity};

    use super::{escape_html, render_html, render_terminal, write_html, EMPTY_FINDINGS_NOTE};

    fn critique(sections: Vec<Finding>) -> Critique {
        Critique {
            score: 12,
            one_liner: "Brutal.".to_string(),
            sections,
            verdict: "Fix it.".to_string(),
        }
    }

    fn finding(title: &str, severity: Severity) -> Finding {
        Finding {
            title: title.to_string(),
            content: "Bad.".to_string(),
            severity,
        }
    }

    #[test]
    fn terminal_output_keeps_finding_order_and_badges() {
        let text = render_terminal(&critique(vec![
            finding("Typography", Severity::Critical),
            finding("Spacing", Severity::Nitpick),
        ]));
        assert!(text.starts_with("ROAST SCORE: 12/100 (trash)\n\"Brutal.\""));
        let typography = text.find("[CRITICAL FAIL] Typography");
        let spacing = text.find("[NITPICK] Spacing");
        assert!(typography.is_some() && spacing.is_some());
        assert!(typography < spacing);
        assert!(text.trim_end().ends_with("FINAL THOUGHTS\nFix it."));
        assert!(!text.contains(EMPTY_FINDINGS_NOTE));
        assert!(text.contains("Findings: 1 critical, 0 bad, 1 nitpick\n"));
    }

    #[test]
    fn empty_findings_print_a_note() {
        let text = render_terminal(&critique(Vec::new()));
        assert!(text.contains(EMPTY_FINDINGS_NOTE));
        assert!(!text.contains('['));
        assert!(!text.contains("Findings:"));
    }

    #[test]
    fn html_escapes_model_text() {
        let mut hostile = critique(vec![finding("<script>alert(1)</script>", Severity::Bad)]);
        hostile.verdict = "Tom & Jerry's \"site\"".to_string();
        let html = render_html(&hostile, Some("https://example.com/?a=<b>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("Tom &amp; Jerry&#x27;s &quot;site&quot;"));
        assert!(html.contains("https://example.com/?a=&lt;b&gt;"));
        assert!(html.contains("class='card bad'"));
    }

    #[test]
    fn html_export_writes_file_with_parent_dirs() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let out = temp.path().join("nested").join("roast.html");
        write_html(&critique(Vec::new()), None, &out)?;
        let html = fs::read_to_string(&out)?;
        assert!(html.starts_with("<!doctype html>"));
        assert!(html.contains("12/100"));
        Ok(())
    }

    #[test]
    fn escape_html_covers_all_special_chars() {
        assert_eq!(escape_html("&<>\"'x"), "&amp;&lt;&gt;&quot;&#x27;x");
    }
}
