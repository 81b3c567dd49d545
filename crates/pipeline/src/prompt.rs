//! Prompt templates and `{placeholder}` rendering.

/// Topic classification prompt.
///
/// Placeholders: `data_type`, `content`.
pub const CLASSIFY_TEMPLATE: &str = r#"You are labelling customer communications for a retail bank.

Read the {data_type} below and classify it.

{content}

Answer with a single JSON object and nothing else:
{"dominant_topic": "<short topic name>", "subtopics": ["<subtopic>", "..."]}
"#;

/// Content generation prompt.
///
/// Placeholders: `data_type`, `topic`, `subtopics`, `fields`.
pub const GENERATE_TEMPLATE: &str = r#"You are writing realistic synthetic banking data.

Write one {data_type} from a bank customer about "{topic}" (subtopics: {subtopics}).
Keep it plausible and self-contained. Do not use real names, account numbers or card numbers.

Answer with a single JSON object and nothing else, with exactly these keys:
{fields}

"sentiment" must be one of "positive", "neutral" or "negative" and "summary" must be one sentence.
"#;

/// Substitute `{name}` placeholders in a single pass.
///
/// Braces that do not enclose a known name are copied through unchanged, so
/// literal JSON in a template survives. Substituted values are never
/// re-scanned.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let value = after[name_len..]
            .starts_with('}')
            .then(|| vars.iter().find(|(key, _)| *key == &after[..name_len]))
            .flatten();

        match value {
            Some((_, value)) => {
                out.push_str(value);
                rest = &after[name_len + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_names() {
        assert_eq!(
            render("a {x} b {y}", &[("x", "1"), ("y", "2")]),
            "a 1 b 2"
        );
    }

    #[test]
    fn leaves_json_and_unknown_names_alone() {
        let out = render(r#"{"k": "{v}"} {missing}"#, &[("v", "val")]);
        assert_eq!(out, r#"{"k": "val"} {missing}"#);
    }

    #[test]
    fn values_are_not_rescanned() {
        assert_eq!(render("{a}", &[("a", "{b}"), ("b", "no")]), "{b}");
    }

    #[test]
    fn templates_render_without_leftover_placeholders() {
        let out = render(
            CLASSIFY_TEMPLATE,
            &[("data_type", "email"), ("content", "Subject: hi")],
        );
        assert!(out.contains("Subject: hi"));
        assert!(!out.contains("{content}"));
        assert!(out.contains(r#"{"dominant_topic""#));
    }
}
