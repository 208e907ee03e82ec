use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn code_block_regex() -> &'static Regex {
    static CODE_BLOCK: OnceLock<Regex> = OnceLock::new();
    CODE_BLOCK.get_or_init(|| Regex::new(r"(?s)```.*?```").expect("code block pattern compiles"))
}

/// Escapes HTML in post and comment bodies. Fenced code blocks (```) are kept verbatim.
/// Existing entities are decoded first so text is never escaped twice.
pub fn sanitize_markdown_content(markdown_input: &str) -> String {
    let mut code_blocks: Vec<String> = Vec::new();

    let with_placeholders = code_block_regex().replace_all(markdown_input, |caps: &regex::Captures| {
        code_blocks.push(caps[0].to_string());
        format!("__CODE_BLOCK_PLACEHOLDER_{}__", code_blocks.len() - 1)
    });

    let decoded = html_escape::decode_html_entities(&with_placeholders);
    let mut output = html_escape::encode_text(&decoded).to_string();

    for (i, block) in code_blocks.iter().enumerate() {
        let placeholder = format!("__CODE_BLOCK_PLACEHOLDER_{}__", i);
        output = output.replacen(&placeholder, block, 1);
    }

    output
}

/// Strips every tag, for titles, categories, tags and share platforms.
/// The result is plain text: ammonia's entity escaping is undone so `Q&A` stays `Q&A`.
pub fn strip_all_html(input: &str) -> String {
    let cleaned = ammonia::Builder::new().tags(HashSet::new()).clean(input).to_string();
    html_escape::decode_html_entities(&cleaned).into_owned()
}

pub fn strip_all_html_opt(input: Option<&str>) -> Option<String> {
    input.map(strip_all_html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_outside_code_blocks() {
        let out = sanitize_markdown_content("Hello <script>alert(1)</script>\n```\n<b>kept</b>\n```");
        assert!(out.starts_with("Hello &lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(out.ends_with("```\n<b>kept</b>\n```"));
    }

    #[test]
    fn does_not_double_escape() {
        assert_eq!(sanitize_markdown_content("a &lt; b"), "a &lt; b");
        assert_eq!(sanitize_markdown_content(&sanitize_markdown_content("<i>")), "&lt;i&gt;");
    }

    #[test]
    fn strips_tags_from_plain_fields() {
        assert_eq!(strip_all_html("<b>Breaking</b> news"), "Breaking news");
        assert_eq!(strip_all_html_opt(None), None);
    }

    #[test]
    fn plain_fields_keep_ampersands_and_angle_brackets() {
        assert_eq!(strip_all_html("Q&A"), "Q&A");
        assert_eq!(strip_all_html("C&C <i>ops</i>"), "C&C ops");
        assert_eq!(strip_all_html("1 < 2"), "1 < 2");
    }
}
