use std::collections::HashSet;

/// Clean rich-text post content using the ammonia library.
///
/// Whitelist-based: keeps basic formatting and links, strips scripts,
/// iframes, inline styles and event handler attributes. Links get
/// `rel="noopener noreferrer nofollow"`.
pub fn clean_html(input: &str) -> String {
    let tags: HashSet<&str> = [
        "p", "br", "b", "strong", "i", "em", "u", "s", "ul", "ol", "li", "blockquote", "a", "h3", "h4",
        "code", "pre",
    ]
    .into_iter()
    .collect();

    ammonia::Builder::default()
        .tags(tags)
        .link_rel(Some("noopener noreferrer nofollow"))
        .clean(input)
        .to_string()
}

/// Strips every tag, for fields rendered as plain text (titles, comments,
/// messages). Entities stay escaped.
pub fn plain_text(input: &str) -> String {
    ammonia::Builder::empty().clean(input).to_string().trim().to_string()
}
