//! Inline development sourcemaps.
//!
//! The map is file-level: it names the entry stylesheet and embeds its
//! source so browser devtools can show the original Sass next to the
//! compiled CSS.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;

const MAPPING_PREFIX: &str = "/*# sourceMappingURL=data:application/json;charset=utf-8;base64,";

/// Build a version 3 source map for `output_name` compiled from `source_name`.
pub fn source_map(output_name: &str, source_name: &str, source: &str) -> String {
    json!({
        "version": 3,
        "file": output_name,
        "sources": [source_name],
        "sourcesContent": [source],
        "names": [],
        "mappings": "AAAA",
    })
    .to_string()
}

/// Append the map to `css` as a base64 data URL comment.
pub fn inline(css: &str, map: &str) -> String {
    let mut out = css.trim_end().to_string();
    out.push('\n');
    out.push_str(MAPPING_PREFIX);
    out.push_str(&STANDARD.encode(map));
    out.push_str(" */\n");
    out
}

pub fn has_inline_map(css: &str) -> bool {
    css.contains("sourceMappingURL=")
}
