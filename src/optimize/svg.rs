//! SVG markup cleanup.
//!
//! A set of regex passes over the document text, not a full XML rewrite:
//!
//! - drop the XML declaration, comments, `<!DOCTYPE>` and `<metadata>`
//! - collapse whitespace between tags that spans a line break, unless the
//!   document contains `<text>` (where whitespace can be significant)
//! - optionally drop a root `viewBox` that just repeats `0 0 width height`

use super::{ImageFormat, OptimizeError, Optimizer};
use regex::Regex;
use std::sync::LazyLock;

static XML_DECL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<\?xml.*?\?>").unwrap());
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static DOCTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<!DOCTYPE[^\[>]*(?:\[.*?\])?\s*>").unwrap());
static METADATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<metadata\b(?:[^>]*/>|.*?</metadata\s*>)").unwrap()
});
static INTER_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s*\n\s*<").unwrap());
static ROOT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<svg\b[^>]*>").unwrap());
static VIEW_BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+viewBox\s*=\s*["']([^"']*)["']"#).unwrap());
static WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\swidth\s*=\s*["']([\d.]+)(?:px)?["']"#).unwrap());
static HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sheight\s*=\s*["']([\d.]+)(?:px)?["']"#).unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct SvgOptimizer {
    pub remove_view_box: bool,
}

impl Optimizer for SvgOptimizer {
    fn format(&self) -> ImageFormat {
        ImageFormat::Svg
    }

    fn optimize(&self, data: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        let text = std::str::from_utf8(data)
            .map_err(|e| OptimizeError::malformed(ImageFormat::Svg, e.to_string()))?;
        if !ROOT_TAG.is_match(text) {
            return Err(OptimizeError::malformed(ImageFormat::Svg, "no <svg> element"));
        }
        Ok(self.clean(text).into_bytes())
    }
}

impl SvgOptimizer {
    pub fn clean(&self, text: &str) -> String {
        let mut svg = XML_DECL.replace_all(text, "").into_owned();
        svg = COMMENT.replace_all(&svg, "").into_owned();
        svg = DOCTYPE.replace_all(&svg, "").into_owned();
        svg = METADATA.replace_all(&svg, "").into_owned();
        if !svg.contains("<text") {
            svg = INTER_TAG.replace_all(&svg, "><").into_owned();
        }
        if self.remove_view_box {
            svg = drop_redundant_view_box(&svg);
        }
        svg.trim().to_string()
    }
}

fn drop_redundant_view_box(svg: &str) -> String {
    let Some(root) = ROOT_TAG.find(svg) else {
        return svg.to_string();
    };
    let tag = root.as_str();
    let Some(view_box) = VIEW_BOX.captures(tag) else {
        return svg.to_string();
    };
    let (Some(width), Some(height)) = (capture_number(&WIDTH, tag), capture_number(&HEIGHT, tag))
    else {
        return svg.to_string();
    };

    let values: Vec<f64> = view_box[1]
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    if values != [0.0, 0.0, width, height] {
        return svg.to_string();
    }

    let Some(whole) = view_box.get(0) else {
        return svg.to_string();
    };
    let start = root.start() + whole.start();
    let end = root.start() + whole.end();
    format!("{}{}", &svg[..start], &svg[end..])
}

fn capture_number(re: &Regex, tag: &str) -> Option<f64> {
    re.captures(tag)?.get(1)?.as_str().parse().ok()
}
