//! Per-format codec chains.
//!
//! | Format | Chain | Crate |
//! |---|---|---|
//! | PNG | lossless re-encode, adaptive filtering | `image::codecs::png` |
//! | JPEG | lossy re-encode at `jpeg_quality` | `image::codecs::jpeg` |
//! | GIF | frame-preserving re-encode | `image::codecs::gif` |
//! | SVG | strip comments/metadata → collapse whitespace | `regex` |
//!
//! Every step keeps the smaller of its input and output, so a chain never
//! grows a file.

use crate::cache::hash_codec_params;
use crate::config::{ImagesConfig, PngCompression};
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{AnimationDecoder, DynamicImage};
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Image formats the pipeline knows how to compress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Svg,
}

impl ImageKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "gif" => Some(ImageKind::Gif),
            "svg" => Some(ImageKind::Svg),
            _ => None,
        }
    }
}

/// One compression step.
pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stable description of the codec and its parameters, fed into the
    /// cache's params fingerprint.
    fn describe(&self) -> String;

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Ordered codecs applied to one format.
pub struct CodecChain {
    codecs: Vec<Box<dyn Codec>>,
    params_hash: String,
}

impl CodecChain {
    pub fn new(codecs: Vec<Box<dyn Codec>>) -> Self {
        let descriptions: Vec<String> = codecs.iter().map(|c| c.describe()).collect();
        let params_hash = hash_codec_params(descriptions.iter().map(String::as_str));
        Self {
            codecs,
            params_hash,
        }
    }

    pub fn params_hash(&self) -> &str {
        &self.params_hash
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.codecs.iter().map(|c| c.name()).collect()
    }

    pub fn run(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut current = input.to_vec();
        for codec in &self.codecs {
            let out = codec.compress(&current)?;
            if out.len() < current.len() {
                current = out;
            }
        }
        Ok(current)
    }
}

/// Codec chains keyed by format.
pub struct CodecSet {
    chains: BTreeMap<ImageKind, CodecChain>,
}

impl CodecSet {
    pub fn new(chains: BTreeMap<ImageKind, CodecChain>) -> Self {
        Self { chains }
    }

    pub fn from_config(config: &ImagesConfig) -> Self {
        let mut chains = BTreeMap::new();
        chains.insert(
            ImageKind::Png,
            CodecChain::new(vec![Box::new(PngCodec {
                compression: config.png_compression,
            })]),
        );
        chains.insert(
            ImageKind::Jpeg,
            CodecChain::new(vec![Box::new(JpegCodec {
                quality: config.jpeg_quality,
            })]),
        );
        let gif: Vec<Box<dyn Codec>> = if config.optimize_gif {
            vec![Box::new(GifCodec)]
        } else {
            Vec::new()
        };
        chains.insert(ImageKind::Gif, CodecChain::new(gif));
        chains.insert(
            ImageKind::Svg,
            CodecChain::new(vec![
                Box::new(SvgStrip {
                    remove_view_box: config.svg_remove_view_box,
                }),
                Box::new(SvgCollapse),
            ]),
        );
        Self { chains }
    }

    pub fn chain(&self, kind: ImageKind) -> Option<&CodecChain> {
        self.chains.get(&kind)
    }
}

fn decode(input: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(input).map_err(|e| CodecError::Decode(e.to_string()))
}

pub struct PngCodec {
    pub compression: PngCompression,
}

impl Codec for PngCodec {
    fn name(&self) -> &'static str {
        "png"
    }

    fn describe(&self) -> String {
        format!("png compression={:?} filter=adaptive", self.compression)
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let img = decode(input)?;
        let compression = match self.compression {
            PngCompression::Fast => CompressionType::Fast,
            PngCompression::Default => CompressionType::Default,
            PngCompression::Best => CompressionType::Best,
        };
        let mut out = Vec::new();
        let encoder = PngEncoder::new_with_quality(&mut out, compression, FilterType::Adaptive);
        img.write_with_encoder(encoder)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(out)
    }
}

pub struct JpegCodec {
    pub quality: u8,
}

impl Codec for JpegCodec {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn describe(&self) -> String {
        format!("jpeg quality={}", self.quality)
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgb8(decode(input)?.to_rgb8());
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
        rgb.write_with_encoder(encoder)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(out)
    }
}

pub struct GifCodec;

impl Codec for GifCodec {
    fn name(&self) -> &'static str {
        "gif"
    }

    fn describe(&self) -> String {
        "gif reencode repeat=infinite".to_string()
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let decoder =
            GifDecoder::new(Cursor::new(input)).map_err(|e| CodecError::Decode(e.to_string()))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        let mut out = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut out);
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
            encoder
                .encode_frames(frames)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
        }
        Ok(out)
    }
}

static SVG_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static SVG_METADATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<metadata\b.*?</metadata>").unwrap());
static SVG_VIEW_BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+viewBox="[^"]*""#).unwrap());
static SVG_BETWEEN_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());
static SVG_TEXT_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<text\b.*?</text>").unwrap());

fn svg_text(input: &[u8]) -> Result<&str, CodecError> {
    std::str::from_utf8(input).map_err(|e| CodecError::Decode(format!("svg is not utf-8: {e}")))
}

/// Drops comments and `<metadata>` blocks, optionally the `viewBox`.
pub struct SvgStrip {
    pub remove_view_box: bool,
}

impl Codec for SvgStrip {
    fn name(&self) -> &'static str {
        "svg-strip"
    }

    fn describe(&self) -> String {
        format!("svg-strip remove_view_box={}", self.remove_view_box)
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let text = svg_text(input)?;
        let text = SVG_COMMENT.replace_all(text, "");
        let mut text = SVG_METADATA.replace_all(&text, "").into_owned();
        if self.remove_view_box {
            text = SVG_VIEW_BOX.replace_all(&text, "").into_owned();
        }
        Ok(text.into_bytes())
    }
}

/// Removes whitespace between tags, except inside `<text>` where it renders.
pub struct SvgCollapse;

impl Codec for SvgCollapse {
    fn name(&self) -> &'static str {
        "svg-collapse"
    }

    fn describe(&self) -> String {
        "svg-collapse".to_string()
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let text = svg_text(input)?;
        // Whitespace outside <text> never renders.
        let collapse =
            |segment: &str| SVG_BETWEEN_TAGS.replace_all(segment.trim(), "><").into_owned();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for element in SVG_TEXT_ELEMENT.find_iter(text) {
            out.push_str(&collapse(&text[last..element.start()]));
            out.push_str(element.as_str());
            last = element.end();
        }
        out.push_str(&collapse(&text[last..]));
        Ok(out.into_bytes())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::sync::Mutex;

    /// Codec that counts invocations and returns a fixed payload.
    pub struct CountingCodec {
        pub calls: Mutex<u32>,
        pub output: Vec<u8>,
        pub fail: bool,
    }

    impl CountingCodec {
        pub fn new(output: &[u8]) -> Self {
            Self {
                calls: Mutex::new(0),
                output: output.to_vec(),
                fail: false,
            }
        }

        pub fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl Codec for CountingCodec {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn describe(&self) -> String {
            format!("counting output={}", self.output.len())
        }

        fn compress(&self, _input: &[u8]) -> Result<Vec<u8>, CodecError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                Err(CodecError::Decode("corrupt".into()))
            } else {
                Ok(self.output.clone())
            }
        }
    }

    /// Shares a `CountingCodec` so the test keeps a handle to its counter.
    pub struct SharedCodec(pub std::sync::Arc<CountingCodec>);

    impl Codec for SharedCodec {
        fn name(&self) -> &'static str {
            self.0.name()
        }

        fn describe(&self) -> String {
            self.0.describe()
        }

        fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
            self.0.compress(input)
        }
    }

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn kind_from_extension() {
        assert_eq!(ImageKind::from_path(Path::new("a.PNG")), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_path(Path::new("a.jpeg")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("a.jpg")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("a.svg")), Some(ImageKind::Svg));
        assert_eq!(ImageKind::from_path(Path::new("a.webp")), None);
        assert_eq!(ImageKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn chain_keeps_smaller_result() {
        let grow = CountingCodec::new(b"much longer than the input");
        let chain = CodecChain::new(vec![Box::new(grow)]);
        assert_eq!(chain.run(b"tiny").unwrap(), b"tiny");
    }

    #[test]
    fn chain_params_hash_tracks_config() {
        let a = CodecSet::from_config(&ImagesConfig::default());
        let b = CodecSet::from_config(&ImagesConfig {
            jpeg_quality: 70,
            ..ImagesConfig::default()
        });
        assert_ne!(
            a.chain(ImageKind::Jpeg).unwrap().params_hash(),
            b.chain(ImageKind::Jpeg).unwrap().params_hash()
        );
        assert_eq!(
            a.chain(ImageKind::Png).unwrap().params_hash(),
            b.chain(ImageKind::Png).unwrap().params_hash()
        );
    }

    #[test]
    fn default_set_covers_every_format() {
        let set = CodecSet::from_config(&ImagesConfig::default());
        assert_eq!(set.chain(ImageKind::Png).unwrap().names(), vec!["png"]);
        assert_eq!(set.chain(ImageKind::Jpeg).unwrap().names(), vec!["jpeg"]);
        assert_eq!(set.chain(ImageKind::Gif).unwrap().names(), vec!["gif"]);
        assert_eq!(
            set.chain(ImageKind::Svg).unwrap().names(),
            vec!["svg-strip", "svg-collapse"]
        );
    }

    #[test]
    fn png_codec_roundtrips_pixels() {
        let input = png_bytes(16, 16);
        let out = PngCodec {
            compression: PngCompression::Best,
        }
        .compress(&input)
        .unwrap();
        let img = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (16, 16));
        assert_eq!(img.get_pixel(3, 3), &Rgba([200, 30, 30, 255]));
    }

    #[test]
    fn jpeg_codec_drops_alpha() {
        let out = JpegCodec { quality: 80 }.compress(&png_bytes(8, 8)).unwrap();
        assert_eq!(
            image::guess_format(&out).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn corrupt_input_is_decode_error() {
        let err = PngCodec {
            compression: PngCompression::Fast,
        }
        .compress(b"not a png")
        .unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn svg_strip_keeps_view_box_by_default() {
        let svg = br#"<svg viewBox="0 0 10 10"><!-- editor --><metadata>x</metadata><rect/></svg>"#;
        let out = SvgStrip {
            remove_view_box: false,
        }
        .compress(svg)
        .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, r#"<svg viewBox="0 0 10 10"><rect/></svg>"#);
    }

    #[test]
    fn svg_strip_can_drop_view_box() {
        let out = SvgStrip {
            remove_view_box: true,
        }
        .compress(br#"<svg viewBox="0 0 1 1"></svg>"#)
        .unwrap();
        assert_eq!(out, b"<svg></svg>");
    }

    #[test]
    fn svg_collapse_joins_tags() {
        let out = SvgCollapse
            .compress(b"  <svg>\n  <g>\n    <path/>\n  </g>\n</svg>\n")
            .unwrap();
        assert_eq!(out, b"<svg><g><path/></g></svg>");
    }

    #[test]
    fn svg_collapse_keeps_spacing_inside_text() {
        let out = SvgCollapse
            .compress(b"<svg>\n  <text x=\"0\"><tspan>a</tspan> <tspan>b</tspan></text>\n  <g>\n  </g>\n</svg>")
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<svg><text x="0"><tspan>a</tspan> <tspan>b</tspan></text><g></g></svg>"#
        );
    }
}
