//! Cover discovery among embedded images

use crate::types::CoverImage;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use std::io::Cursor;

/// Size and shape test for image XObjects that may be a book cover
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverHeuristic {
    /// Images must be strictly wider than this
    pub min_width: i64,
    /// Inclusive window for height / width
    pub min_ratio: f64,
    pub max_ratio: f64,
    /// Skip 1-bit images (scanned text pages)
    pub exclude_bitonal: bool,
}

impl Default for CoverHeuristic {
    fn default() -> Self {
        Self {
            min_width: 150,
            min_ratio: 1.4,
            max_ratio: 1.7,
            exclude_bitonal: true,
        }
    }
}

impl CoverHeuristic {
    pub fn is_candidate(&self, width: i64, height: i64, bits_per_component: i64) -> bool {
        if width <= self.min_width || height <= 0 {
            return false;
        }
        if self.exclude_bitonal && bits_per_component == 1 {
            return false;
        }
        let ratio = height as f64 / width as f64;
        ratio >= self.min_ratio && ratio <= self.max_ratio
    }
}

fn integer(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).ok().and_then(|o| o.as_i64().ok())
}

fn name(object: &Object) -> Option<&[u8]> {
    match object {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

/// Last filter in the stream's filter chain
fn final_filter(dict: &Dictionary) -> Option<Vec<u8>> {
    match dict.get(b"Filter").ok()? {
        Object::Array(filters) => filters.last().and_then(name).map(<[u8]>::to_vec),
        other => name(other).map(<[u8]>::to_vec),
    }
}

/// Scan image XObjects in object-number order and extract the first candidate
pub fn find_cover(document: &Document, heuristic: &CoverHeuristic) -> Option<CoverImage> {
    for (id, object) in &document.objects {
        let Object::Stream(stream) = object else {
            continue;
        };
        let dict = &stream.dict;
        if dict.get(b"Subtype").ok().and_then(name) != Some(b"Image".as_slice()) {
            continue;
        }

        let width = integer(dict, b"Width").unwrap_or(0);
        let height = integer(dict, b"Height").unwrap_or(0);
        let is_mask = dict
            .get(b"ImageMask")
            .ok()
            .and_then(|o| o.as_bool().ok())
            .unwrap_or(false);
        let bpc = integer(dict, b"BitsPerComponent").unwrap_or(if is_mask { 1 } else { 8 });
        if !heuristic.is_candidate(width, height, bpc) {
            continue;
        }

        match extract_image(document, stream, width, height, bpc) {
            Some(cover) => {
                tracing::debug!("PDF cover candidate {:?} ({}x{})", id, width, height);
                return Some(cover.with_source(format!("{} {} R", id.0, id.1)));
            }
            None => tracing::debug!("Skipping undecodable image {:?}", id),
        }
    }
    None
}

fn extract_image(
    document: &Document,
    stream: &Stream,
    width: i64,
    height: i64,
    bpc: i64,
) -> Option<CoverImage> {
    match final_filter(&stream.dict).as_deref() {
        Some(b"DCTDecode") => {
            let bytes = match stream.dict.get(b"Filter") {
                // Filters before DCTDecode have to be undone first
                Ok(Object::Array(filters)) if filters.len() > 1 => decode_prefix_filters(stream)?,
                _ => stream.content.clone(),
            };
            Some(CoverImage::new(bytes, "image/jpeg"))
        }
        Some(b"JPXDecode") => Some(CoverImage::new(stream.content.clone(), "image/jp2")),
        Some(b"FlateDecode") | None => {
            if bpc != 8 {
                return None;
            }
            let raw = match stream.dict.get(b"Filter") {
                Ok(_) => stream.decompressed_content().ok()?,
                Err(_) => stream.content.clone(),
            };
            let components = color_components(document, &stream.dict)?;
            encode_png(&raw, width as u32, height as u32, components)
                .map(|png| CoverImage::new(png, "image/png"))
        }
        _ => None,
    }
}

/// Content with every filter but the final DCTDecode undone
fn decode_prefix_filters(stream: &Stream) -> Option<Vec<u8>> {
    let Ok(Object::Array(filters)) = stream.dict.get(b"Filter") else {
        return None;
    };
    let leading: Vec<Object> = filters[..filters.len().saturating_sub(1)].to_vec();
    let mut partial = stream.clone();
    partial.dict.set("Filter", Object::Array(leading));
    partial.decompressed_content().ok()
}

fn color_components(document: &Document, dict: &Dictionary) -> Option<u8> {
    let space = match dict.get(b"ColorSpace").ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?,
        direct => direct,
    };
    match name(space)? {
        b"DeviceRGB" => Some(3),
        b"DeviceGray" => Some(1),
        _ => None,
    }
}

fn encode_png(raw: &[u8], width: u32, height: u32, components: u8) -> Option<Vec<u8>> {
    let expected = width as usize * height as usize * components as usize;
    if raw.len() < expected {
        return None;
    }
    let pixels = raw[..expected].to_vec();
    let image = match components {
        3 => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, pixels)?),
        _ => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, pixels)?),
    };
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).ok()?;
    Some(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use proptest::prelude::*;

    #[test]
    fn test_portrait_cover_is_accepted() {
        let heuristic = CoverHeuristic::default();
        assert!(heuristic.is_candidate(300, 450, 8));
    }

    #[test]
    fn test_tall_strip_is_rejected() {
        assert!(!CoverHeuristic::default().is_candidate(300, 1000, 8));
    }

    #[test]
    fn test_bitonal_is_rejected() {
        let heuristic = CoverHeuristic::default();
        assert!(!heuristic.is_candidate(300, 450, 1));
        let lenient = CoverHeuristic {
            exclude_bitonal: false,
            ..heuristic
        };
        assert!(lenient.is_candidate(300, 450, 1));
    }

    #[test]
    fn test_narrow_image_is_rejected() {
        assert!(!CoverHeuristic::default().is_candidate(150, 225, 8));
        assert!(CoverHeuristic::default().is_candidate(151, 227, 8));
    }

    fn image_stream(width: i64, height: i64, bpc: i64, filter: &str, content: Vec<u8>) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "BitsPerComponent" => bpc,
                "ColorSpace" => "DeviceRGB",
                "Filter" => filter,
            },
            content,
        )
    }

    #[test]
    fn test_first_matching_stream_wins() {
        let mut document = Document::with_version("1.5");
        document.add_object(image_stream(300, 1000, 8, "DCTDecode", b"strip".to_vec()));
        document.add_object(image_stream(300, 450, 1, "DCTDecode", b"bitonal".to_vec()));
        document.add_object(image_stream(300, 450, 8, "DCTDecode", b"cover".to_vec()));
        document.add_object(image_stream(400, 600, 8, "DCTDecode", b"later".to_vec()));

        let cover = find_cover(&document, &CoverHeuristic::default()).unwrap();
        assert_eq!(cover.bytes, b"cover");
        assert_eq!(cover.mime_type, "image/jpeg");
    }

    #[test]
    fn test_raw_rgb_is_reencoded_as_png() {
        let mut document = Document::with_version("1.5");
        let mut stream = image_stream(160, 240, 8, "FlateDecode", vec![90u8; 160 * 240 * 3]);
        stream.dict.remove(b"Filter");
        document.add_object(stream);

        let cover = find_cover(&document, &CoverHeuristic::default()).unwrap();
        assert_eq!(cover.mime_type, "image/png");
        assert_eq!(image::guess_format(&cover.bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_no_images() {
        let document = Document::with_version("1.5");
        assert!(find_cover(&document, &CoverHeuristic::default()).is_none());
    }

    proptest! {
        #[test]
        fn prop_candidates_respect_ratio_window(width in 151i64..4000, height in 1i64..8000) {
            let heuristic = CoverHeuristic::default();
            let ratio = height as f64 / width as f64;
            prop_assert_eq!(
                heuristic.is_candidate(width, height, 8),
                (1.4..=1.7).contains(&ratio)
            );
        }
    }
}
