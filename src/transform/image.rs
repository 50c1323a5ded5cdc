// src/transform/image.rs

//! Lossless image optimization for production builds.
//!
//! Only metadata is removed; pixel data is never re-encoded:
//! - PNG: `tEXt`, `zTXt`, `iTXt` and `tIME` chunks,
//! - JPEG: APP1..APP13, APP15 and COM segments (APP0/JFIF and APP14/Adobe
//!   affect decoding and are kept),
//! - GIF: validated and passed through.

use std::path::Path;

use crate::errors::{PipelineError, Result};

const STAGE: &str = "imagemin";

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";
const PNG_DROPPED_CHUNKS: [&[u8; 4]; 4] = [b"tEXt", b"zTXt", b"iTXt", b"tIME"];

/// Optimize an image based on its extension. Unknown extensions pass
/// through unchanged.
pub fn optimize(path: &Path, bytes: &[u8]) -> Result<Vec<u8>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let result = match ext.as_deref() {
        Some("png") => strip_png(bytes),
        Some("jpg") | Some("jpeg") => strip_jpeg(bytes),
        Some("gif") => check_gif(bytes).map(|()| bytes.to_vec()),
        _ => Ok(bytes.to_vec()),
    };
    result.map_err(|msg| PipelineError::transform(STAGE, format!("{}: {msg}", path.display())))
}

fn strip_png(bytes: &[u8]) -> std::result::Result<Vec<u8>, String> {
    if bytes.len() < PNG_SIGNATURE.len() || &bytes[..8] != PNG_SIGNATURE {
        return Err("not a PNG file".to_string());
    }

    let mut out = Vec::with_capacity(bytes.len());
    out.extend_from_slice(PNG_SIGNATURE);

    let mut pos = 8;
    let mut seen_end = false;
    while pos < bytes.len() {
        // length(4) + type(4) + data(length) + crc(4)
        let header = bytes
            .get(pos..pos + 8)
            .ok_or_else(|| format!("truncated chunk header at byte {pos}"))?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = &header[4..8];
        let end = pos + 12 + len;
        let chunk = bytes
            .get(pos..end)
            .ok_or_else(|| format!("truncated chunk at byte {pos}"))?;

        if !PNG_DROPPED_CHUNKS.iter().any(|d| d.as_slice() == kind) {
            out.extend_from_slice(chunk);
        }
        pos = end;
        if kind == b"IEND" {
            seen_end = true;
            break;
        }
    }

    if !seen_end {
        return Err("missing IEND chunk".to_string());
    }
    Ok(out)
}

fn strip_jpeg(bytes: &[u8]) -> std::result::Result<Vec<u8>, String> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return Err("not a JPEG file".to_string());
    }

    let mut out = Vec::with_capacity(bytes.len());
    out.extend_from_slice(&bytes[..2]);

    let mut pos = 2;
    loop {
        let marker = bytes
            .get(pos..pos + 2)
            .ok_or_else(|| format!("truncated marker at byte {pos}"))?;
        if marker[0] != 0xFF {
            return Err(format!("expected marker at byte {pos}"));
        }
        let code = marker[1];

        // Fill bytes.
        if code == 0xFF {
            pos += 1;
            continue;
        }

        // Standalone markers without a length field.
        if code == 0x01 || (0xD0..=0xD7).contains(&code) {
            out.extend_from_slice(marker);
            pos += 2;
            continue;
        }

        // End of image before any scan.
        if code == 0xD9 {
            out.extend_from_slice(marker);
            return Ok(out);
        }

        let len_bytes = bytes
            .get(pos + 2..pos + 4)
            .ok_or_else(|| format!("truncated segment length at byte {pos}"))?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        if len < 2 {
            return Err(format!("invalid segment length at byte {pos}"));
        }
        let end = pos + 2 + len;
        let segment = bytes
            .get(pos..end)
            .ok_or_else(|| format!("truncated segment at byte {pos}"))?;

        // Start of scan: entropy-coded data follows, copy the rest verbatim.
        if code == 0xDA {
            out.extend_from_slice(&bytes[pos..]);
            return Ok(out);
        }

        let dropped = (0xE1..=0xED).contains(&code) || code == 0xEF || code == 0xFE;
        if !dropped {
            out.extend_from_slice(segment);
        }
        pos = end;
    }
}

fn check_gif(bytes: &[u8]) -> std::result::Result<(), String> {
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Ok(())
    } else {
        Err("not a GIF file".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut c = (data.len() as u32).to_be_bytes().to_vec();
        c.extend_from_slice(kind);
        c.extend_from_slice(data);
        c.extend_from_slice(&[0, 0, 0, 0]); // crc is not verified
        c
    }

    #[test]
    fn png_text_chunks_are_removed() {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend(png_chunk(b"IHDR", &[0; 13]));
        png.extend(png_chunk(b"tEXt", b"Software\0Editor"));
        png.extend(png_chunk(b"IDAT", &[1, 2, 3]));
        png.extend(png_chunk(b"IEND", &[]));

        let out = optimize(Path::new("a.png"), &png).unwrap();
        assert!(out.len() < png.len());
        assert!(!out.windows(4).any(|w| w == b"tEXt"));
        assert!(out.windows(4).any(|w| w == b"IDAT"));
    }

    #[test]
    fn jpeg_exif_and_comments_are_removed() {
        let mut jpg = vec![0xFF, 0xD8];
        jpg.extend([0xFF, 0xE0, 0x00, 0x04, 0x4A, 0x46]); // APP0 kept
        jpg.extend([0xFF, 0xE1, 0x00, 0x05, 1, 2, 3]); // APP1 (Exif) dropped
        jpg.extend([0xFF, 0xFE, 0x00, 0x04, b'h', b'i']); // COM dropped
        jpg.extend([0xFF, 0xDA, 0x00, 0x02, 9, 9, 9, 0xFF, 0xD9]);

        let out = optimize(Path::new("photo.JPG"), &jpg).unwrap();
        assert_eq!(
            out,
            vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0x4A, 0x46, 0xFF, 0xDA, 0x00, 0x02, 9, 9, 9, 0xFF, 0xD9]
        );
    }

    #[test]
    fn malformed_images_fail() {
        assert!(optimize(Path::new("a.png"), b"nope").is_err());
        assert!(optimize(Path::new("a.jpg"), &[0xFF, 0xD8, 0xFF, 0xE1, 0x00]).is_err());
        assert!(optimize(Path::new("a.gif"), b"GIF89a....").is_ok());
        assert!(optimize(Path::new("a.gif"), b"PNG").is_err());
    }
}
