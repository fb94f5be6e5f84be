//! Image decode/encode and detection visualization

use crate::domain::RawDetection;
use crate::error::EngineError;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::io::Cursor;

const BOX_THICKNESS: u32 = 3;

/// Per-class box colours, indexed by class id modulo length
const PALETTE: [Rgb<u8>; 8] = [
    Rgb([255, 56, 56]),
    Rgb([255, 157, 151]),
    Rgb([255, 112, 31]),
    Rgb([255, 178, 29]),
    Rgb([207, 210, 49]),
    Rgb([72, 249, 10]),
    Rgb([26, 147, 52]),
    Rgb([0, 194, 255]),
];

/// Decode an uploaded photo into 8-bit RGB
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, EngineError> {
    let image = image::load_from_memory(bytes).map_err(EngineError::Decode)?;
    Ok(image.to_rgb8())
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Jpeg)?;
    Ok(buffer.into_inner())
}

pub fn jpeg_data_uri(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}

pub fn class_colour(class_id: u32) -> Rgb<u8> {
    PALETTE[class_id as usize % PALETTE.len()]
}

/// Copy of `image` with every detection drawn as a hollow box
pub fn draw_detections(image: &RgbImage, detections: &[RawDetection]) -> RgbImage {
    let mut canvas = image.clone();
    let (width, height) = canvas.dimensions();

    for detection in detections {
        let Some((x, y, w, h)) = detection.bbox.to_pixel_rect(width, height) else {
            continue;
        };
        let colour = class_colour(detection.class_id);
        for inset in 0..BOX_THICKNESS {
            if w <= 2 * inset || h <= 2 * inset {
                break;
            }
            let rect = Rect::at(x + inset as i32, y + inset as i32)
                .of_size(w - 2 * inset, h - 2 * inset);
            draw_hollow_rect_mut(&mut canvas, rect, colour);
        }
    }

    canvas
}

/// Render detections and encode the result for transport
pub fn annotate(image: &RgbImage, detections: &[RawDetection]) -> Result<String, EngineError> {
    let rendered = draw_detections(image, detections);
    let jpeg = encode_jpeg(&rendered).map_err(EngineError::Encode)?;
    Ok(jpeg_data_uri(&jpeg))
}
