//! Image fixtures shared by unit tests

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;

/// APP1 segment carrying a big-endian TIFF block with a single Orientation entry
fn exif_orientation_segment(orientation: u16) -> Vec<u8> {
    let [hi, lo] = orientation.to_be_bytes();
    let mut segment = vec![0xFF, 0xE1, 0x00, 0x22];
    segment.extend_from_slice(b"Exif\0\0");
    // TIFF header: "MM", magic 42, first IFD at offset 8
    segment.extend_from_slice(&[0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
    // One entry: tag 0x0112, SHORT, count 1, value, then no next IFD
    segment.extend_from_slice(&[0x00, 0x01]);
    segment.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, hi, lo, 0x00, 0x00]);
    segment.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    segment
}

/// A landscape JPEG, red on the left half and blue on the right
pub(crate) fn split_jpeg(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([220, 20, 20])
        } else {
            Rgb([20, 20, 220])
        }
    }));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

/// Same pixels as [`split_jpeg`], tagged with EXIF orientation 6 (rotate 90° clockwise)
pub(crate) fn rotated_split_jpeg(width: u32, height: u32) -> Vec<u8> {
    let plain = split_jpeg(width, height);
    assert_eq!(&plain[..2], &[0xFF, 0xD8]);

    let mut tagged = plain[..2].to_vec();
    tagged.extend(exif_orientation_segment(6));
    tagged.extend_from_slice(&plain[2..]);
    tagged
}

#[test]
fn test_exif_segment_length_matches_header() {
    let segment = exif_orientation_segment(6);
    let declared = u16::from_be_bytes([segment[2], segment[3]]) as usize;
    assert_eq!(declared, segment.len() - 2);
}
