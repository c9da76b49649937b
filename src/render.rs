// CPU rendering module
// Composes the current image into a window-sized Argb8888 buffer

use crate::image_loader::ImageData;
use image::RgbaImage;

/// Background colour in buffer byte order (B, G, R, A): opaque black
pub const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

/// Convert decoded RGBA pixels to the buffer byte order.
///
/// Wayland's Argb8888 is little-endian, so each pixel is stored as B, G, R, A.
/// Translucent pixels are blended over the background so the buffer can be
/// presented as fully opaque.
pub fn composite_over_background(rgba: RgbaImage) -> Vec<u8> {
    let mut data = rgba.into_raw();
    for pixel in data.chunks_exact_mut(4) {
        let a = pixel[3] as u16;
        let blend = |c: u8, bg: u8| ((c as u16 * a + bg as u16 * (255 - a) + 127) / 255) as u8;
        let (r, g, b) = (pixel[0], pixel[1], pixel[2]);
        pixel[0] = blend(b, BACKGROUND[0]);
        pixel[1] = blend(g, BACKGROUND[1]);
        pixel[2] = blend(r, BACKGROUND[2]);
        pixel[3] = 255;
    }
    data
}

/// Fill the canvas with the background and copy the part of `image` that is
/// visible when its top-left corner sits at `dest`.
pub fn compose(canvas: &mut [u8], width: u32, height: u32, image: &ImageData, dest: (i32, i32)) {
    let stride = width as usize * 4;
    if stride == 0 {
        return;
    }
    // Never trust the canvas to be as large as advertised
    let rows = (height as usize).min(canvas.len() / stride);
    let canvas = &mut canvas[..rows * stride];

    for pixel in canvas.chunks_exact_mut(4) {
        pixel.copy_from_slice(&BACKGROUND);
    }

    let (dx, dy) = (dest.0 as i64, dest.1 as i64);
    let x0 = dx.max(0);
    let y0 = dy.max(0);
    let x1 = (dx + image.width as i64).min(width as i64);
    let y1 = (dy + image.height as i64).min(rows as i64);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let span = (x1 - x0) as usize * 4;
    let src_x = (x0 - dx) as usize;
    let src_stride = image.width as usize * 4;

    for y in y0..y1 {
        let src_y = (y - dy) as usize;
        let src = src_y * src_stride + src_x * 4;
        let dst = y as usize * stride + x0 as usize * 4;
        canvas[dst..dst + span].copy_from_slice(&image.pixels[src..src + span]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};

    const RED: [u8; 4] = [0, 0, 255, 255];

    fn solid(width: u32, height: u32) -> ImageData {
        let rgba = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
        ImageData::from_rgba("red.png".to_string(), ImageFormat::Png, rgba)
    }

    fn pixel(canvas: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * width + x) * 4) as usize;
        [canvas[idx], canvas[idx + 1], canvas[idx + 2], canvas[idx + 3]]
    }

    #[test]
    fn test_compose_places_image_at_destination() {
        let mut canvas = vec![0xAA; 4 * 4 * 4];
        compose(&mut canvas, 4, 4, &solid(2, 2), (1, 1));

        for y in 0..4 {
            for x in 0..4 {
                let inside = (1..3).contains(&x) && (1..3).contains(&y);
                let expected = if inside { RED } else { BACKGROUND };
                assert_eq!(pixel(&canvas, 4, x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_compose_clips_negative_destination() {
        let mut canvas = vec![0; 3 * 3 * 4];
        compose(&mut canvas, 3, 3, &solid(4, 4), (-3, -3));

        assert_eq!(pixel(&canvas, 3, 0, 0), RED);
        assert_eq!(pixel(&canvas, 3, 1, 0), BACKGROUND);
        assert_eq!(pixel(&canvas, 3, 0, 1), BACKGROUND);
    }

    #[test]
    fn test_compose_clips_past_the_far_edge() {
        let mut canvas = vec![0; 3 * 3 * 4];
        compose(&mut canvas, 3, 3, &solid(10, 10), (2, 2));

        assert_eq!(pixel(&canvas, 3, 2, 2), RED);
        assert_eq!(pixel(&canvas, 3, 1, 2), BACKGROUND);
        assert_eq!(pixel(&canvas, 3, 2, 1), BACKGROUND);
    }

    #[test]
    fn test_compose_fully_off_canvas() {
        let mut canvas = vec![0; 2 * 2 * 4];
        compose(&mut canvas, 2, 2, &solid(2, 2), (50, -50));
        assert!(canvas.chunks_exact(4).all(|p| p == BACKGROUND));
    }

    #[test]
    fn test_compose_short_canvas_is_not_overrun() {
        // One row short of what the dimensions promise
        let mut canvas = vec![0; 2 * 4];
        compose(&mut canvas, 2, 2, &solid(2, 2), (0, 0));
        assert_eq!(pixel(&canvas, 2, 1, 0), RED);
    }

    #[test]
    fn test_composite_swaps_channels_and_blends_alpha() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        rgba.put_pixel(1, 0, Rgba([200, 100, 50, 0]));

        let data = composite_over_background(rgba);
        assert_eq!(&data[0..4], &[30, 20, 10, 255]);
        assert_eq!(&data[4..8], &[0, 0, 0, 255]);
    }
}
