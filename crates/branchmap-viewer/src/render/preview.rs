use anyhow::{Context, Result};
use bevy::log::warn;
use bevy_egui::egui;
use branchmap_core::{Attachment, NodeHandle};

/// Preview images are shown at most this tall, in canvas units.
pub const MAX_PREVIEW_HEIGHT: f32 = 150.0;

/// Cached per-node texture for an image attachment.
#[derive(Clone)]
pub enum Preview {
    Ready(egui::TextureHandle),
    /// Undecodable data; the node falls back to a name chip.
    Broken,
}

/// Decodes attachment bytes into egui pixels.
pub fn decode(attachment: &Attachment) -> Result<egui::ColorImage> {
    let bytes = attachment.decoded().context("attachment is not valid base64")?;
    let rgba = image::load_from_memory(&bytes)
        .context("cannot decode image")?
        .to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

/// Uploads the preview texture for `node`, once.
pub fn load(ctx: &egui::Context, node: NodeHandle, attachment: &Attachment) -> Preview {
    match decode(attachment) {
        Ok(pixels) => Preview::Ready(ctx.load_texture(
            format!("attachment-{}-{}", node.0, attachment.name),
            pixels,
            Default::default(),
        )),
        Err(e) => {
            warn!(%node, name = %attachment.name, "no preview: {e:#}");
            Preview::Broken
        }
    }
}

/// Display size: native size, scaled down to fit `max_width` and the height cap.
pub fn fit(size: egui::Vec2, max_width: f32) -> egui::Vec2 {
    if size.x <= 0.0 || size.y <= 0.0 {
        return egui::Vec2::ZERO;
    }
    let scale = (MAX_PREVIEW_HEIGHT / size.y).min(max_width / size.x).min(1.0);
    size * scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png_attachment() {
        let a = Attachment::from_bytes("dot.png", "image/png", &png(3, 2));
        let pixels = decode(&a).unwrap();
        assert_eq!(pixels.size, [3, 2]);
        assert_eq!(pixels.pixels[0], egui::Color32::from_rgb(10, 20, 30));
    }

    #[test]
    fn garbage_bytes_are_an_error() {
        let a = Attachment::from_bytes("fake.png", "image/png", b"not an image");
        assert!(decode(&a).is_err());
    }

    #[test]
    fn tall_images_are_capped() {
        let shown = fit(egui::vec2(600.0, 1200.0), 400.0);
        assert_eq!(shown.y, MAX_PREVIEW_HEIGHT);
        assert_eq!(shown.x, 75.0);
        assert_eq!(fit(egui::vec2(40.0, 20.0), 400.0), egui::vec2(40.0, 20.0));
        let wide = fit(egui::vec2(1600.0, 200.0), 400.0);
        assert_eq!(wide.x, 400.0);
    }
}
