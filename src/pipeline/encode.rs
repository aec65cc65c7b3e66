use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::layer::config::{Encoding, EncodingFormat};
use crate::view::viewport::ViewRect;

/// Encode an RGBA image with the layer's encoding settings.
///
/// JPEG drops the alpha channel.
pub fn encode_image(img: &RgbaImage, encoding: Encoding) -> StreamViewResult<Vec<u8>> {
    let mut buf = Vec::new();
    match encoding.format {
        EncodingFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).into_rgb8();
            JpegEncoder::new_with_quality(&mut buf, encoding.quality.clamp(1, 100))
                .encode_image(&rgb)
                .map_err(|e| StreamViewError::encode(format!("jpeg: {e}")))?;
        }
        EncodingFormat::Png => {
            PngEncoder::new(&mut buf)
                .write_image(
                    img.as_raw(),
                    img.width(),
                    img.height(),
                    ExtendedColorType::Rgba8,
                )
                .map_err(|e| StreamViewError::encode(format!("png: {e}")))?;
        }
    }
    Ok(buf)
}

/// Region captured from a source frame.
#[derive(Clone, Debug)]
pub struct Capture {
    /// Output image, `(out_w + 2*overscan) x (out_h + 2*overscan)`.
    pub image: RgbaImage,
    /// Normalized source-space center of the capture, set when overscan is non-zero.
    pub anchor: Option<(f64, f64)>,
}

/// Crop `view` (normalized source coordinates) out of `src` and resize it to `out_w x out_h`.
///
/// With `overscan > 0` the crop grows by `overscan` output pixels on every side, so the result
/// is larger than the display rect. Parts of that margin falling outside the source stay
/// transparent rather than stretching the image, which keeps the capture centered on the anchor.
pub fn capture_region(
    src: &RgbaImage,
    view: ViewRect,
    out_w: u32,
    out_h: u32,
    overscan: u32,
) -> StreamViewResult<Capture> {
    let (sw, sh) = src.dimensions();
    if sw == 0 || sh == 0 {
        return Err(StreamViewError::producer("source frame is empty"));
    }
    if out_w == 0 || out_h == 0 {
        return Err(StreamViewError::producer("output size must be > 0"));
    }

    let sw_f = f64::from(sw);
    let sh_f = f64::from(sh);
    let crop_w = (view.width * sw_f).max(1.0);
    let crop_h = (view.height * sh_f).max(1.0);
    let o = f64::from(overscan);
    // Overscan is expressed in output pixels; convert to source pixels per axis.
    let ox = o * crop_w / f64::from(out_w);
    let oy = o * crop_h / f64::from(out_h);

    let rx0 = view.x * sw_f - ox;
    let ry0 = view.y * sh_f - oy;
    let rw = crop_w + 2.0 * ox;
    let rh = crop_h + 2.0 * oy;

    let padded = |side: u32| {
        overscan
            .checked_mul(2)
            .and_then(|margin| side.checked_add(margin))
            .ok_or_else(|| StreamViewError::producer("capture size with overscan overflows"))
    };
    let total_w = padded(out_w)?;
    let total_h = padded(out_h)?;

    let ix0 = rx0.max(0.0).floor();
    let iy0 = ry0.max(0.0).floor();
    let ix1 = (rx0 + rw).min(sw_f).ceil();
    let iy1 = (ry0 + rh).min(sh_f).ceil();
    if ix1 <= ix0 || iy1 <= iy0 {
        return Err(StreamViewError::producer(
            "capture region does not intersect the source",
        ));
    }

    let crop = imageops::crop_imm(
        src,
        ix0 as u32,
        iy0 as u32,
        (ix1 - ix0) as u32,
        (iy1 - iy0) as u32,
    )
    .to_image();

    let sx = f64::from(total_w) / rw;
    let sy = f64::from(total_h) / rh;
    let dest_x = ((ix0 - rx0) * sx).round() as i64;
    let dest_y = ((iy0 - ry0) * sy).round() as i64;
    let dest_w = (((ix1 - ix0) * sx).round() as u32).clamp(1, total_w);
    let dest_h = (((iy1 - iy0) * sy).round() as u32).clamp(1, total_h);

    let resized = if (dest_w, dest_h) == crop.dimensions() {
        crop
    } else {
        imageops::resize(&crop, dest_w, dest_h, FilterType::Triangle)
    };

    let image = if dest_x == 0 && dest_y == 0 && (dest_w, dest_h) == (total_w, total_h) {
        resized
    } else {
        let mut canvas = RgbaImage::new(total_w, total_h);
        imageops::overlay(&mut canvas, &resized, dest_x, dest_y);
        canvas
    };

    let anchor = (overscan > 0).then(|| view.center());
    Ok(Capture { image, anchor })
}

/// Small uncropped thumbnail for the nav window, encoded as JPEG.
pub fn nav_thumbnail(src: &RgbaImage, max_width: u32) -> StreamViewResult<Vec<u8>> {
    let (w, h) = src.dimensions();
    let tw = max_width.clamp(1, w.max(1));
    let th = ((u64::from(h) * u64::from(tw)) / u64::from(w.max(1))).max(1) as u32;
    let thumb = imageops::thumbnail(src, tw, th);
    encode_image(
        &thumb,
        Encoding {
            format: EncodingFormat::Jpeg,
            quality: 60,
        },
    )
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/encode.rs"]
mod tests;
