use anyhow::{anyhow, Result};

/// Capture formats the camera source can turn into RGB24.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Yuyv,
    Nv12,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"NV12" => Some(PixelFormat::Nv12),
            _ => None,
        }
    }

    fn frame_len(self, width: usize, height: usize) -> Option<usize> {
        let area = width.checked_mul(height)?;
        match self {
            PixelFormat::Rgb24 => area.checked_mul(3),
            PixelFormat::Yuyv => area.checked_mul(2),
            PixelFormat::Nv12 => area.checked_add(area / 2),
        }
    }
}

/// Convert one captured buffer to packed RGB24. Drivers may hand back
/// buffers padded past the frame; trailing bytes are ignored.
pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    let expected = format
        .frame_len(w, h)
        .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))?;
    let pixels = pixels.get(..expected).ok_or_else(|| {
        anyhow!(
            "{:?} frame too short: expected {} bytes, got {}",
            format,
            expected,
            pixels.len()
        )
    })?;

    match format {
        PixelFormat::Rgb24 => Ok(pixels.to_vec()),
        PixelFormat::Yuyv => Ok(yuyv_to_rgb(pixels, w, h)),
        PixelFormat::Nv12 => Ok(nv12_to_rgb(pixels, w, h)),
    }
}

fn yuyv_to_rgb(pixels: &[u8], w: usize, h: usize) -> Vec<u8> {
    let mut rgb = vec![0u8; w * h * 3];
    for j in 0..h {
        for i in 0..w {
            let pair = j * w * 2 + (i / 2) * 4;
            let y = pixels[j * w * 2 + i * 2];
            let u = pixels[pair + 1];
            let v = pixels[pair + 3];
            write_yuv(&mut rgb[(j * w + i) * 3..], y, u, v);
        }
    }
    rgb
}

fn nv12_to_rgb(pixels: &[u8], w: usize, h: usize) -> Vec<u8> {
    let y_plane = w * h;
    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            write_yuv(
                &mut rgb[(j * w + i) * 3..],
                pixels[j * w + i],
                pixels[uv_index],
                pixels[uv_index + 1],
            );
        }
    }
    rgb
}

fn write_yuv(out: &mut [u8], y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    out[0] = clamp_to_u8(y + 1.402_f32 * v);
    out[1] = clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
    out[2] = clamp_to_u8(y + 1.772_f32 * u);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_is_gray() -> Result<()> {
        let nv12 = [vec![128u8; 4], vec![128u8; 2]].concat();
        assert_eq!(normalize_to_rgb(&nv12, 2, 2, PixelFormat::Nv12)?, vec![128u8; 12]);

        let yuyv = vec![90u8, 128, 90, 128];
        assert_eq!(normalize_to_rgb(&yuyv, 2, 1, PixelFormat::Yuyv)?, vec![90u8; 6]);
        Ok(())
    }

    #[test]
    fn rgb_passes_through_and_drops_padding() -> Result<()> {
        let mut pixels = vec![1u8; 9];
        pixels.extend([0u8; 3]);
        let rgb = normalize_to_rgb(&pixels, 1, 3, PixelFormat::Rgb24)?;
        assert_eq!(rgb, vec![1u8; 9]);
        Ok(())
    }

    #[test]
    fn short_buffers_fail() {
        assert!(normalize_to_rgb(&[0u8; 5], 2, 2, PixelFormat::Yuyv).is_err());
    }

    #[test]
    fn maps_fourcc_codes() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), None);
    }
}
