//! The four intensity transforms.
//!
//! Each transform builds a lookup table with the pure functions in
//! [`calculations`](super::calculations) and rewrites the color samples of an
//! 8-bit image in place. Alpha samples are never touched.
//!
//! | Transform | Table | Scope |
//! |---|---|---|
//! | Histogram Equalization | per-channel CDF | each color channel independently |
//! | Contrast Stretching | 2nd–98th percentile rescale | all color channels pooled |
//! | Log Compression | `255·log2(1 + v/255)` | every color sample |
//! | Reverse Video | `255 − v` | every color sample |

use super::calculations::{
    Lut, equalization_lut, histogram, invert_lut, log_lut, percentile, stretch_lut,
};
use super::params::{StretchRange, Transform};
use image::DynamicImage;

/// Convert any decoded image to an 8-bit-per-sample layout the transforms understand.
///
/// Gray stays gray, RGB stays RGB; alpha is kept when present. Higher bit
/// depths and float images are reduced to 8 bits, so exact round trips
/// (Reverse Video twice) hold for the reduced samples, not the 16-bit input.
pub fn to_8bit(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => img,
        other => {
            let color = other.color();
            match (color.has_color(), color.has_alpha()) {
                (false, false) => DynamicImage::ImageLuma8(other.to_luma8()),
                (false, true) => DynamicImage::ImageLumaA8(other.to_luma_alpha8()),
                (true, false) => DynamicImage::ImageRgb8(other.to_rgb8()),
                (true, true) => DynamicImage::ImageRgba8(other.to_rgba8()),
            }
        }
    }
}

/// Interleaved sample view of an 8-bit image.
struct Samples<'a> {
    data: &'a mut [u8],
    channels: usize,
    color_channels: usize,
}

impl Samples<'_> {
    fn channel(&self, c: usize) -> impl Iterator<Item = u8> + '_ {
        self.data.iter().skip(c).step_by(self.channels).copied()
    }

    fn color(&self) -> impl Iterator<Item = u8> + '_ {
        let channels = self.channels;
        let color_channels = self.color_channels;
        self.data
            .iter()
            .enumerate()
            .filter(move |(i, _)| i % channels < color_channels)
            .map(|(_, &s)| s)
    }

    fn map_channel(&mut self, c: usize, lut: &Lut) {
        for s in self.data.iter_mut().skip(c).step_by(self.channels) {
            *s = lut[*s as usize];
        }
    }

    fn map_color(&mut self, lut: &Lut) {
        for c in 0..self.color_channels {
            self.map_channel(c, lut);
        }
    }
}

/// Borrow the samples of an image already passed through [`to_8bit`].
///
/// Returns `None` for layouts `to_8bit` never produces.
fn samples(img: &mut DynamicImage) -> Option<Samples<'_>> {
    let (data, channels, color_channels): (&mut [u8], usize, usize) = match img {
        DynamicImage::ImageLuma8(buf) => (&mut **buf, 1, 1),
        DynamicImage::ImageLumaA8(buf) => (&mut **buf, 2, 1),
        DynamicImage::ImageRgb8(buf) => (&mut **buf, 3, 3),
        DynamicImage::ImageRgba8(buf) => (&mut **buf, 4, 3),
        _ => return None,
    };
    Some(Samples {
        data,
        channels,
        color_channels,
    })
}

/// Equalize each color channel against its own cumulative distribution.
pub fn equalize_histogram(img: &mut DynamicImage) {
    let Some(mut s) = samples(img) else { return };
    for c in 0..s.color_channels {
        let lut = equalization_lut(&histogram(s.channel(c)));
        s.map_channel(c, &lut);
    }
}

/// Rescale so the `range.low` percentile becomes 0 and `range.high` becomes 255.
///
/// Percentiles are taken over all color samples pooled. When both
/// percentiles coincide the image is left unchanged.
pub fn stretch_contrast(img: &mut DynamicImage, range: StretchRange) {
    let Some(mut s) = samples(img) else { return };
    let hist = histogram(s.color());
    let (Some(low), Some(high)) = (percentile(&hist, range.low), percentile(&hist, range.high))
    else {
        return;
    };
    if let Some(lut) = stretch_lut(low, high) {
        s.map_color(&lut);
    }
}

/// Logarithmic brightening curve.
pub fn compress_log(img: &mut DynamicImage) {
    if let Some(mut s) = samples(img) {
        s.map_color(&log_lut());
    }
}

/// Photographic negative. Applying it twice restores the input exactly.
pub fn reverse_video(img: &mut DynamicImage) {
    if let Some(mut s) = samples(img) {
        s.map_color(&invert_lut());
    }
}

/// Apply one transform in place.
pub fn apply(img: &mut DynamicImage, transform: Transform, stretch: StretchRange) {
    match transform {
        Transform::HistogramEqualization => equalize_histogram(img),
        Transform::ContrastStretching => stretch_contrast(img, stretch),
        Transform::LogCompression => compress_log(img),
        Transform::ReverseVideo => reverse_video(img),
    }
}
