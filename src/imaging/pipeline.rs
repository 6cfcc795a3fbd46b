//! Ordered composition of the enabled transforms.
//!
//! The pipeline always walks the transforms in [`Transform::ALL`] order
//! (Histogram Equalization → Contrast Stretching → Log Compression →
//! Reverse Video) and feeds each enabled step the previous step's output.
//! How the flags were supplied never changes that order.

use super::operations::{apply, to_8bit};
use super::params::{StretchRange, Transform};
use crate::signature::SelectionVector;
use image::DynamicImage;

/// The steps the pipeline will run for `selection`, in execution order.
pub fn plan(selection: &SelectionVector) -> Vec<Transform> {
    selection.transforms()
}

/// Run every enabled transform over `image` and return the composed result.
///
/// With no transform enabled the input comes back untouched.
pub fn run(image: DynamicImage, selection: &SelectionVector, stretch: StretchRange) -> DynamicImage {
    run_timed(image, selection, stretch).0
}

/// Like [`run`], also reporting how long each step took.
pub fn run_timed(
    image: DynamicImage,
    selection: &SelectionVector,
    stretch: StretchRange,
) -> (DynamicImage, Vec<(Transform, std::time::Duration)>) {
    let steps = plan(selection);
    if steps.is_empty() {
        return (image, Vec::new());
    }
    let mut working = to_8bit(image);
    let mut timings = Vec::with_capacity(steps.len());
    for step in steps {
        let started = std::time::Instant::now();
        apply(&mut working, step, stretch);
        timings.push((step, started.elapsed()));
    }
    (working, timings)
}
