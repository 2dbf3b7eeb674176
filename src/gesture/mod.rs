//! Gesture recognition: samples in, symbolic paths out.
//!
//! Pipeline: [`sampler::TouchSampler`] normalizes raw contacts,
//! [`context::ContextDetector`] assigns the zone prefix once per
//! gesture, and [`classifier::GestureClassifier`] grows the path and
//! decides when it is ready for dispatch.

pub mod classifier;
pub mod context;
pub mod glyph;
pub mod path;
pub mod sampler;
