use std::time::Instant;

use image::RgbaImage;

use crate::foundation::core::Millis;
use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::pipeline::frame::FilterTiming;

/// Image and the duration the filter reports for producing it.
#[derive(Clone, Debug)]
pub struct FilterOutput {
    /// Filtered image.
    pub image: RgbaImage,
    /// Self-reported duration in milliseconds.
    pub duration_ms: Millis,
}

/// One named step of the external filter pipeline.
///
/// The producer records the reported durations but never interprets what a filter does.
pub trait Filter: Send {
    /// Step name, used to aggregate timings across frames.
    fn name(&self) -> &str;
    /// Transform `image`.
    fn apply(&mut self, image: RgbaImage) -> StreamViewResult<FilterOutput>;
}

/// Adapter turning a closure into a [`Filter`] that reports its own wall time.
pub struct FnFilter<F> {
    name: String,
    f: F,
}

impl<F> FnFilter<F>
where
    F: FnMut(RgbaImage) -> StreamViewResult<RgbaImage> + Send,
{
    /// Named closure filter.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Filter for FnFilter<F>
where
    F: FnMut(RgbaImage) -> StreamViewResult<RgbaImage> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&mut self, image: RgbaImage) -> StreamViewResult<FilterOutput> {
        let started = Instant::now();
        let image = (self.f)(image)?;
        Ok(FilterOutput {
            image,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

/// Ordered list of filter steps.
#[derive(Default)]
pub struct FilterPipeline {
    steps: Vec<Box<dyn Filter>>,
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl FilterPipeline {
    /// Empty pipeline; frames pass through unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with(mut self, step: impl Filter + 'static) -> Self {
        self.push(step);
        self
    }

    /// Append a step.
    pub fn push(&mut self, step: impl Filter + 'static) {
        self.steps.push(Box::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order, collecting per-step timings.
    ///
    /// The first failing step aborts the run; its name is included in the error.
    pub fn run(&mut self, image: RgbaImage) -> StreamViewResult<(RgbaImage, Vec<FilterTiming>)> {
        let mut image = image;
        let mut timings = Vec::with_capacity(self.steps.len());
        for step in &mut self.steps {
            let out = step.apply(image).map_err(|e| {
                StreamViewError::producer(format!("filter '{}' failed: {e}", step.name()))
            })?;
            timings.push(FilterTiming {
                name: step.name().to_owned(),
                duration_ms: out.duration_ms.max(0.0),
            });
            image = out.image;
        }
        Ok((image, timings))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/filter.rs"]
mod tests;
