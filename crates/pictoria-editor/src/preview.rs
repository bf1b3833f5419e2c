//! Latest-wins preview rendering.
//!
//! Each stage has a generation counter. Starting a render bumps the counter
//! and remembers the value; a render whose generation is no longer current
//! when it finishes is dropped.
//!
//! Two intermediates are cached: the geometry + aspect output, reused while
//! only color or corners change, and the color output on top of it, reused
//! while only corners change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use pictoria_core::pipeline::{render_stages, RenderOptions};
use pictoria_core::{
    AspectPreset, ColorAdjustment, EditParameters, PipelineError, PixelBuffer, Stage,
    TransformParameters,
};

use crate::error::Result;

/// A rendered preview.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub stage: Stage,
    pub generation: u64,
    /// Parameters the frame was rendered with.
    pub params: EditParameters,
    pub buffer: PixelBuffer,
}

/// Token for one started render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewTicket {
    pub stage: Stage,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
struct FramingKey {
    source: usize,
    transform: TransformParameters,
    aspect: AspectPreset,
    options: RenderOptions,
}

impl FramingKey {
    fn new(source: &Arc<PixelBuffer>, params: &EditParameters, options: &RenderOptions) -> Self {
        Self {
            source: Arc::as_ptr(source) as usize,
            transform: params.transform,
            aspect: params.aspect,
            options: *options,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ColorKey {
    framing: FramingKey,
    color: ColorAdjustment,
}

#[derive(Debug)]
struct Cached<K> {
    key: K,
    buffer: Arc<PixelBuffer>,
}

type Slot<K> = Mutex<Option<Cached<K>>>;

/// Renders stage previews with latest-wins semantics.
#[derive(Debug, Default)]
pub struct PreviewRenderer {
    generations: [AtomicU64; 4],
    framed: Slot<FramingKey>,
    colored: Slot<ColorKey>,
}

impl PreviewRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a render for `stage`, superseding any render still in flight.
    pub fn begin(&self, stage: Stage) -> PreviewTicket {
        let generation = self.generations[stage.index()].fetch_add(1, Ordering::AcqRel) + 1;
        PreviewTicket { stage, generation }
    }

    /// True if no newer render has started for the ticket's stage.
    pub fn is_current(&self, ticket: PreviewTicket) -> bool {
        self.generations[ticket.stage.index()].load(Ordering::Acquire) == ticket.generation
    }

    /// Render the preview for `ticket`.
    ///
    /// Returns `None` if the ticket was superseded before or after rendering.
    ///
    /// # Errors
    ///
    /// Returns the first failing pipeline stage.
    pub fn render(
        &self,
        ticket: PreviewTicket,
        source: &Arc<PixelBuffer>,
        params: &EditParameters,
        options: &RenderOptions,
    ) -> std::result::Result<Option<PreviewFrame>, PipelineError> {
        if !self.is_current(ticket) {
            return Ok(None);
        }

        let colored = self.colored(source, params, options)?;
        let buffer = render_stages(&colored, Stage::Corner.downstream(), params, options)?;

        if !self.is_current(ticket) {
            tracing::trace!(stage = %ticket.stage, generation = ticket.generation, "stale preview dropped");
            return Ok(None);
        }
        Ok(Some(PreviewFrame {
            stage: ticket.stage,
            generation: ticket.generation,
            params: *params,
            buffer,
        }))
    }

    /// Render on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error, or `EditorError::Task` if the render
    /// task panicked.
    pub async fn render_blocking(
        self: &Arc<Self>,
        ticket: PreviewTicket,
        source: Arc<PixelBuffer>,
        params: EditParameters,
        options: RenderOptions,
    ) -> Result<Option<PreviewFrame>> {
        let renderer = Arc::clone(self);
        let frame = tokio::task::spawn_blocking(move || {
            renderer.render(ticket, &source, &params, &options)
        })
        .await??;
        Ok(frame)
    }

    /// Drop the cached intermediates.
    pub fn clear_cache(&self) {
        clear(&self.framed);
        clear(&self.colored);
    }

    /// Geometry + aspect output for `params`.
    fn framed(
        &self,
        source: &Arc<PixelBuffer>,
        params: &EditParameters,
        options: &RenderOptions,
    ) -> std::result::Result<Arc<PixelBuffer>, PipelineError> {
        cached_or_render(&self.framed, FramingKey::new(source, params, options), || {
            render_stages(source, Stage::Color.upstream(), params, options)
        })
    }

    /// Geometry + aspect + color output for `params`.
    fn colored(
        &self,
        source: &Arc<PixelBuffer>,
        params: &EditParameters,
        options: &RenderOptions,
    ) -> std::result::Result<Arc<PixelBuffer>, PipelineError> {
        let framed = self.framed(source, params, options)?;
        let key = ColorKey {
            framing: FramingKey::new(source, params, options),
            color: params.color,
        };
        cached_or_render(&self.colored, key, || {
            render_stages(&framed, &[Stage::Color], params, options)
        })
    }

    #[cfg(test)]
    fn cached_framed(&self) -> Option<Arc<PixelBuffer>> {
        peek(&self.framed)
    }

    #[cfg(test)]
    fn cached_colored(&self) -> Option<Arc<PixelBuffer>> {
        peek(&self.colored)
    }
}

fn cached_or_render<K: PartialEq>(
    slot: &Slot<K>,
    key: K,
    render: impl FnOnce() -> std::result::Result<PixelBuffer, PipelineError>,
) -> std::result::Result<Arc<PixelBuffer>, PipelineError> {
    if let Ok(cache) = slot.lock() {
        if let Some(hit) = cache.as_ref().filter(|c| c.key == key) {
            return Ok(Arc::clone(&hit.buffer));
        }
    }

    let buffer = Arc::new(render()?);
    if let Ok(mut cache) = slot.lock() {
        *cache = Some(Cached {
            key,
            buffer: Arc::clone(&buffer),
        });
    }
    Ok(buffer)
}

fn clear<K>(slot: &Slot<K>) {
    if let Ok(mut cache) = slot.lock() {
        *cache = None;
    }
}

#[cfg(test)]
fn peek<K>(slot: &Slot<K>) -> Option<Arc<PixelBuffer>> {
    slot.lock()
        .ok()
        .and_then(|c| c.as_ref().map(|c| Arc::clone(&c.buffer)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pictoria_core::{ColorAdjustment, CornerRadius, InterpolationFilter, DEFAULT_CANVAS};

    fn options() -> RenderOptions {
        RenderOptions::preview(100, DEFAULT_CANVAS, InterpolationFilter::Bilinear)
    }

    fn source() -> Arc<PixelBuffer> {
        Arc::new(PixelBuffer::filled(60, 30, [120, 60, 30, 255]))
    }

    fn square() -> EditParameters {
        EditParameters {
            aspect: AspectPreset::OneToOne,
            ..Default::default()
        }
    }

    #[test]
    fn test_generations_supersede() {
        let renderer = PreviewRenderer::new();
        let first = renderer.begin(Stage::Color);
        let second = renderer.begin(Stage::Color);
        let other = renderer.begin(Stage::Corner);

        assert!(!renderer.is_current(first));
        assert!(renderer.is_current(second));
        assert!(renderer.is_current(other));
    }

    #[test]
    fn test_stale_ticket_renders_nothing() {
        let renderer = PreviewRenderer::new();
        let stale = renderer.begin(Stage::Corner);
        let fresh = renderer.begin(Stage::Corner);
        let src = source();

        assert!(renderer
            .render(stale, &src, &square(), &options())
            .unwrap()
            .is_none());
        let frame = renderer
            .render(fresh, &src, &square(), &options())
            .unwrap()
            .unwrap();
        assert_eq!(frame.generation, fresh.generation);
        assert_eq!((frame.buffer.width, frame.buffer.height), (100, 100));
    }

    #[test]
    fn test_intermediate_reused_across_color_changes() {
        let renderer = PreviewRenderer::new();
        let src = source();

        let params = square();
        let ticket = renderer.begin(Stage::Color);
        renderer.render(ticket, &src, &params, &options()).unwrap();
        let first = renderer.cached_framed().unwrap();

        let recolored = EditParameters {
            color: ColorAdjustment::new(90.0, 1.0, 0.0),
            corner: CornerRadius::new(10.0, 100.0),
            ..params
        };
        let ticket = renderer.begin(Stage::Color);
        let frame = renderer
            .render(ticket, &src, &recolored, &options())
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&first, &renderer.cached_framed().unwrap()));
        assert_ne!(frame.buffer.pixel(50, 50), first.pixel(50, 50));

        // A geometry change invalidates it
        let rotated = EditParameters {
            transform: TransformParameters::new(90.0, false, false),
            ..recolored
        };
        let ticket = renderer.begin(Stage::Geometry);
        renderer.render(ticket, &src, &rotated, &options()).unwrap();
        assert!(!Arc::ptr_eq(&first, &renderer.cached_framed().unwrap()));

        renderer.clear_cache();
        assert!(renderer.cached_framed().is_none());
    }

    #[test]
    fn test_color_output_reused_across_corner_changes() {
        let renderer = PreviewRenderer::new();
        let src = source();
        let params = EditParameters {
            color: ColorAdjustment::new(30.0, 1.4, 0.0),
            ..square()
        };

        let ticket = renderer.begin(Stage::Color);
        renderer.render(ticket, &src, &params, &options()).unwrap();
        let colored = renderer.cached_colored().unwrap();

        let rounded = EditParameters {
            corner: CornerRadius::new(20.0, 100.0),
            ..params
        };
        let ticket = renderer.begin(Stage::Corner);
        let frame = renderer
            .render(ticket, &src, &rounded, &options())
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&colored, &renderer.cached_colored().unwrap()));
        assert_eq!(frame.params, rounded);
        assert_eq!(frame.buffer.pixel(0, 0)[3], 0);
        assert_eq!(frame.buffer.pixel(50, 50), colored.pixel(50, 50));

        // A color change invalidates it
        let recolored = EditParameters {
            color: ColorAdjustment::new(-30.0, 1.0, 0.0),
            ..rounded
        };
        let ticket = renderer.begin(Stage::Color);
        renderer.render(ticket, &src, &recolored, &options()).unwrap();
        assert!(!Arc::ptr_eq(&colored, &renderer.cached_colored().unwrap()));
    }

    #[test]
    fn test_preview_matches_full_render() {
        let renderer = PreviewRenderer::new();
        let src = source();
        let params = EditParameters {
            transform: TransformParameters::new(90.0, true, false),
            aspect: AspectPreset::ThreeToFour,
            color: ColorAdjustment::new(-40.0, 0.7, 0.1),
            corner: CornerRadius::new(12.0, 100.0),
        };
        let ticket = renderer.begin(Stage::Color);
        let frame = renderer.render(ticket, &src, &params, &options()).unwrap().unwrap();
        let full = pictoria_core::render(&src, &params, &options()).unwrap();
        assert_eq!(frame.buffer, full);
    }

    #[tokio::test]
    async fn test_render_blocking() {
        let renderer = Arc::new(PreviewRenderer::new());
        let ticket = renderer.begin(Stage::Color);
        let frame = renderer
            .render_blocking(ticket, source(), square(), options())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.stage, Stage::Color);
    }
}
