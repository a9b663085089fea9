//! Side-by-side layout of several projector frames into one combined output frame.
//!
//! Every projector gets a slot of `max_width x max_height` at `x = i * max_width`. Smaller
//! projector frames are stretched (nearest neighbour) to fill their slot from the top-left
//! corner, so a destination pixel always maps back to `floor(dst * actual / slot)` in its
//! source. Anything not covered stays black.

use crate::{
    foundation::core::{PixelFormat, Resolution},
    foundation::error::{DomeWarpError, DomeWarpResult},
    frame::Frame,
    render::backend::RasterBackend,
    transform::ProjectionTransformer,
};

/// Slot geometry of a combined frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CompositeLayout {
    pub slot_width: u32,
    pub slot_height: u32,
    pub count: u32,
    pub total_width: u32,
}

impl CompositeLayout {
    /// Layout for projector frames of the given sizes.
    pub fn for_sizes(sizes: &[Resolution]) -> DomeWarpResult<Self> {
        if sizes.is_empty() {
            return Err(DomeWarpError::validation(
                "compositor needs at least one projector",
            ));
        }
        let slot_width = sizes.iter().map(|s| s.width).max().unwrap_or(0);
        let slot_height = sizes.iter().map(|s| s.height).max().unwrap_or(0);
        if slot_width == 0 || slot_height == 0 {
            return Err(DomeWarpError::validation(format!(
                "compositor slots must be non-empty, got {slot_width}x{slot_height}"
            )));
        }
        let count = u32::try_from(sizes.len())
            .map_err(|_| DomeWarpError::validation("too many projectors"))?;
        let total_width = slot_width
            .checked_mul(count)
            .ok_or_else(|| DomeWarpError::validation("combined frame width overflows"))?;
        Ok(Self {
            slot_width,
            slot_height,
            count,
            total_width,
        })
    }

    /// Combined frame size.
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.total_width, self.slot_height)
    }

    /// Left edge of slot `index`.
    pub fn slot_x(&self, index: u32) -> u32 {
        index * self.slot_width
    }
}

/// Combines projector frames into one side-by-side RGB frame.
#[derive(Clone, Debug)]
pub struct Compositor {
    slots: Vec<Resolution>,
    layout: CompositeLayout,
}

impl Compositor {
    /// `slots` are the expected (decimated) projector frame sizes, in projector order.
    pub fn new(slots: Vec<Resolution>) -> DomeWarpResult<Self> {
        let layout = CompositeLayout::for_sizes(&slots)?;
        Ok(Self { slots, layout })
    }

    /// Compositor sized for the decimated outputs of `transformers`.
    pub fn for_transformers(transformers: &[ProjectionTransformer]) -> DomeWarpResult<Self> {
        Self::new(
            transformers
                .iter()
                .map(ProjectionTransformer::decimated_resolution)
                .collect(),
        )
    }

    pub fn layout(&self) -> CompositeLayout {
        self.layout
    }

    pub fn slots(&self) -> &[Resolution] {
        &self.slots
    }

    /// Place `frames[i]` into slot `i`. Frames may be RGB or RGBA with any stride.
    pub fn compose(&self, frames: &[Frame]) -> DomeWarpResult<Frame> {
        if frames.len() != self.slots.len() {
            return Err(DomeWarpError::validation(format!(
                "compositor expects {} frames, got {}",
                self.slots.len(),
                frames.len()
            )));
        }
        let l = self.layout;
        let mut out = Frame::new(l.total_width, l.slot_height, PixelFormat::Rgb24);
        for (i, frame) in frames.iter().enumerate() {
            if frame.width() == 0 || frame.height() == 0 {
                continue;
            }
            let x0 = l.slot_x(i as u32);
            if frame.width() == l.slot_width && frame.height() == l.slot_height {
                frame.blit_into(&mut out, x0, 0);
            } else {
                frame
                    .resample_nearest(l.slot_width, l.slot_height)
                    .blit_into(&mut out, x0, 0);
            }
        }
        Ok(out)
    }

    /// Run every transformer on `input` (sequentially, on this thread) and compose the results.
    pub fn compose_from_transformers(
        &self,
        backend: &mut dyn RasterBackend,
        transformers: &mut [ProjectionTransformer],
        input: &Frame,
    ) -> DomeWarpResult<Frame> {
        let frames = transformers
            .iter_mut()
            .map(|t| t.transform_frame(backend, input))
            .collect::<DomeWarpResult<Vec<_>>>()?;
        self.compose(&frames)
    }
}

#[cfg(test)]
#[path = "../tests/unit/composite.rs"]
mod tests;
