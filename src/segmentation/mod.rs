mod background;
pub mod color;
mod edge;
pub mod histogram;
pub mod ops;
pub mod types;

pub use background::BackgroundRemoval;
pub use edge::{Canny, EdgeDetection, EdgeOperator, EDGE_THRESHOLD_RATIO};
pub use histogram::{weighted_mean_hue, Histogram};
pub use types::{Command, Controls, Mode, Segmentation};

use crate::error::Result;
use crate::frame::Frame;

/// Both strategies, dispatched by the active [`Segmentation`].
#[derive(Default)]
pub struct Pipeline {
    edge: EdgeDetection,
    background: BackgroundRemoval,
}

impl Pipeline {
    pub fn new(edge: EdgeDetection, background: BackgroundRemoval) -> Self {
        Self { edge, background }
    }

    /// Run the active strategy, or pass the frame through when none is selected.
    pub fn process(&self, frame: Frame, segmentation: Segmentation) -> Result<Frame> {
        match segmentation {
            Segmentation::None => Ok(frame),
            Segmentation::Edge { threshold } => self.edge.process(&frame, threshold),
            Segmentation::BackgroundRemoval { inverse_polarity } => {
                self.background.process(&frame, inverse_polarity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ColorSpace;

    #[test]
    fn no_segmentation_passes_through() {
        let frame = Frame::from_fn(3, 3, ColorSpace::Bgr, |y, x, c| (y + x + c) as u8);
        let out = Pipeline::default()
            .process(frame.clone(), Segmentation::None)
            .unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn dispatches_on_the_active_strategy() {
        let frame = Frame::filled(8, 8, ColorSpace::Bgr, 120);
        let pipeline = Pipeline::default();
        // A flat frame has no edges: all black.
        let edges = pipeline
            .process(frame.clone(), Segmentation::Edge { threshold: 30.0 })
            .unwrap();
        assert!(edges.pixels().iter().all(|&v| v == 0));
        // Every hue of a gray frame sits at the mean (0), so all of it is
        // foreground except the rim removed by erosion.
        let removed = pipeline
            .process(frame, Segmentation::BackgroundRemoval { inverse_polarity: false })
            .unwrap();
        assert_eq!(removed.pixel(0, 0), vec![255, 255, 255]);
        assert_eq!(removed.pixel(4, 4), vec![120, 120, 120]);
    }
}
