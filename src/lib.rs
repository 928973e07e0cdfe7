//! Live webcam segmentation: edge detection or hue-based background removal,
//! applied to every frame of a periodically sampled capture stream.
pub mod capture;
pub mod error;
pub mod frame;
pub mod output;
pub mod scheduler;
pub mod segmentation;

pub use error::{Error, Result};
pub use frame::{ColorSpace, Frame};
pub use scheduler::{ControlHandle, Scheduler, SchedulerConfig, State, TickStats};
pub use segmentation::{Command, Controls, Mode, Segmentation};
