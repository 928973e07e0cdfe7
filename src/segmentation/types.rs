/// Which segmentation the user has selected. At most one is ever active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    None,
    EdgeDetection,
    BackgroundRemoval,
}

/// The active strategy together with the only input it reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segmentation {
    None,
    Edge { threshold: f64 },
    BackgroundRemoval { inverse_polarity: bool },
}

/// Lowest and highest accepted edge threshold.
pub const THRESHOLD_RANGE: (f64, f64) = (0.0, 255.0);

/// UI inputs as seen by the pipeline.
///
/// The threshold and polarity are remembered while their mode is inactive,
/// the same way the controls keep their position on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Controls {
    pub mode: Mode,
    pub threshold: f64,
    pub inverse_polarity: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            mode: Mode::None,
            threshold: 0.0,
            inverse_polarity: false,
        }
    }
}

/// One-way messages from the UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetMode(Mode),
    SetThreshold(f64),
    SetInversePolarity(bool),
}

impl Controls {
    pub fn apply(&mut self, command: Command) {
        match command {
            // Selecting a mode replaces whichever was active.
            Command::SetMode(mode) => self.mode = mode,
            Command::SetThreshold(value) => {
                if value.is_nan() {
                    tracing::warn!("ignoring NaN threshold");
                    return;
                }
                self.threshold = value.clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1);
            }
            Command::SetInversePolarity(inverse) => self.inverse_polarity = inverse,
        }
    }

    pub fn active(&self) -> Segmentation {
        match self.mode {
            Mode::None => Segmentation::None,
            Mode::EdgeDetection => Segmentation::Edge {
                threshold: self.threshold,
            },
            Mode::BackgroundRemoval => Segmentation::BackgroundRemoval {
                inverse_polarity: self.inverse_polarity,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selecting_a_mode_deactivates_the_other() {
        let mut controls = Controls::default();
        controls.apply(Command::SetThreshold(40.0));
        controls.apply(Command::SetMode(Mode::EdgeDetection));
        assert_eq!(controls.active(), Segmentation::Edge { threshold: 40.0 });

        controls.apply(Command::SetMode(Mode::BackgroundRemoval));
        assert_eq!(
            controls.active(),
            Segmentation::BackgroundRemoval {
                inverse_polarity: false
            }
        );

        controls.apply(Command::SetMode(Mode::EdgeDetection));
        assert!(matches!(controls.active(), Segmentation::Edge { .. }));
        controls.apply(Command::SetMode(Mode::None));
        assert_eq!(controls.active(), Segmentation::None);
    }

    #[test]
    fn inputs_survive_mode_switches() {
        let mut controls = Controls::default();
        controls.apply(Command::SetMode(Mode::BackgroundRemoval));
        controls.apply(Command::SetInversePolarity(true));
        controls.apply(Command::SetMode(Mode::EdgeDetection));
        controls.apply(Command::SetMode(Mode::BackgroundRemoval));
        assert_eq!(
            controls.active(),
            Segmentation::BackgroundRemoval {
                inverse_polarity: true
            }
        );
    }

    #[test]
    fn threshold_is_clamped() {
        let mut controls = Controls::default();
        controls.apply(Command::SetThreshold(900.0));
        assert_eq!(controls.threshold, 255.0);
        controls.apply(Command::SetThreshold(-3.0));
        assert_eq!(controls.threshold, 0.0);
        controls.apply(Command::SetThreshold(f64::NAN));
        assert_eq!(controls.threshold, 0.0);
    }
}
