/// Window size used when a caller hands us a zero (i.e. non-positive)
/// window. Coerced rather than rejected so a bad config value degrades
/// to sane smoothing instead of failing construction.
pub const DEFAULT_WINDOW: u32 = 100;

/// Exponentially weighted moving average with running min/max.
///
/// `alpha = 2 / (window + 1)`, the usual EWMA smoothing constant for an
/// N-sample window. Not thread-safe; callers serialize externally (the
/// service-time tracker owns one behind its mutex).
#[derive(Debug, Clone)]
pub struct MovingAverage {
    alpha: f64,
    average: f64,
    min: f64,
    max: f64,
    initialized: bool,
}

impl MovingAverage {
    pub fn new(window: u32) -> Self {
        let window = if window == 0 { DEFAULT_WINDOW } else { window };
        Self {
            alpha: 2.0 / (window as f64 + 1.0),
            average: 0.0,
            min: 0.0,
            max: 0.0,
            initialized: false,
        }
    }

    /// Folds one sample into the average and the min/max bounds.
    pub fn new_sample(&mut self, value: f64) {
        if self.initialized {
            self.average += self.alpha * (value - self.average);
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        } else {
            self.average = value;
            self.min = value;
            self.max = value;
            self.initialized = true;
        }
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Back to the pre-first-sample state: all outputs zero.
    pub fn reset(&mut self) {
        self.average = 0.0;
        self.min = 0.0;
        self.max = 0.0;
        self.initialized = false;
    }
}
