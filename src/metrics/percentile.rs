/// Adaptive-step moving-percentile estimator.
///
/// Approximates one percentile of a scalar stream in O(1) space: every
/// sample nudges the estimate toward itself by the current step size.
/// With enough samples the estimate settles where the fraction of
/// samples below it matches the target percentile. This is a heuristic
/// (no convergence guarantee, no exact ranks), chosen for zero sample
/// storage on hot paths.
///
/// The step is symmetric: its magnitude never depends on the target
/// percentile, only its sign does.
#[derive(Debug, Clone)]
pub struct MovingPercentile {
    percentile: f64,
    sensitivity: f64,
    initial_step: f64,
    step: f64,
    estimate: f64,
    initialized: bool,
}

impl MovingPercentile {
    /// `percentile` is the target in (0,1); `sensitivity` scales the
    /// adaptive step; `initial_step` is the fixed step used until a
    /// reference average is supplied. Range checking happens where a
    /// tracker is configured, not here.
    pub fn new(percentile: f64, sensitivity: f64, initial_step: f64) -> Self {
        Self {
            percentile,
            sensitivity,
            initial_step,
            step: initial_step,
            estimate: 0.0,
            initialized: false,
        }
    }

    /// Nudges the estimate toward `value` by the current step.
    pub fn new_sample(&mut self, value: f64) {
        if !self.initialized {
            self.estimate = value;
            self.initialized = true;
            return;
        }
        if value < self.estimate {
            self.estimate -= self.step;
        } else if value > self.estimate {
            self.estimate += self.step;
        }
    }

    /// Rescales the step from the sample's deviation from a
    /// caller-tracked average, then applies the directional update.
    /// Large deviations move the estimate faster, small ones let it
    /// settle.
    pub fn new_sample_with_reference(&mut self, value: f64, reference_average: f64) {
        self.step = self.sensitivity * (reference_average - value).abs().sqrt();
        self.new_sample(value);
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Restores the initial step size and un-initializes the estimate.
    pub fn reset(&mut self) {
        self.step = self.initial_step;
        self.estimate = 0.0;
        self.initialized = false;
    }
}
