//! Progress reporting for long-running solves.

/// Progress callback for long-running operations.
pub type ProgressCallback = Box<dyn Fn(ProgressInfo) + Send + Sync>;

/// Stage of a placement solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolvePhase {
    /// Model assembled, solver not started yet.
    #[default]
    Building,
    /// An incumbent assignment is available.
    Incumbent,
    /// The solver has returned.
    Finished,
}

/// Progress information during solving.
///
/// Reports arrive in non-decreasing `elapsed_ms` order; the objective of
/// successive incumbents never gets worse.
#[derive(Debug, Clone, Default)]
pub struct ProgressInfo {
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
    /// Objective value of the current incumbent.
    pub objective: Option<f64>,
    /// Best proven bound on the objective.
    pub best_bound: Option<f64>,
    /// Number of decision variables in the model.
    pub variables: usize,
    /// Number of constraints in the model.
    pub constraints: usize,
    /// Current phase.
    pub phase: SolvePhase,
    /// Whether the solver is still running.
    pub running: bool,
}

impl ProgressInfo {
    /// Creates a new progress info with default values.
    pub fn new(phase: SolvePhase) -> Self {
        Self {
            phase,
            running: phase != SolvePhase::Finished,
            ..Default::default()
        }
    }

    /// Sets the elapsed time.
    pub fn with_elapsed(mut self, ms: u64) -> Self {
        self.elapsed_ms = ms;
        self
    }

    /// Sets the incumbent objective and bound.
    pub fn with_objective(mut self, objective: f64, best_bound: f64) -> Self {
        self.objective = Some(objective);
        self.best_bound = Some(best_bound);
        self
    }

    /// Sets the model size.
    pub fn with_model_size(mut self, variables: usize, constraints: usize) -> Self {
        self.variables = variables;
        self.constraints = constraints;
        self
    }
}
