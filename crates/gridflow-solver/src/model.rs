//! The callback contract between the solver and a physical model.

use gridflow_core::SolverMode;
use gridflow_sparse::{MatrixData, MatrixError};

use crate::status::CallbackStatus;

/// Per-state sign constraint applied after each Newton update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Constraint {
    #[default]
    None,
    NonNegative,
    NonPositive,
    Positive,
    Negative,
}

/// A system of nonlinear equations the solver drives to zero.
///
/// The model is read-mostly from the solver's point of view: residual and
/// Jacobian evaluation write into buffers the solver owns and must not
/// retain references into them. Both callbacks receive the state-derivative
/// slice as an `Option` since a steady-state solve has none.
pub trait SystemModel {
    /// Number of states in the given mode.
    fn state_size(&self, mode: &SolverMode) -> usize;

    /// Expected Jacobian nonzero count, used to size discovery containers.
    fn jacobian_size(&self, mode: &SolverMode) -> usize;

    /// Fill `resid` with the equation mismatches at `time` and `state`.
    fn residual(
        &mut self,
        time: f64,
        state: &[f64],
        dstate_dt: Option<&[f64]>,
        resid: &mut [f64],
        mode: &SolverMode,
    ) -> CallbackStatus;

    /// Accumulate Jacobian entries into `out`, rows offset by
    /// `resid_offset`.
    fn jacobian(
        &mut self,
        time: f64,
        state: &[f64],
        dstate_dt: Option<&[f64]>,
        out: &mut dyn MatrixData,
        resid_offset: u32,
        mode: &SolverMode,
    ) -> Result<(), MatrixError>;

    /// Last time the model successfully simulated to. Reported as the
    /// reached time when a solve fails partway.
    fn current_time(&self) -> f64;

    fn has_constraints(&self) -> bool {
        false
    }

    /// Per-state sign constraints; only consulted when
    /// [`has_constraints`](Self::has_constraints) is true.
    fn constraints(&self, _mode: &SolverMode, out: &mut [Constraint]) {
        out.fill(Constraint::None);
    }

    /// Route a solver diagnostic through the model's own logging.
    fn log(&self, level: tracing::Level, msg: &str) {
        match level {
            tracing::Level::ERROR => tracing::error!("{msg}"),
            tracing::Level::WARN => tracing::warn!("{msg}"),
            tracing::Level::INFO => tracing::info!("{msg}"),
            _ => tracing::debug!("{msg}"),
        }
    }

    /// Names for states, used in singular-Jacobian diagnostics. Models
    /// without meaningful names may leave the default.
    fn state_name(&self, index: u32) -> String {
        format!("state[{index}]")
    }
}
