//! Nonlinear solve outcome codes.
//!
//! The outcome of a solve is always surfaced as a status value, never a
//! panic or an error type the caller must unwind through: the time-stepping
//! driver above this layer inspects the code and decides retry policy.

use std::fmt;

/// Outcome of one nonlinear solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// Function norm below the configured tolerance.
    Success,
    /// The initial guess already satisfied the tolerance.
    InitialGuessOk,
    /// The scaled step dropped below the step tolerance; the iterate is
    /// stationary, which usually means convergence to within roundoff.
    StepBelowTolerance,
    NullMemory,
    IllegalInput,
    NoAllocation,
    AllocationFailed,
    LineSearchNonConvergence,
    MaxIterationsReached,
    ExcessiveNewtonSteps,
    LineSearchBetaFailure,
    LinearSolverNoRecovery,
    LinearInitFailed,
    LinearSetupFailed,
    LinearSolveFailed,
    SystemFunctionFailed,
    FirstSystemFunctionError,
    RepeatedSystemFunctionError,
    /// Generic invalid-state code that callers surface uniformly.
    /// [`RepeatedSystemFunctionError`](Self::RepeatedSystemFunctionError)
    /// is remapped to this before a solve returns.
    InvalidState,
}

impl SolverStatus {
    /// Numeric code for the status, non-negative on success.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InitialGuessOk => 1,
            Self::StepBelowTolerance => 2,
            Self::NullMemory => -1,
            Self::IllegalInput => -2,
            Self::NoAllocation => -3,
            Self::AllocationFailed => -4,
            Self::LineSearchNonConvergence => -5,
            Self::MaxIterationsReached => -6,
            Self::ExcessiveNewtonSteps => -7,
            Self::LineSearchBetaFailure => -8,
            Self::LinearSolverNoRecovery => -9,
            Self::LinearInitFailed => -10,
            Self::LinearSetupFailed => -11,
            Self::LinearSolveFailed => -12,
            Self::SystemFunctionFailed => -13,
            Self::FirstSystemFunctionError => -14,
            Self::RepeatedSystemFunctionError => -15,
            Self::InvalidState => -36,
        }
    }

    pub fn is_error(self) -> bool {
        self.code() < 0
    }

    /// Collapse the repeated-recoverable-failure code into the generic
    /// invalid-state code; every other status passes through verbatim.
    pub fn remap(self) -> Self {
        match self {
            Self::RepeatedSystemFunctionError => Self::InvalidState,
            other => other,
        }
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Success => "converged",
            Self::InitialGuessOk => "initial guess satisfied the tolerance",
            Self::StepBelowTolerance => "scaled step below the step tolerance",
            Self::NullMemory => "null solver memory",
            Self::IllegalInput => "illegal input",
            Self::NoAllocation => "no memory allocation",
            Self::AllocationFailed => "memory allocation failed",
            Self::LineSearchNonConvergence => "line search failed to converge",
            Self::MaxIterationsReached => "max iterations reached",
            Self::ExcessiveNewtonSteps => {
                "five consecutive steps satisfied the scaled step length test"
            }
            Self::LineSearchBetaFailure => "line search could not satisfy the beta condition",
            Self::LinearSolverNoRecovery => "linear solver setup failed without recovery",
            Self::LinearInitFailed => "linear solver initialization failed",
            Self::LinearSetupFailed => "linear solver setup failed unrecoverably",
            Self::LinearSolveFailed => "linear solve failed unrecoverably",
            Self::SystemFunctionFailed => "the system function failed unrecoverably",
            Self::FirstSystemFunctionError => {
                "the system function failed recoverably at the first call"
            }
            Self::RepeatedSystemFunctionError => {
                "the system function had repeated recoverable errors"
            }
            Self::InvalidState => "invalid state",
        };
        f.write_str(msg)
    }
}

/// Status reported by a model's residual callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackStatus {
    #[default]
    Ok,
    /// Evaluation failed but a shorter step may succeed.
    Recoverable,
    /// Evaluation failed and retrying cannot help.
    Unrecoverable,
}
