//! The Newton nonlinear-solver adapter.
//!
//! Owns the solve-loop state: the current iterate, the linear backend with
//! its established Jacobian structure, call counters, cumulative timing,
//! and the optional diagnostic capture files. One adapter instance owns
//! its backend exclusively; time stepping lives above this layer and calls
//! [`NewtonSolver::solve`] once per target time.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use gridflow_core::{GridError, GridResult, SolverMode};
use gridflow_sparse::{find_missing, CooMatrix, MatrixData};
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::backend::{
    discovery_container, BackendError, DenseBackend, LinearBackend, SparseBackend,
    SparseReinitMode,
};
use crate::capture::{write_array, write_vector, CODE_JACOBIAN, CODE_RESIDUAL, CODE_STATE};
use crate::model::{Constraint, SystemModel};
use crate::status::{CallbackStatus, SolverStatus};

/// Solver options.
///
/// The step tolerance is not independently configurable; it is a fixed
/// ratio of the function-norm tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Function-norm convergence tolerance
    pub tolerance: f64,
    /// Hard cap on Newton iterations per solve
    pub max_iterations: usize,
    /// Force the dense linear backend
    pub dense: bool,
    /// Persist residual/Jacobian evaluations to the capture files
    pub file_capture: bool,
    pub jac_file: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    /// Per-iteration info log; defaults to `newton.out` at initialize
    pub solver_log_file: Option<PathBuf>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 50,
            dense: false,
            file_capture: false,
            jac_file: None,
            state_file: None,
            solver_log_file: None,
        }
    }
}

impl SolverConfig {
    /// Iterations between Jacobian setups. The strategy is exact Newton:
    /// the factorization is rebuilt every iteration, so this is fixed at
    /// one and not configurable.
    pub const MAX_SETUP_CALLS: u32 = 1;
    /// Ceiling on sub-setup (value-refresh) evaluations between full
    /// setups under the exact-Newton strategy.
    pub const MAX_SUBSETUP_CALLS: u32 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    pub fn with_dense(mut self, dense: bool) -> Self {
        self.dense = dense;
        self
    }

    /// Scaled step tolerance, a fixed hundredth of the function tolerance.
    pub fn step_tolerance(&self) -> f64 {
        self.tolerance / 100.0
    }
}

pub struct NewtonSolver<M: SystemModel> {
    model: M,
    config: SolverConfig,
    mode: SolverMode,
    state: Vec<f64>,
    constraints: Vec<Constraint>,
    backend: Option<LinearBackend>,
    svsize: usize,
    max_nnz: usize,
    allocated: bool,
    initialized: bool,
    solve_time: f64,
    jac_call_count: u32,
    func_call_count: u32,
    solver_call_count: u32,
    nonlin_iters: u32,
    resid_time: f64,
    jac_time: f64,
    total_time: f64,
    info_log: Option<BufWriter<File>>,
}

impl<M: SystemModel> NewtonSolver<M> {
    pub fn new(model: M) -> Self {
        Self::with_config(model, SolverConfig::default())
    }

    pub fn with_config(model: M, config: SolverConfig) -> Self {
        Self {
            model,
            config,
            mode: SolverMode::new(0),
            state: Vec::new(),
            constraints: Vec::new(),
            backend: None,
            svsize: 0,
            max_nnz: 0,
            allocated: false,
            initialized: false,
            solve_time: 0.0,
            jac_call_count: 0,
            func_call_count: 0,
            solver_call_count: 0,
            nonlin_iters: 0,
            resid_time: 0.0,
            jac_time: 0.0,
            total_time: 0.0,
            info_log: None,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Current iterate; set the initial guess through
    /// [`state_mut`](Self::state_mut) before solving.
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut [f64] {
        &mut self.state
    }

    pub fn set_mode(&mut self, mode: SolverMode) {
        self.mode = mode;
    }

    /// Size solver memory for `state_count` states. A repeated call with
    /// an unchanged count is a no-op; a changed count discards the prior
    /// backend and starts fresh.
    pub fn allocate(&mut self, state_count: usize) {
        if self.allocated && state_count == self.svsize {
            return;
        }
        self.svsize = state_count;
        self.state = vec![0.0; state_count];
        self.max_nnz = self.model.jacobian_size(&self.mode);
        self.backend = None;
        self.jac_call_count = 0;
        self.func_call_count = 0;
        self.allocated = true;
        self.initialized = false;
    }

    /// Wire tolerances, select the linear backend, open the info log, and
    /// pull the model's constraints.
    pub fn initialize(&mut self, t0: f64) -> GridResult<()> {
        if !self.allocated {
            return Err(GridError::Config("solver memory not allocated".into()));
        }
        let log_path = self
            .config
            .solver_log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("newton.out"));
        self.info_log = Some(BufWriter::new(File::create(&log_path)?));
        self.backend = Some(if self.config.dense {
            LinearBackend::Dense(DenseBackend::new(self.svsize))
        } else {
            LinearBackend::Sparse(SparseBackend::new(self.svsize))
        });
        self.jac_call_count = 0;
        self.solve_time = t0;
        if self.model.has_constraints() {
            self.constraints = vec![Constraint::None; self.svsize];
            self.model.constraints(&self.mode, &mut self.constraints);
        } else {
            self.constraints.clear();
        }
        self.initialized = true;
        Ok(())
    }

    /// Re-derive the sparse factorization state and force the next
    /// Jacobian call back through structure discovery.
    pub fn sparse_reinit(&mut self, mode: SparseReinitMode) {
        self.jac_call_count = 0;
        if let Some(LinearBackend::Sparse(be)) = &mut self.backend {
            be.reinit(mode);
        }
    }

    /// One Newton solve to convergence at `t_stop`.
    ///
    /// Returns the outcome status and the reached time: `t_stop` on
    /// success, the model's last successfully simulated time on failure.
    pub fn solve(&mut self, t_stop: f64) -> GridResult<(SolverStatus, f64)> {
        if !self.initialized {
            return Ok((SolverStatus::NullMemory, self.model.current_time()));
        }
        self.solve_time = t_stop;
        let start = Instant::now();

        let mut resid = vec![0.0; self.svsize];
        let mut last_step: Option<Vec<f64>> = None;
        let mut recoverable_streak = 0u32;
        let mut status = SolverStatus::MaxIterationsReached;

        for iter in 0..self.config.max_iterations {
            match self.eval_residual(&mut resid)? {
                CallbackStatus::Ok => recoverable_streak = 0,
                CallbackStatus::Recoverable => {
                    recoverable_streak += 1;
                    if recoverable_streak >= 2 {
                        status = SolverStatus::RepeatedSystemFunctionError;
                        break;
                    }
                    match &mut last_step {
                        // backtrack half the previous step and retry
                        Some(step) => {
                            for (x, dx) in self.state.iter_mut().zip(step.iter_mut()) {
                                *dx *= 0.5;
                                *x += *dx;
                            }
                            continue;
                        }
                        None => {
                            status = SolverStatus::FirstSystemFunctionError;
                            break;
                        }
                    }
                }
                CallbackStatus::Unrecoverable => {
                    status = SolverStatus::SystemFunctionFailed;
                    break;
                }
            }

            let fnorm = max_abs(&resid);
            if let Some(log) = &mut self.info_log {
                writeln!(log, "iter {iter} fnorm {fnorm:.6e}")?;
            }
            if !fnorm.is_finite() {
                status = SolverStatus::SystemFunctionFailed;
                break;
            }
            if fnorm < self.config.tolerance {
                status = if iter == 0 {
                    SolverStatus::InitialGuessOk
                } else {
                    SolverStatus::Success
                };
                break;
            }

            let step = match self.compute_step(&resid) {
                Ok(step) => step,
                Err(err) => {
                    self.model
                        .log(tracing::Level::WARN, &format!("newton step failed: {err}"));
                    status = SolverStatus::LinearSetupFailed;
                    break;
                }
            };

            let mut snorm: f64 = 0.0;
            for (x, dx) in self.state.iter_mut().zip(step.iter()) {
                *x -= dx;
                snorm = snorm.max(dx.abs() / x.abs().max(1.0));
            }
            self.project_constraints();
            self.nonlin_iters += 1;
            last_step = Some(step);

            if snorm < self.config.step_tolerance() {
                status = SolverStatus::StepBelowTolerance;
                break;
            }
        }

        if let Some(log) = &mut self.info_log {
            log.flush()?;
        }
        self.total_time += start.elapsed().as_secs_f64();
        self.solver_call_count += 1;
        if status == SolverStatus::LinearSetupFailed {
            self.report_missing_rows();
        }
        if self.total_time > 0.0 {
            tracing::debug!(
                "total solve time {:.6}s, {:.2}% in residual, {:.2}% in jacobian",
                self.total_time,
                self.resid_time / self.total_time * 100.0,
                self.jac_time / self.total_time * 100.0
            );
        }
        let t_return = if status.is_error() {
            self.model.current_time()
        } else {
            t_stop
        };
        Ok((status.remap(), t_return))
    }

    fn eval_residual(&mut self, resid: &mut [f64]) -> GridResult<CallbackStatus> {
        let t = Instant::now();
        self.func_call_count += 1;
        let status = self
            .model
            .residual(self.solve_time, &self.state, None, resid, &self.mode);
        self.resid_time += t.elapsed().as_secs_f64();
        if self.config.file_capture {
            if let Some(path) = &self.config.state_file {
                let append = self.func_call_count != 1;
                write_vector(
                    path,
                    append,
                    self.solve_time,
                    CODE_STATE,
                    self.func_call_count,
                    self.mode.offset_index,
                    &self.state,
                )?;
                write_vector(
                    path,
                    true,
                    self.solve_time,
                    CODE_RESIDUAL,
                    self.func_call_count,
                    self.mode.offset_index,
                    resid,
                )?;
            }
        }
        Ok(status)
    }

    /// Build or refresh the Jacobian and solve for the Newton step.
    ///
    /// The first Jacobian call after allocation or a resize reinit runs
    /// through a discovery container to establish the sparsity pattern;
    /// every later call accumulates values straight into the established
    /// structure.
    fn compute_step(&mut self, resid: &[f64]) -> Result<Vec<f64>, BackendError> {
        let t = Instant::now();
        let Self {
            model,
            config,
            mode,
            state,
            backend,
            svsize,
            max_nnz,
            solve_time,
            jac_call_count,
            nonlin_iters,
            jac_time,
            ..
        } = self;
        let backend = backend.as_mut().ok_or(BackendError::NoStructure)?;
        match backend {
            LinearBackend::Dense(be) => {
                let mut a = be.adapter();
                a.clear();
                model
                    .jacobian(*solve_time, state, None, &mut a, 0, mode)
                    .map_err(BackendError::Fill)?;
                *jac_call_count += 1;
                *jac_time += t.elapsed().as_secs_f64();
                be.solve(resid)
            }
            LinearBackend::Sparse(be) => {
                if *jac_call_count == 0 || !be.structure_established() {
                    let mut disc = discovery_container(*svsize, *max_nnz)?;
                    model
                        .jacobian(*solve_time, state, None, disc.as_mut(), 0, mode)
                        .map_err(BackendError::Fill)?;
                    *jac_call_count += 1;
                    be.install_structure(disc.as_mut());
                    if config.file_capture {
                        if let Some(path) = &config.jac_file {
                            let _ = write_array(
                                path,
                                true,
                                *solve_time,
                                CODE_JACOBIAN,
                                *nonlin_iters,
                                mode.offset_index,
                                disc.as_mut(),
                            );
                        }
                    }
                } else {
                    let mut a = be.adapter()?;
                    a.clear();
                    model
                        .jacobian(*solve_time, state, None, &mut a, 0, mode)
                        .map_err(BackendError::Fill)?;
                    *jac_call_count += 1;
                    if config.file_capture {
                        if let Some(path) = &config.jac_file {
                            let _ = write_array(
                                path,
                                true,
                                *solve_time,
                                CODE_JACOBIAN,
                                *nonlin_iters,
                                mode.offset_index,
                                &mut a,
                            );
                        }
                    }
                }
                *jac_time += t.elapsed().as_secs_f64();
                be.solve(resid)
            }
        }
    }

    fn project_constraints(&mut self) {
        for (x, c) in self.state.iter_mut().zip(self.constraints.iter()) {
            match c {
                Constraint::None => {}
                Constraint::NonNegative => {
                    if *x < 0.0 {
                        *x = 0.0;
                    }
                }
                Constraint::NonPositive => {
                    if *x > 0.0 {
                        *x = 0.0;
                    }
                }
                Constraint::Positive => {
                    if *x <= 0.0 {
                        *x = f64::EPSILON;
                    }
                }
                Constraint::Negative => {
                    if *x >= 0.0 {
                        *x = -f64::EPSILON;
                    }
                }
            }
        }
    }

    /// Singular-Jacobian diagnostic: name the states whose rows carry no
    /// usable entry.
    fn report_missing_rows(&mut self) {
        let mut probe = CooMatrix::with_capacity(
            self.svsize as u32,
            self.svsize as u32,
            self.max_nnz,
        );
        if self
            .model
            .jacobian(self.solve_time, &self.state, None, &mut probe, 0, &self.mode)
            .is_err()
        {
            return;
        }
        for row in find_missing(&mut probe) {
            self.model.log(
                tracing::Level::DEBUG,
                &format!(
                    "state[{row}] {} has no usable jacobian entry",
                    self.model.state_name(row)
                ),
            );
        }
    }

    /// Set a string-valued parameter.
    pub fn set_string(&mut self, param: &str, val: &str) -> GridResult<()> {
        match param {
            "jacfile" => self.config.jac_file = Some(PathBuf::from(val)),
            "statefile" => self.config.state_file = Some(PathBuf::from(val)),
            "capturefile" => {
                self.config.jac_file = Some(PathBuf::from(val));
                self.config.state_file = Some(PathBuf::from(val));
            }
            "logfile" => self.config.solver_log_file = Some(PathBuf::from(val)),
            _ => return Err(GridError::Config(format!("unknown parameter '{param}'"))),
        }
        Ok(())
    }

    /// Set a numeric parameter.
    pub fn set_value(&mut self, param: &str, val: f64) -> GridResult<()> {
        match param {
            "filecapture" => self.config.file_capture = val >= 0.1,
            "tolerance" => self.config.tolerance = val,
            "maxiterations" => self.config.max_iterations = val as usize,
            _ => return Err(GridError::Config(format!("unknown parameter '{param}'"))),
        }
        Ok(())
    }

    /// Query a counter or option. Unknown names return -1 rather than
    /// erroring; callers probing for optional statistics rely on that.
    pub fn get(&self, param: &str) -> f64 {
        match param {
            "jac calls" => f64::from(self.jac_call_count),
            "resid calls" => f64::from(self.func_call_count),
            "solver calls" => f64::from(self.solver_call_count),
            "iterations" => f64::from(self.nonlin_iters),
            "nnz" => match &self.backend {
                Some(LinearBackend::Sparse(be)) => be.nnz() as f64,
                Some(LinearBackend::Dense(_)) => (self.svsize * self.svsize) as f64,
                None => 0.0,
            },
            "tolerance" => self.config.tolerance,
            _ => -1.0,
        }
    }

    /// Format the cumulative counters and route them through the model's
    /// logging facility.
    pub fn log_solver_stats(&self, level: tracing::Level) {
        if !self.initialized {
            return;
        }
        let mut s = String::from("Newton statistics:\n");
        s += &format!(
            "Number of nonlinear iterations    = {}\n",
            self.nonlin_iters
        );
        s += &format!(
            "Number of function evaluations    = {}\n",
            self.func_call_count
        );
        s += &format!(
            "Number of Jacobian evaluations    = {}\n",
            self.jac_call_count
        );
        if let Some(LinearBackend::Sparse(be)) = &self.backend {
            s += &format!("Jacobian nonzero count            = {}\n", be.nnz());
        }
        self.model.log(level, &s);
    }
}

/// Infinity-norm that does not let `f64::max` swallow NaN entries; any
/// non-finite component makes the whole norm non-finite.
fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| {
        if x.is_finite() {
            acc.max(x.abs())
        } else {
            f64::INFINITY
        }
    })
}
