//! End-to-end Newton solves against synthetic models.

use gridflow_core::SolverMode;
use gridflow_sparse::{MatrixData, MatrixError};
use gridflow_solver::{
    CallbackStatus, Constraint, NewtonSolver, SolverConfig, SolverStatus, SparseReinitMode,
    SystemModel,
};

/// 1-D test system: f(x) = x - 5, df/dx = 1.
struct ShiftModel {
    time: f64,
}

impl SystemModel for ShiftModel {
    fn state_size(&self, _mode: &SolverMode) -> usize {
        1
    }

    fn jacobian_size(&self, _mode: &SolverMode) -> usize {
        1
    }

    fn residual(
        &mut self,
        _time: f64,
        state: &[f64],
        _dstate_dt: Option<&[f64]>,
        resid: &mut [f64],
        _mode: &SolverMode,
    ) -> CallbackStatus {
        resid[0] = state[0] - 5.0;
        CallbackStatus::Ok
    }

    fn jacobian(
        &mut self,
        _time: f64,
        _state: &[f64],
        _dstate_dt: Option<&[f64]>,
        out: &mut dyn MatrixData,
        _resid_offset: u32,
        _mode: &SolverMode,
    ) -> Result<(), MatrixError> {
        out.assign(0, 0, 1.0)
    }

    fn current_time(&self) -> f64 {
        self.time
    }
}

/// 2-D system: x^2 + y^2 = 4 intersected with x = y.
struct CircleModel {
    time: f64,
}

impl SystemModel for CircleModel {
    fn state_size(&self, _mode: &SolverMode) -> usize {
        2
    }

    fn jacobian_size(&self, _mode: &SolverMode) -> usize {
        4
    }

    fn residual(
        &mut self,
        _time: f64,
        state: &[f64],
        _dstate_dt: Option<&[f64]>,
        resid: &mut [f64],
        _mode: &SolverMode,
    ) -> CallbackStatus {
        resid[0] = state[0] * state[0] + state[1] * state[1] - 4.0;
        resid[1] = state[0] - state[1];
        CallbackStatus::Ok
    }

    fn jacobian(
        &mut self,
        _time: f64,
        state: &[f64],
        _dstate_dt: Option<&[f64]>,
        out: &mut dyn MatrixData,
        _resid_offset: u32,
        _mode: &SolverMode,
    ) -> Result<(), MatrixError> {
        out.assign(0, 0, 2.0 * state[0])?;
        out.assign(0, 1, 2.0 * state[1])?;
        out.assign(1, 0, 1.0)?;
        out.assign(1, 1, -1.0)?;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.time
    }
}

/// Residual that succeeds once, then reports recoverable failures forever.
struct RecoverableAfterFirst {
    calls: u32,
}

impl SystemModel for RecoverableAfterFirst {
    fn state_size(&self, _mode: &SolverMode) -> usize {
        1
    }

    fn jacobian_size(&self, _mode: &SolverMode) -> usize {
        1
    }

    fn residual(
        &mut self,
        _time: f64,
        _state: &[f64],
        _dstate_dt: Option<&[f64]>,
        resid: &mut [f64],
        _mode: &SolverMode,
    ) -> CallbackStatus {
        self.calls += 1;
        if self.calls == 1 {
            resid[0] = 10.0;
            CallbackStatus::Ok
        } else {
            CallbackStatus::Recoverable
        }
    }

    fn jacobian(
        &mut self,
        _time: f64,
        _state: &[f64],
        _dstate_dt: Option<&[f64]>,
        out: &mut dyn MatrixData,
        _resid_offset: u32,
        _mode: &SolverMode,
    ) -> Result<(), MatrixError> {
        out.assign(0, 0, 1.0)
    }

    fn current_time(&self) -> f64 {
        3.5
    }
}

/// Residual that claims success while producing NaN entries.
struct NanResidualModel;

impl SystemModel for NanResidualModel {
    fn state_size(&self, _mode: &SolverMode) -> usize {
        1
    }

    fn jacobian_size(&self, _mode: &SolverMode) -> usize {
        1
    }

    fn residual(
        &mut self,
        _time: f64,
        _state: &[f64],
        _dstate_dt: Option<&[f64]>,
        resid: &mut [f64],
        _mode: &SolverMode,
    ) -> CallbackStatus {
        resid[0] = f64::NAN;
        CallbackStatus::Ok
    }

    fn jacobian(
        &mut self,
        _time: f64,
        _state: &[f64],
        _dstate_dt: Option<&[f64]>,
        out: &mut dyn MatrixData,
        _resid_offset: u32,
        _mode: &SolverMode,
    ) -> Result<(), MatrixError> {
        out.assign(0, 0, 1.0)
    }

    fn current_time(&self) -> f64 {
        0.0
    }
}

fn log_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

fn configured(dense: bool, dir: &tempfile::TempDir) -> SolverConfig {
    let mut config = SolverConfig::new().with_dense(dense);
    config.solver_log_file = Some(dir.path().join("newton.out"));
    config
}

#[test]
fn one_dimensional_solve_converges_sparse() {
    let dir = log_dir();
    let mut solver = NewtonSolver::with_config(ShiftModel { time: 0.0 }, configured(false, &dir));
    solver.allocate(1);
    solver.initialize(0.0).unwrap();
    let (status, t) = solver.solve(1.0).unwrap();
    assert!(!status.is_error(), "status was {status}");
    assert!((t - 1.0).abs() < 1e-14);
    assert!((solver.state()[0] - 5.0).abs() < 1e-6);
}

#[test]
fn one_dimensional_solve_converges_dense() {
    let dir = log_dir();
    let mut solver = NewtonSolver::with_config(ShiftModel { time: 0.0 }, configured(true, &dir));
    solver.allocate(1);
    solver.initialize(0.0).unwrap();
    let (status, _) = solver.solve(1.0).unwrap();
    assert!(!status.is_error());
    assert!((solver.state()[0] - 5.0).abs() < 1e-6);
}

#[test]
fn converged_initial_guess_is_reported() {
    let dir = log_dir();
    let mut solver = NewtonSolver::with_config(ShiftModel { time: 0.0 }, configured(false, &dir));
    solver.allocate(1);
    solver.initialize(0.0).unwrap();
    solver.state_mut()[0] = 5.0;
    let (status, _) = solver.solve(1.0).unwrap();
    assert_eq!(status, SolverStatus::InitialGuessOk);
}

#[test]
fn nonlinear_system_converges_to_circle_intersection() {
    let dir = log_dir();
    let mut solver = NewtonSolver::with_config(CircleModel { time: 0.0 }, configured(false, &dir));
    solver.allocate(2);
    solver.initialize(0.0).unwrap();
    solver.state_mut()[0] = 1.0;
    solver.state_mut()[1] = 2.0;
    let (status, _) = solver.solve(1.0).unwrap();
    assert!(!status.is_error(), "status was {status}");
    let root = 2.0_f64.sqrt();
    assert!((solver.state()[0] - root).abs() < 1e-6);
    assert!((solver.state()[1] - root).abs() < 1e-6);
}

#[test]
fn sparse_structure_is_reused_across_solves() {
    let dir = log_dir();
    let mut solver = NewtonSolver::with_config(CircleModel { time: 0.0 }, configured(false, &dir));
    solver.allocate(2);
    solver.initialize(0.0).unwrap();
    solver.state_mut()[0] = 1.0;
    solver.state_mut()[1] = 2.0;
    let (status, _) = solver.solve(1.0).unwrap();
    assert!(!status.is_error());

    let nnz_first = solver.get("nnz");
    let jac_first = solver.get("jac calls");
    assert_eq!(nnz_first, 4.0);
    assert!(jac_first >= 2.0, "later iterations must refresh, not rebuild");

    // perturb and solve again; the pattern must survive unchanged
    solver.state_mut()[0] = 0.5;
    solver.state_mut()[1] = 1.5;
    let (status, _) = solver.solve(2.0).unwrap();
    assert!(!status.is_error());
    assert_eq!(solver.get("nnz"), nnz_first);
    assert!(solver.get("jac calls") > jac_first);
}

#[test]
fn resize_reinit_triggers_rediscovery() {
    let dir = log_dir();
    let mut solver = NewtonSolver::with_config(CircleModel { time: 0.0 }, configured(false, &dir));
    solver.allocate(2);
    solver.initialize(0.0).unwrap();
    solver.state_mut()[0] = 1.0;
    solver.state_mut()[1] = 2.0;
    solver.solve(1.0).unwrap();
    assert_eq!(solver.get("nnz"), 4.0);

    solver.sparse_reinit(SparseReinitMode::Resize);
    assert_eq!(solver.get("nnz"), 0.0);
    solver.state_mut()[0] = 1.0;
    solver.state_mut()[1] = 2.0;
    let (status, _) = solver.solve(2.0).unwrap();
    assert!(!status.is_error());
    assert_eq!(solver.get("nnz"), 4.0);
}

#[test]
fn repeated_recoverable_errors_surface_as_invalid_state() {
    let dir = log_dir();
    let mut solver =
        NewtonSolver::with_config(RecoverableAfterFirst { calls: 0 }, configured(false, &dir));
    solver.allocate(1);
    solver.initialize(0.0).unwrap();
    let (status, t) = solver.solve(10.0).unwrap();
    // the recoverable-streak code never leaks; callers see invalid state
    assert_eq!(status, SolverStatus::InvalidState);
    assert_eq!(status.code(), -36);
    // reached time capped at the model's last simulated time, not t_stop
    assert!((t - 3.5).abs() < 1e-14);
}

#[test]
fn nan_residual_never_reads_as_converged() {
    let dir = log_dir();
    let mut solver = NewtonSolver::with_config(NanResidualModel, configured(false, &dir));
    solver.allocate(1);
    solver.initialize(0.0).unwrap();
    let (status, _) = solver.solve(1.0).unwrap();
    assert_eq!(status, SolverStatus::SystemFunctionFailed);
    assert!(status.is_error());
}

#[test]
fn singular_jacobian_fails_with_linear_setup_code() {
    let dir = log_dir();
    let mut solver = NewtonSolver::with_config(CircleModel { time: 0.0 }, configured(false, &dir));
    solver.allocate(2);
    solver.initialize(0.0).unwrap();
    // the origin zeroes the circle equation's Jacobian row
    solver.state_mut()[0] = 0.0;
    solver.state_mut()[1] = 0.0;
    let (status, t) = solver.solve(1.0).unwrap();
    assert_eq!(status, SolverStatus::LinearSetupFailed);
    assert!((t - 0.0).abs() < 1e-14);
}

#[test]
fn allocate_is_idempotent_for_unchanged_size() {
    let dir = log_dir();
    let mut solver = NewtonSolver::with_config(ShiftModel { time: 0.0 }, configured(false, &dir));
    solver.allocate(1);
    solver.initialize(0.0).unwrap();
    solver.state_mut()[0] = 2.0;
    solver.allocate(1);
    // same-size reallocate must not wipe the iterate
    assert!((solver.state()[0] - 2.0).abs() < 1e-14);
    solver.allocate(3);
    assert_eq!(solver.state().len(), 3);
}

#[test]
fn solve_without_initialize_reports_null_memory() {
    let mut solver = NewtonSolver::new(ShiftModel { time: 0.0 });
    solver.allocate(1);
    let (status, _) = solver.solve(1.0).unwrap();
    assert_eq!(status, SolverStatus::NullMemory);
}

#[test]
fn parameter_surface_round_trips() {
    let mut solver = NewtonSolver::new(ShiftModel { time: 0.0 });
    solver.set_string("capturefile", "cap.bin").unwrap();
    solver.set_value("filecapture", 1.0).unwrap();
    solver.set_value("tolerance", 1e-6).unwrap();
    assert!((solver.get("tolerance") - 1e-6).abs() < 1e-18);
    assert_eq!(solver.get("jac calls"), 0.0);
    assert_eq!(solver.get("no such parameter"), -1.0);
    assert!(solver.set_string("bogus", "x").is_err());
    assert_eq!(SolverConfig::MAX_SETUP_CALLS, 1);
    assert_eq!(SolverConfig::MAX_SUBSETUP_CALLS, 2);
}

#[test]
fn statistics_log_after_solve() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = log_dir();
    let mut solver = NewtonSolver::with_config(ShiftModel { time: 0.0 }, configured(false, &dir));
    solver.allocate(1);
    solver.initialize(0.0).unwrap();
    solver.solve(1.0).unwrap();
    solver.log_solver_stats(tracing::Level::INFO);
    assert!(solver.get("resid calls") >= 1.0);
}

/// Constrained system: x^2 = 4 has two roots; the sign constraint picks
/// the positive one.
struct ConstrainedModel;

impl SystemModel for ConstrainedModel {
    fn state_size(&self, _mode: &SolverMode) -> usize {
        1
    }

    fn jacobian_size(&self, _mode: &SolverMode) -> usize {
        1
    }

    fn residual(
        &mut self,
        _time: f64,
        state: &[f64],
        _dstate_dt: Option<&[f64]>,
        resid: &mut [f64],
        _mode: &SolverMode,
    ) -> CallbackStatus {
        resid[0] = state[0] * state[0] - 4.0;
        CallbackStatus::Ok
    }

    fn jacobian(
        &mut self,
        _time: f64,
        state: &[f64],
        _dstate_dt: Option<&[f64]>,
        out: &mut dyn MatrixData,
        _resid_offset: u32,
        _mode: &SolverMode,
    ) -> Result<(), MatrixError> {
        out.assign(0, 0, 2.0 * state[0])
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn has_constraints(&self) -> bool {
        true
    }

    fn constraints(&self, _mode: &SolverMode, out: &mut [Constraint]) {
        out[0] = Constraint::NonNegative;
    }
}

#[test]
fn sign_constraint_selects_the_positive_root() {
    let dir = log_dir();
    let mut solver = NewtonSolver::with_config(ConstrainedModel, configured(false, &dir));
    solver.allocate(1);
    solver.initialize(0.0).unwrap();
    solver.state_mut()[0] = 1.0;
    let (status, _) = solver.solve(1.0).unwrap();
    assert!(!status.is_error(), "status was {status}");
    assert!((solver.state()[0] - 2.0).abs() < 1e-6);
    assert!(solver.state()[0] >= 0.0);
}
