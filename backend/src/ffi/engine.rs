//! PyO3 wrapper for MatrixEngine
//!
//! This module provides the Python interface to the Rust engine.

use pyo3::prelude::*;

use super::convert::to_py;
use crate::engine::{EngineConfig, MatrixEngine, StateSnapshot};
use crate::external::{PoolType, SharedNotifier, SharedWallet};
use crate::models::MemberStatus;

fn value_error(msg: String) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyValueError, _>(msg)
}

fn runtime_error(msg: String) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(msg)
}

fn parse_config(config_json: Option<&str>) -> PyResult<EngineConfig> {
    match config_json {
        Some(json) => serde_json::from_str(json)
            .map_err(|e| value_error(format!("Invalid config JSON: {}", e))),
        None => Ok(EngineConfig::default()),
    }
}

/// Python wrapper for the Rust matrix engine
///
/// The engine owns its state; the wrapper keeps shared handles on the
/// recording wallet and notifier so Python can inspect credits and
/// notifications after each registration.
///
/// # Example (from Python)
///
/// ```python
/// from matrix_engine._core import MatrixEngine
///
/// engine = MatrixEngine()
/// engine.register_member("ROOT", "Root", None)
/// report = engine.register_member("M1", "First", "ROOT")
/// print(report["slot"]["position"])
/// ```
#[pyclass(name = "MatrixEngine")]
pub struct PyMatrixEngine {
    inner: MatrixEngine,
    wallet: SharedWallet,
    notifier: SharedNotifier,
}

#[pymethods]
impl PyMatrixEngine {
    /// Create a new engine
    ///
    /// # Arguments
    ///
    /// * `config_json` - Optional JSON string with engine configuration
    ///   (`max_search_depth`, `rates`, `retry`); defaults apply for any
    ///   omitted field
    ///
    /// # Errors
    ///
    /// Raises ValueError if the JSON is malformed or the configuration
    /// violates a startup invariant (payout percentages over 100%, zero
    /// search depth).
    #[new]
    #[pyo3(signature = (config_json = None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = parse_config(config_json)?;
        let wallet = SharedWallet::new();
        let notifier = SharedNotifier::new();

        let inner = MatrixEngine::new(
            config,
            Box::new(wallet.clone()),
            Box::new(notifier.clone()),
        )
        .map_err(|e| value_error(format!("Failed to create engine: {}", e)))?;

        Ok(PyMatrixEngine {
            inner,
            wallet,
            notifier,
        })
    }

    /// Restore an engine from a snapshot
    ///
    /// # Arguments
    ///
    /// * `config_json` - Configuration the snapshot was taken under
    /// * `snapshot_json` - Snapshot produced by `snapshot_json()`
    ///
    /// # Errors
    ///
    /// Raises ValueError on config hash mismatch or a structurally
    /// corrupt snapshot.
    #[staticmethod]
    #[pyo3(signature = (snapshot_json, config_json = None))]
    fn restore(snapshot_json: &str, config_json: Option<&str>) -> PyResult<Self> {
        let config = parse_config(config_json)?;
        let snapshot: StateSnapshot = serde_json::from_str(snapshot_json)
            .map_err(|e| value_error(format!("Invalid snapshot JSON: {}", e)))?;

        let wallet = SharedWallet::new();
        let notifier = SharedNotifier::new();
        let inner = MatrixEngine::restore(
            config,
            Box::new(wallet.clone()),
            Box::new(notifier.clone()),
            snapshot,
        )
        .map_err(|e| value_error(format!("Failed to restore engine: {}", e)))?;

        Ok(PyMatrixEngine {
            inner,
            wallet,
            notifier,
        })
    }

    /// Register a member and run the full placement cascade
    ///
    /// # Arguments
    ///
    /// * `member_id` - Unique member identifier
    /// * `display_name` - Human-readable name
    /// * `sponsor_id` - Declared sponsor; None registers a matrix root
    ///
    /// # Returns
    ///
    /// Dictionary with the registration report:
    /// - `member_id`: the registered member
    /// - `slot`: resolved matrix slot (None for roots)
    /// - `spillover`: whether the member spilled past their sponsor
    /// - `closed_cycle`: cycle settled by this placement, if any
    /// - `payout`: distribution record for that cycle, if any
    /// - `failed_payout_legs`: legs needing manual reconciliation
    ///
    /// # Errors
    ///
    /// Raises ValueError for integrity violations (duplicate member,
    /// self-sponsorship, unknown sponsor, sponsor cycle, full matrix).
    #[pyo3(signature = (member_id, display_name, sponsor_id = None))]
    fn register_member(
        &mut self,
        py: Python<'_>,
        member_id: &str,
        display_name: &str,
        sponsor_id: Option<&str>,
    ) -> PyResult<PyObject> {
        let report = self
            .inner
            .register_member(member_id, display_name, sponsor_id)
            .map_err(|e| value_error(format!("Registration failed: {}", e)))?;

        to_py(py, &report)
    }

    /// Activate or deactivate a member (soft status, slots are kept)
    fn set_member_active(&mut self, member_id: &str, active: bool) -> PyResult<()> {
        let status = if active {
            MemberStatus::Active
        } else {
            MemberStatus::Inactive
        };
        self.inner
            .set_member_status(member_id, status)
            .map_err(|e| value_error(format!("Status change failed: {}", e)))
    }

    // ========================================================================
    // State Query Methods
    // ========================================================================

    /// Number of registered members
    fn num_members(&self) -> usize {
        self.inner.num_members()
    }

    /// Immediate unilevel sponsor, or None
    fn sponsor_of(&self, member_id: &str) -> Option<String> {
        self.inner.sponsor_of(member_id).map(|m| m.id().to_string())
    }

    /// Occupied slots directly under an upline as (position, member_id)
    fn matrix_children(&self, upline_id: &str) -> Vec<(u8, String)> {
        self.inner
            .matrix_children(upline_id)
            .into_iter()
            .map(|(pos, id)| (pos, id.to_string()))
            .collect()
    }

    /// Total credited to a member's wallet (cents)
    fn balance_of(&self, member_id: &str) -> i64 {
        self.wallet.balance_of(member_id)
    }

    /// Total contributed to a pool (cents); pool is "fidelity" or "top_rank"
    fn pool_total(&self, pool: &str) -> PyResult<i64> {
        let pool = match pool {
            "fidelity" => PoolType::Fidelity,
            "top_rank" => PoolType::TopRank,
            other => return Err(value_error(format!("Unknown pool: {}", other))),
        };
        Ok(self.wallet.pool_total(pool))
    }

    /// The closed-cycle ledger as a list of dicts
    fn closed_cycles(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py(py, &self.inner.closed_cycles())
    }

    /// Notifications sent so far as (member_id, template_id, payload)
    fn notifications(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py(py, &self.notifier.sent())
    }

    /// The full audit log as a list of dicts
    fn events(&self, py: Python<'_>) -> PyResult<PyObject> {
        to_py(py, self.inner.events().events())
    }

    /// Serialize the full engine state to a snapshot JSON string
    fn snapshot_json(&self) -> PyResult<String> {
        let snapshot = self
            .inner
            .snapshot()
            .map_err(|e| runtime_error(format!("Snapshot failed: {}", e)))?;
        serde_json::to_string(&snapshot)
            .map_err(|e| runtime_error(format!("Snapshot serialization failed: {}", e)))
    }
}
