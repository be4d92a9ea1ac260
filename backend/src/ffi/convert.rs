//! Type conversion utilities for FFI boundary
//!
//! Converts serde_json values into PyO3-compatible objects (PyDict,
//! PyList, scalars). Anything the engine can serialize crosses the
//! boundary through here.

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use serde_json::Value;

/// Convert a JSON value to the equivalent Python object
pub fn value_to_py(py: Python<'_>, value: &Value) -> PyResult<PyObject> {
    Ok(match value {
        Value::Null => py.None(),
        Value::Bool(b) => b.to_object(py),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_object(py)
            } else if let Some(u) = n.as_u64() {
                u.to_object(py)
            } else {
                // serde_json numbers are i64, u64, or f64; this arm is f64
                n.as_f64().unwrap_or(f64::NAN).to_object(py)
            }
        }
        Value::String(s) => s.to_object(py),
        Value::Array(items) => {
            let list = PyList::empty(py);
            for item in items {
                list.append(value_to_py(py, item)?)?;
            }
            list.to_object(py)
        }
        Value::Object(map) => {
            let dict = PyDict::new(py);
            for (key, item) in map {
                dict.set_item(key, value_to_py(py, item)?)?;
            }
            dict.to_object(py)
        }
    })
}

/// Serialize a Rust value and convert it to a Python object
pub fn to_py<T: serde::Serialize + ?Sized>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let json = serde_json::to_value(value).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!(
            "serialization failed: {}",
            e
        ))
    })?;
    value_to_py(py, &json)
}
