// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// PHI redaction engine for chat message ingestion
// Python bindings are built with the `python` feature

// Allow non-local definitions for PyO3 macros (known issue with PyO3 0.20.x)
#![cfg_attr(feature = "python", allow(non_local_definitions))]

pub mod phi_filter;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module: phi_redact
///
/// Detects PHI in chat messages and replaces it with typed placeholders.
///
/// # Examples
///
/// ```python
/// from phi_redact import PhiRedactorRust
///
/// redactor = PhiRedactorRust({"detect_date": True})
///
/// flags, text = redactor.redact("My SSN is 123-45-6789 and ID AB12003")
/// print(flags)  # ["ID", "SSN"]
/// print(text)   # "My SSN is [REDACTED_SSN] and ID [REDACTED_ID]"
///
/// record = redactor.process_message("email test1@example.com", '{"channel": "web"}')
/// ```
#[cfg(feature = "python")]
#[pymodule]
fn phi_redact(m: &Bound<'_, pyo3::types::PyModule>) -> PyResult<()> {
    m.add_class::<phi_filter::PhiRedactorRust>()?;

    // Module metadata
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add(
        "__doc__",
        "PHI detection and redaction engine for chat message ingestion",
    )?;

    Ok(())
}
