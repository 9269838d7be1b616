// Copyright 2025
// SPDX-License-Identifier: Apache-2.0
//
// PyO3 bindings for the redaction engine

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::config::{PhiTag, RedactionConfig};
use super::error::RedactError;
use super::record::{Entity, MessageMetadata};
use super::redactor::PhiRedactor;

fn to_py_err(e: RedactError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn tag_names(tags: &[PhiTag]) -> Vec<String> {
    tags.iter().map(|t| t.as_str().to_string()).collect()
}

/// PHI redactor exposed to Python
///
/// # Example (Python)
/// ```python
/// from phi_redact import PhiRedactorRust
///
/// redactor = PhiRedactorRust({"whitelist_path": "data/resources/wordlist.txt"})
///
/// flags, text = redactor.redact("Call me at 555-0101")
/// print(flags)  # ["PHONE"]
/// print(text)   # "Call me at [REDACTED_PHONE]"
/// ```
#[pyclass]
pub struct PhiRedactorRust {
    inner: PhiRedactor,
}

#[pymethods]
impl PhiRedactorRust {
    /// Create a new redactor
    ///
    /// # Arguments
    /// * `config_dict` - Optional Python dictionary with configuration
    ///
    /// # Configuration Keys
    /// * `detect_email`, `detect_ssn`, `detect_phone`, `detect_ip_address`,
    ///   `detect_url`, `detect_medical_record`, `detect_id`, `detect_date` (bool)
    /// * `context_window`, `min_phone_digits`, `min_id_length`, `max_text_len` (int)
    /// * `whitelist_path`, `stopwords_path` (str)
    /// * `log_detections` (bool)
    #[new]
    #[pyo3(signature = (config_dict=None))]
    pub fn new(config_dict: Option<&Bound<'_, PyDict>>) -> PyResult<Self> {
        let config = match config_dict {
            Some(dict) => RedactionConfig::from_py_dict(dict).map_err(|e| {
                PyValueError::new_err(format!("Invalid config: {}", e))
            })?,
            None => RedactionConfig::default(),
        };
        let inner = PhiRedactor::from_config(config, None).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Redact PHI in text
    ///
    /// # Returns
    /// Tuple of (flags: list[str], redacted_text: str)
    pub fn redact(&self, text: &str) -> PyResult<(Vec<String>, String)> {
        let redaction = self.inner.redact(text).map_err(to_py_err)?;
        Ok((tag_names(&redaction.flags), redaction.text))
    }

    /// Normalize text for the clean-text field
    pub fn normalize(&self, text: &str) -> String {
        self.inner.normalize(text)
    }

    /// Redact entity values
    ///
    /// # Arguments
    /// * `entities_json` - JSON list of `{"type": ..., "value": ...}` objects
    ///
    /// # Returns
    /// Tuple of (entities_json: str, flags: list[str])
    pub fn redact_entities(&self, entities_json: &str) -> PyResult<(String, Vec<String>)> {
        let entities: Vec<Entity> = serde_json::from_str(entities_json)
            .map_err(|e| PyValueError::new_err(format!("Invalid entities: {}", e)))?;
        let (out, flags) = self.inner.redact_entities(&entities).map_err(to_py_err)?;
        let json = serde_json::to_string(&out)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok((json, tag_names(&flags)))
    }

    /// Build a redacted message record
    ///
    /// # Arguments
    /// * `message` - Raw message text
    /// * `metadata_json` - JSON object with optional record metadata
    ///
    /// # Returns
    /// The record serialized as JSON
    #[pyo3(signature = (message, metadata_json="{}"))]
    pub fn process_message(&self, message: &str, metadata_json: &str) -> PyResult<String> {
        let metadata: MessageMetadata = serde_json::from_str(metadata_json)
            .map_err(|e| PyValueError::new_err(format!("Invalid metadata: {}", e)))?;
        let record = self
            .inner
            .process_message(message, &metadata)
            .map_err(to_py_err)?;
        serde_json::to_string(&record).map_err(|e| PyValueError::new_err(e.to_string()))
    }
}
