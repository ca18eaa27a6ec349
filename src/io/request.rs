//! JSON fit requests from files or stdin.
//!
//! A document is either one request object or an array of them (batch).

use std::fs;
use std::io::Read;
use std::path::Path;

use serde_json::Value;

use crate::domain::FitRequest;
use crate::error::{AppError, EXIT_INPUT};

/// Read a request document; `-` means stdin.
pub fn load_requests(path: &Path) -> Result<(Vec<FitRequest>, bool), AppError> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to read stdin: {e}")))?;
        buf
    } else {
        fs::read_to_string(path)
            .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to read '{}': {e}", path.display())))?
    };
    parse_requests(&text)
}

/// Parse a request document. The flag is `true` for array (batch) input.
pub fn parse_requests(text: &str) -> Result<(Vec<FitRequest>, bool), AppError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| AppError::new(EXIT_INPUT, format!("Invalid request JSON: {e}")))?;

    match value {
        Value::Array(items) => {
            let requests = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    serde_json::from_value(item)
                        .map_err(|e| AppError::new(EXIT_INPUT, format!("Invalid request #{i}: {e}")))
                })
                .collect::<Result<Vec<FitRequest>, _>>()?;
            Ok((requests, true))
        }
        other => {
            let request = serde_json::from_value(other)
                .map_err(|e| AppError::new(EXIT_INPUT, format!("Invalid request: {e}")))?;
            Ok((vec![request], false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_object_is_not_a_batch() {
        let (reqs, batch) = parse_requests(r#"{"x_data":[0,1],"y_data":[1,2],"model":"linear"}"#).unwrap();
        assert!(!batch);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].y_data, vec![1.0, 2.0]);
    }

    #[test]
    fn arrays_are_batches() {
        let text = r#"[{"x_data":[0,1],"y_data":[1,2]},{"model":"custom","custom_expr":"a*x"}]"#;
        let (reqs, batch) = parse_requests(text).unwrap();
        assert!(batch);
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].custom_expr.as_deref(), Some("a*x"));
    }

    #[test]
    fn malformed_documents_are_input_errors() {
        let err = parse_requests("{").unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);

        let err = parse_requests(r#"[{"x_data":"nope"}]"#).unwrap_err();
        assert!(err.to_string().starts_with("Invalid request #0"));
    }
}
