use serde::Serialize;

use crate::error::PipelineError;

/// What the pipeline hands back to its caller: `{ success: true, data }` or
/// `{ success: false, error }`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Success { success: bool, data: T },
    Failure { success: bool, error: String },
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope::Success {
            success: true,
            data,
        }
    }

    pub fn failed(err: &PipelineError) -> Self {
        Envelope::Failure {
            success: false,
            error: err.public_message(),
        }
    }

    pub fn from_result(result: Result<T, PipelineError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failed(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn success_shape() {
        let env = Envelope::ok(vec![1, 2, 3]);
        let v: Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(v, json!({ "success": true, "data": [1, 2, 3] }));
        assert!(env.is_success());
    }

    #[test]
    fn failure_shape() {
        let env: Envelope<()> =
            Envelope::from_result(Err(PipelineError::Decode("expected value at line 1".into())));
        let v: Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(v["success"], json!(false));
        assert!(v.get("data").is_none());
        assert!(!v["error"].as_str().unwrap().contains("line 1"));
        assert!(!env.is_success());
    }
}
