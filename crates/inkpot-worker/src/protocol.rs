//! JSON-lines messages exchanged with the host.
//!
//! One JSON object per line, tagged by `type`, with camelCase fields.

use inkpot_eval::{CellId, MimeBundle, SuspensionId};
use serde::{Deserialize, Serialize};

/// Host to worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Request {
    Initialize,
    /// Run one cell.
    Run { cell_id: CellId, code: String },
    /// Answer an `input_request`.
    Resume { suspension: SuspensionId, value: String },
}

/// Worker to host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Message {
    Initialized,
    /// Text sent through the host channel, or printed outside any cell.
    Stdout { text: String },
    /// A cell's formatted value, or an image sent through the host channel.
    ExecuteResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cell_id: Option<CellId>,
        result: MimeBundle,
    },
    /// A running cell is waiting for input.
    InputRequest {
        suspension: SuspensionId,
        cell_id: CellId,
        prompt: String,
    },
    ExecuteCompleted {
        cell_id: CellId,
        stdout: String,
        stderr: String,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cell_id: Option<CellId>,
        error: String,
        stdout: String,
        stderr: String,
    },
}

impl Message {
    /// An error not tied to any cell output.
    pub fn error(cell_id: Option<CellId>, error: impl Into<String>) -> Self {
        Message::Error {
            cell_id,
            error: error.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_requests() {
        let run: Request = serde_json::from_str(r#"{"type":"run","cellId":"c1","code":"1"}"#).unwrap();
        assert_eq!(
            run,
            Request::Run {
                cell_id: CellId::from("c1"),
                code: "1".to_string()
            }
        );
        let resume: Request =
            serde_json::from_str(r#"{"type":"resume","suspension":3,"value":"Ada"}"#).unwrap();
        assert_eq!(
            resume,
            Request::Resume {
                suspension: SuspensionId(3),
                value: "Ada".to_string()
            }
        );
        let init: Request = serde_json::from_str(r#"{"type":"initialize"}"#).unwrap();
        assert_eq!(init, Request::Initialize);
    }

    #[test]
    fn test_message_shapes() {
        let input = Message::InputRequest {
            suspension: SuspensionId(0),
            cell_id: CellId::from("c1"),
            prompt: "name: ".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({ "type": "input_request", "suspension": 0, "cellId": "c1", "prompt": "name: " })
        );

        let image = Message::ExecuteResult {
            cell_id: None,
            result: MimeBundle::png("iVBOR"),
        };
        assert_eq!(
            serde_json::to_value(&image).unwrap(),
            json!({ "type": "execute_result", "result": { "image/png": "iVBOR" } })
        );
    }
}
