//! Request and response bodies of the REST API.
//!
//! Field names are part of the public wire format and must not change.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Multipart form accepted by `POST /ocr`.
#[derive(Debug, ToSchema)]
pub struct UploadImageForm {
    /// The recipe image.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Result of recognising an uploaded recipe image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OcrRes {
    pub id: String,
    /// Full recognised text.
    pub text: String,
    /// Parsed title, or `Retsept` when none was found.
    pub title: String,
    pub saved_text_path: String,
}

/// Body of `POST /generate-tech-card`.
///
/// With only `id`, the text is taken from the stored recipe. With `text`, it is parsed
/// directly and `id` (if given) only names the output file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerateTechCardReq {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerateTechCardRes {
    pub id: String,
    pub tech_card_path: String,
    /// Parsed title; may be empty.
    pub title: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_req_fields_are_optional() {
        let empty: GenerateTechCardReq = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, GenerateTechCardReq::default());

        let nulls: GenerateTechCardReq =
            serde_json::from_str(r#"{"id": null, "text": "Title: Soup"}"#).unwrap();
        assert_eq!(nulls.id, None);
        assert_eq!(nulls.text.as_deref(), Some("Title: Soup"));
    }

    #[test]
    fn test_error_res_uses_detail_key() {
        let json = serde_json::to_value(ErrorRes {
            detail: "not found".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"detail": "not found"}));
    }
}
