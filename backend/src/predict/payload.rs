use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{Map, Value};
use shared::{InputType, OutputType};
use std::collections::HashMap;

/// One file pulled out of a multipart request body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A predict request body normalized before dispatch: the parsed JSON object
/// (if the body was JSON) plus any multipart files keyed by field name.
/// Multipart text fields land in `json` so both transports look the same to
/// the builders.
#[derive(Debug, Default)]
pub struct RawInput {
    pub json: Option<Value>,
    pub files: HashMap<String, UploadedFile>,
}

impl RawInput {
    pub fn from_json(value: Value) -> Self {
        Self {
            json: Some(value),
            files: HashMap::new(),
        }
    }

    fn json_field(&self, name: &str) -> Option<&Value> {
        self.json.as_ref().and_then(|v| v.get(name))
    }

    fn file(&self, names: &[&str]) -> Option<&UploadedFile> {
        names.iter().find_map(|name| self.files.get(*name))
    }
}

/// Validation failure on the predict path. The message is the usage hint sent
/// back with the 400.
#[derive(Debug, thiserror::Error)]
#[error("{hint}")]
pub struct PayloadError {
    hint: &'static str,
}

impl PayloadError {
    fn new(hint: &'static str) -> Self {
        Self { hint }
    }

    pub fn hint(&self) -> &'static str {
        self.hint
    }
}

/// Builds the downstream payload for one prediction: the fixed envelope the
/// inference service expects plus the input fields for the model's input
/// type. Pure; a failure here means nothing was forwarded.
pub fn build_payload(
    input_type: InputType,
    output_type: OutputType,
    model_path: &str,
    model_key: &str,
    raw: &RawInput,
) -> Result<Value, PayloadError> {
    let mut payload = Map::new();
    payload.insert("model_path".to_string(), Value::String(model_path.to_string()));
    payload.insert("model_key".to_string(), Value::String(model_key.to_string()));
    payload.insert(
        "input_type".to_string(),
        Value::String(input_type.as_str().to_string()),
    );
    payload.insert(
        "output_type".to_string(),
        Value::String(output_type.as_str().to_string()),
    );

    let fields = match input_type {
        InputType::Image => image_fields(raw)?,
        InputType::Text => text_fields(raw)?,
        InputType::MultiText => multi_text_fields(raw)?,
        InputType::Csv => csv_fields(raw)?,
        InputType::Json => json_fields(raw)?,
        InputType::Numeric => numeric_fields(raw)?,
    };
    payload.extend(fields);

    Ok(Value::Object(payload))
}

fn image_fields(raw: &RawInput) -> Result<Map<String, Value>, PayloadError> {
    let mut fields = Map::new();

    if let Some(file) = raw.file(&["image", "file"]) {
        fields.insert(
            "image_base64".to_string(),
            Value::String(BASE64.encode(&file.data)),
        );
        return Ok(fields);
    }

    if let Some(Value::String(encoded)) = raw.json_field("image_base64") {
        fields.insert(
            "image_base64".to_string(),
            Value::String(encoded.clone()),
        );
        return Ok(fields);
    }

    Err(PayloadError::new(
        "Image input required. Send a multipart field 'image' (or 'file'), or JSON {\"image_base64\": \"...\"}.",
    ))
}

fn text_fields(raw: &RawInput) -> Result<Map<String, Value>, PayloadError> {
    match raw.json_field("text") {
        Some(Value::String(text)) => {
            let mut fields = Map::new();
            fields.insert("text".to_string(), Value::String(text.clone()));
            Ok(fields)
        }
        _ => Err(PayloadError::new(
            "Text input required. Send JSON {\"text\": \"...\"}.",
        )),
    }
}

fn multi_text_fields(raw: &RawInput) -> Result<Map<String, Value>, PayloadError> {
    match raw.json_field("texts") {
        Some(Value::Array(texts)) => {
            let mut fields = Map::new();
            fields.insert("texts".to_string(), Value::Array(texts.clone()));
            Ok(fields)
        }
        _ => Err(PayloadError::new(
            "Multiple text inputs required. Send JSON {\"texts\": [\"...\", \"...\"]}.",
        )),
    }
}

fn csv_fields(raw: &RawInput) -> Result<Map<String, Value>, PayloadError> {
    let mut fields = Map::new();

    if let Some(file) = raw.file(&["csv", "file"]) {
        let text = String::from_utf8(file.data.clone()).map_err(|_| {
            PayloadError::new("CSV file must be UTF-8 encoded text.")
        })?;
        fields.insert("csv_data".to_string(), Value::String(text));
        return Ok(fields);
    }

    if let Some(Value::String(csv_data)) = raw.json_field("csv_data") {
        fields.insert("csv_data".to_string(), Value::String(csv_data.clone()));
        return Ok(fields);
    }

    Err(PayloadError::new(
        "CSV input required. Send a multipart field 'csv' (or 'file'), or JSON {\"csv_data\": \"...\"}.",
    ))
}

fn json_fields(raw: &RawInput) -> Result<Map<String, Value>, PayloadError> {
    match raw.json_field("data") {
        Some(data) => {
            let mut fields = Map::new();
            fields.insert("data".to_string(), data.clone());
            Ok(fields)
        }
        None => Err(PayloadError::new(
            "JSON input required. Send JSON {\"data\": ...}.",
        )),
    }
}

fn numeric_fields(raw: &RawInput) -> Result<Map<String, Value>, PayloadError> {
    match raw.json_field("inputs") {
        Some(inputs) => {
            let mut fields = Map::new();
            fields.insert("inputs".to_string(), inputs.clone());
            Ok(fields)
        }
        None => Err(PayloadError::new(
            "Numeric input required. Send JSON {\"inputs\": [...]}.",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(input_type: InputType, raw: &RawInput) -> Result<Value, PayloadError> {
        build_payload(
            input_type,
            OutputType::Classification,
            "/data/models/abc.h5",
            "models/u/abc.h5",
            raw,
        )
    }

    fn file(data: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: "input.bin".to_string(),
            content_type: None,
            data: data.to_vec(),
        }
    }

    #[test]
    fn envelope_always_carries_model_and_types() {
        let raw = RawInput::from_json(json!({"inputs": [1, 2, 3]}));
        let payload = build(InputType::Numeric, &raw).unwrap();
        assert_eq!(payload["model_path"], "/data/models/abc.h5");
        assert_eq!(payload["model_key"], "models/u/abc.h5");
        assert_eq!(payload["input_type"], "numeric");
        assert_eq!(payload["output_type"], "classification");
        assert_eq!(payload["inputs"], json!([1, 2, 3]));
    }

    #[test]
    fn image_accepts_file_or_base64_json() {
        let mut raw = RawInput::default();
        raw.files.insert("image".to_string(), file(b"\x89PNG"));
        let payload = build(InputType::Image, &raw).unwrap();
        assert_eq!(payload["image_base64"], BASE64.encode(b"\x89PNG"));

        let raw = RawInput::from_json(json!({"image_base64": "aGVsbG8="}));
        let payload = build(InputType::Image, &raw).unwrap();
        assert_eq!(payload["image_base64"], "aGVsbG8=");

        // generic multipart field name works too
        let mut raw = RawInput::default();
        raw.files.insert("file".to_string(), file(b"jpg"));
        assert!(build(InputType::Image, &raw).is_ok());
    }

    #[test]
    fn image_missing_both_sources_is_an_error() {
        let err = build(InputType::Image, &RawInput::default()).unwrap_err();
        assert!(err.hint().contains("image_base64"));
        // a JSON body without the field is still missing input
        let raw = RawInput::from_json(json!({"text": "hello"}));
        assert!(build(InputType::Image, &raw).is_err());
    }

    #[test]
    fn text_requires_a_string() {
        let raw = RawInput::from_json(json!({"text": "hello"}));
        assert_eq!(build(InputType::Text, &raw).unwrap()["text"], "hello");

        assert!(build(InputType::Text, &RawInput::default()).is_err());
        let raw = RawInput::from_json(json!({"text": 42}));
        assert!(build(InputType::Text, &raw).is_err());
    }

    #[test]
    fn multi_text_requires_an_array() {
        let raw = RawInput::from_json(json!({"texts": ["a", "b"]}));
        assert_eq!(
            build(InputType::MultiText, &raw).unwrap()["texts"],
            json!(["a", "b"])
        );

        let raw = RawInput::from_json(json!({"texts": "not an array"}));
        let err = build(InputType::MultiText, &raw).unwrap_err();
        assert!(err.hint().contains("texts"));
    }

    #[test]
    fn csv_accepts_file_or_inline_string() {
        let mut raw = RawInput::default();
        raw.files.insert("csv".to_string(), file(b"a,b\n1,2\n"));
        assert_eq!(build(InputType::Csv, &raw).unwrap()["csv_data"], "a,b\n1,2\n");

        let raw = RawInput::from_json(json!({"csv_data": "x,y\n"}));
        assert_eq!(build(InputType::Csv, &raw).unwrap()["csv_data"], "x,y\n");

        assert!(build(InputType::Csv, &RawInput::default()).is_err());
    }

    #[test]
    fn csv_file_must_be_utf8() {
        let mut raw = RawInput::default();
        raw.files.insert("file".to_string(), file(&[0xff, 0xfe, 0x00]));
        let err = build(InputType::Csv, &raw).unwrap_err();
        assert!(err.hint().contains("UTF-8"));
    }

    #[test]
    fn json_passes_data_through_verbatim() {
        let raw = RawInput::from_json(json!({"data": {"nested": [1, 2]}}));
        assert_eq!(
            build(InputType::Json, &raw).unwrap()["data"],
            json!({"nested": [1, 2]})
        );
        assert!(build(InputType::Json, &RawInput::default()).is_err());
    }

    #[test]
    fn numeric_requires_inputs() {
        let raw = RawInput::from_json(json!({"inputs": [[1.0, 2.0]]}));
        assert!(build(InputType::Numeric, &raw).is_ok());

        let err = build(InputType::Numeric, &RawInput::default()).unwrap_err();
        assert!(err.hint().contains("inputs"));
    }
}
