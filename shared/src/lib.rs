use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shape of data a hosted model consumes. Drives payload construction on the
/// predict path and form rendering in clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Image,
    Text,
    MultiText,
    Csv,
    Numeric,
    Json,
}

/// Shape of data a hosted model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    Classification,
    Regression,
    Text,
    Image,
    Json,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Image => "image",
            InputType::Text => "text",
            InputType::MultiText => "multi_text",
            InputType::Csv => "csv",
            InputType::Numeric => "numeric",
            InputType::Json => "json",
        }
    }
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::Classification => "classification",
            OutputType::Regression => "regression",
            OutputType::Text => "text",
            OutputType::Image => "image",
            OutputType::Json => "json",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(InputType::Image),
            "text" => Ok(InputType::Text),
            "multi_text" => Ok(InputType::MultiText),
            "csv" => Ok(InputType::Csv),
            "numeric" => Ok(InputType::Numeric),
            "json" => Ok(InputType::Json),
            other => Err(format!("unknown input type: {}", other)),
        }
    }
}

impl FromStr for OutputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classification" => Ok(OutputType::Classification),
            "regression" => Ok(OutputType::Regression),
            "text" => Ok(OutputType::Text),
            "image" => Ok(OutputType::Image),
            "json" => Ok(OutputType::Json),
            other => Err(format!("unknown output type: {}", other)),
        }
    }
}

/// One named, typed entry of a model's declared input schema, as parsed from
/// its README.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub description: String,
}
