//! Part parameters: the catalogue of known fields and the typed view of
//! the evaluation part.

use serde::Deserialize;

use crate::error::PartgenError;
use crate::state_machine::{JobParameters, ParamValue};
use crate::util::{QueryValue, format_g, query_string_to_map};

/// One entry of a parameter catalogue file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: String,
    pub sort_order: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub default: Option<ParamValue>,
}

/// Parse a catalogue (a JSON array of [`ParamSpec`]) sorted by `sortOrder`.
pub fn parse_param_specs(json: &str) -> Result<Vec<ParamSpec>, PartgenError> {
    let mut specs: Vec<ParamSpec> = serde_json::from_str(json)?;
    specs.sort_by(|a, b| a.sort_order.total_cmp(&b.sort_order));
    Ok(specs)
}

/// Default values of a catalogue, in catalogue order.
pub fn catalogue_defaults(specs: &[ParamSpec]) -> JobParameters {
    specs
        .iter()
        .filter_map(|s| s.default.clone().map(|d| (s.name.clone(), d)))
        .collect()
}

/// Job parameters from a query string. List values (`key[]=`) are not part
/// of the engine protocol and are rejected.
pub fn parameters_from_query(query: &str) -> Result<JobParameters, PartgenError> {
    let mut params = JobParameters::new();
    for (name, value) in query_string_to_map(query) {
        match value {
            QueryValue::Single(raw) => params.insert(name, ParamValue::parse(&raw)),
            QueryValue::List(_) => {
                return Err(PartgenError::InvalidParameter {
                    name,
                    reason: "list values are not supported".into(),
                });
            }
        }
    }
    Ok(params)
}

pub const LAYER_HEIGHT: &str = "layer_height";
pub const COL_MIN: &str = "col_min";
pub const COL_MAX: &str = "col_max";
pub const BAR_MIN: &str = "bar_min";
pub const BAR_MAX: &str = "bar_max";

/// Typed view of the evaluation part's fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelParams {
    pub layer_height: f64,
    /// Column (vertical pillar) diameter range.
    pub col_min: f64,
    pub col_max: f64,
    /// Bar (horizontal pillar) diameter range.
    pub bar_min: f64,
    pub bar_max: f64,
}

impl ModelParams {
    pub fn from_parameters(params: &JobParameters) -> Result<Self, PartgenError> {
        let field = |name: &str| -> Result<f64, PartgenError> {
            let value = params
                .get(name)
                .ok_or_else(|| PartgenError::MissingParameter(name.to_string()))?;
            value.as_f64().ok_or_else(|| PartgenError::InvalidParameter {
                name: name.to_string(),
                reason: format!("{value:?} is not a number"),
            })
        };

        Ok(Self {
            layer_height: field(LAYER_HEIGHT)?,
            col_min: field(COL_MIN)?,
            col_max: field(COL_MAX)?,
            bar_min: field(BAR_MIN)?,
            bar_max: field(BAR_MAX)?,
        })
    }

    #[cfg(test)]
    fn to_parameters(&self) -> JobParameters {
        [
            (LAYER_HEIGHT, self.layer_height),
            (COL_MIN, self.col_min),
            (COL_MAX, self.col_max),
            (BAR_MIN, self.bar_min),
            (BAR_MAX, self.bar_max),
        ]
        .into_iter()
        .collect()
    }

    /// Compact label, unique per combination of fields:
    /// `l<layer>c<col_min>-<col_max>_r<bar_min>-<bar_max>`, numbers in `%g` form.
    pub fn job_key(&self) -> String {
        format!(
            "l{}c{}-{}_r{}-{}",
            format_g(self.layer_height),
            format_g(self.col_min),
            format_g(self.col_max),
            format_g(self.bar_min),
            format_g(self.bar_max)
        )
    }
}
