//! Projection of parsed rows onto the axes a user picked for a chart.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sheet::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Doughnut,
    Scatter,
    Area,
    Radar,
    Scatter3d,
    Surface3d,
    Bar3d,
}

impl ChartType {
    pub fn is_3d(self) -> bool {
        matches!(self, ChartType::Scatter3d | ChartType::Surface3d | ChartType::Bar3d)
    }

    /// Category charts label each point with its x value.
    fn is_categorical(self) -> bool {
        matches!(
            self,
            ChartType::Bar
                | ChartType::Line
                | ChartType::Pie
                | ChartType::Doughnut
                | ChartType::Area
                | ChartType::Radar
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    #[serde(alias = "chart_type")]
    pub chart_type: ChartType,
    pub x: String,
    pub y: String,
    pub z: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Series {
    pub x: Vec<Value>,
    pub y: Vec<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub chart_type: ChartType,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    pub series: Series,
}

#[derive(Debug, PartialEq)]
pub enum ChartError {
    NoRows,
    UnknownColumn(String),
    MissingZ(ChartType),
}

impl std::fmt::Display for ChartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChartError::NoRows => write!(f, "No rows to chart"),
            ChartError::UnknownColumn(c) => write!(f, "Unknown column: {c}"),
            ChartError::MissingZ(t) => write!(f, "Chart type {t:?} needs a z column"),
        }
    }
}

impl std::error::Error for ChartError {}

/// Pick `spec`'s columns out of `rows`. y/z are coerced to numbers; cells that
/// aren't numeric become `None` and are left for the renderer to deal with.
pub fn project(rows: &[Row], spec: &ChartSpec) -> Result<ChartData, ChartError> {
    if rows.is_empty() {
        return Err(ChartError::NoRows);
    }

    let z_col = match (spec.chart_type.is_3d(), &spec.z) {
        (true, Some(z)) => Some(z.as_str()),
        (true, None) => return Err(ChartError::MissingZ(spec.chart_type)),
        (false, _) => None,
    };

    for col in [Some(spec.x.as_str()), Some(spec.y.as_str()), z_col]
        .into_iter()
        .flatten()
    {
        if !rows.iter().any(|r| r.contains_key(col)) {
            return Err(ChartError::UnknownColumn(col.to_string()));
        }
    }

    let x: Vec<Value> = rows
        .iter()
        .map(|r| r.get(&spec.x).cloned().unwrap_or(Value::Null))
        .collect();
    let y = rows.iter().map(|r| r.get(&spec.y).and_then(as_number)).collect();
    let z = z_col.map(|col| rows.iter().map(|r| r.get(col).and_then(as_number)).collect());

    let labels = spec
        .chart_type
        .is_categorical()
        .then(|| x.iter().map(label_of).collect());

    Ok(ChartData {
        chart_type: spec.chart_type,
        mode: if spec.chart_type.is_3d() { "3d" } else { "2d" },
        labels,
        series: Series { x, y, z },
    })
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn label_of(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
