use serde::{Deserialize, Serialize};

use crate::model::statistics::Statistics;

/// Statistics as reported to API clients, along with the rendered chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    #[serde(flatten)]
    pub statistics: Statistics,
    pub chart_generated: bool,
    pub chart_path: String,
}
