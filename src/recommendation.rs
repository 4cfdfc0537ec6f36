//! Operator recommendations for each status tier

use crate::types::{CongestionStatus, Sector};

/// Plain-text guidance for the dashboard and alert body
pub fn recommendation(status: CongestionStatus, hotspot: Sector) -> String {
    match status {
        CongestionStatus::Normal => "Flow nominal. Monitoring active.".to_string(),
        CongestionStatus::Warning => format!(
            "Congestion building in {hotspot}. Deploy stewards / monitor traffic signals."
        ),
        CongestionStatus::Critical => format!(
            "HAZARD: blockage in {hotspot}. Halt inflow / redirect traffic immediately."
        ),
    }
}
