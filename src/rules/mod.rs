//! Built-in native rules

mod coupling;
mod state_shape;
mod view_complexity;

pub use coupling::{CouplingConfig, CouplingRule};
pub use state_shape::{StateShapeConfig, StateShapeRule};
pub use view_complexity::{ViewComplexityConfig, ViewComplexityRule};

use crate::config::Thresholds;
use crate::rule::Rule;
use std::sync::Arc;

/// The built-in rule pack, configured from the threshold section
pub fn core_pack(thresholds: &Thresholds) -> Vec<Arc<dyn Rule>> {
    vec![
        Arc::new(StateShapeRule::new(thresholds.state_shape.clone())),
        Arc::new(ViewComplexityRule::new(thresholds.view_complexity.clone())),
        Arc::new(CouplingRule::new(thresholds.coupling.clone())),
    ]
}
