pub mod sensitivity;

pub use sensitivity::{
    evaluate_grid, OutputMetric, SensitivityInput, SensitivityOutput, SweepAxis, SweepParameter,
};
