//! Output rendering.

pub mod generator;

pub use generator::{
    generate_health_report, generate_json_report, generate_markdown_report,
    generate_symptom_list, write_output,
};
