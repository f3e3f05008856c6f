//! 文档 schema 与校验：研究报告、行程计划、三态校验结果

pub mod outcome;
pub mod types;
pub mod validator;

pub use outcome::{SchemaKind, ValidationOutcome, MARKER_FAILURE, MARKER_SKIPPED, MARKER_SUCCESS};
pub use types::{Currency, Finding, ItineraryDay, ItineraryPlan, ResearchReport, Source};
pub use validator::{
    extract_json_payload, parse_itinerary_plan, parse_research_report, validate, validate_message,
};
