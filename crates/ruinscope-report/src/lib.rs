//! ruinscope-report: Pure response serializers (sans-IO)
//!
//! Turns an [`AnalysisResult`](ruinscope_core::AnalysisResult) or an
//! [`AnalysisError`](ruinscope_core::AnalysisError) into what a client
//! sees: the response JSON, the error body, or a plain-text report.

pub mod json;
pub mod text;

pub use json::{AnalysisReport, AnalysisResponse, ErrorResponse, VisualizationRef, data_url};
pub use text::to_text;
