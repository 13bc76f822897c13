//! Application layer wiring DTOs and services for Ulasan.

pub mod dtos;
pub mod services;

pub use dtos::{
    AnalyzeReviewRequest, AnalyzeReviewResponse, BatchPredictRequest, BatchPredictResponse,
    HealthStatusResponse, PredictRequest, ReanalysisResponse, ReanalysisSummary, ReviewListQuery,
};
pub use services::{ReviewService, SentimentClassifier};
