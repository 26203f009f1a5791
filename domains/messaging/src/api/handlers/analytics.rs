//! Analytics API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use leadline_common::Result;
use serde::{Deserialize, Serialize};

use crate::analytics::{LeadStats, SentimentSummary, StatsReport};
use crate::api::middleware::MessagingState;

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StatsResponse {
    Lead(LeadStats),
    All(StatsReport),
}

/// Delivery stats for one phone, or per phone plus overall
pub async fn stats(
    State(state): State<MessagingState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<StatsResponse>> {
    let response = match params.phone.as_deref().filter(|p| !p.is_empty()) {
        Some(phone) => StatsResponse::Lead(state.service.lead_stats(phone).await?),
        None => StatsResponse::All(state.service.stats().await?),
    };
    Ok(Json(response))
}

pub async fn sentiment_summary(
    State(state): State<MessagingState>,
    Path(phone): Path<String>,
) -> Result<Json<SentimentSummary>> {
    Ok(Json(state.service.sentiment_summary(&phone).await?))
}
