//! Lead API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use leadline_common::{Error, Pagination, Result, ValidatedJson};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::MessagingState;
use crate::domain::entities::{Lead, LeadStatus, LeadUpdate};

/// Lead response DTO
#[derive(Debug, Serialize)]
pub struct LeadResponse {
    pub id: Uuid,
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Lead> for LeadResponse {
    fn from(l: Lead) -> Self {
        Self {
            id: l.id,
            phone: l.phone,
            name: l.name,
            email: l.email,
            status: l.status,
            notes: l.notes,
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

/// Query parameters for listing leads
#[derive(Debug, Deserialize)]
pub struct ListLeadsParams {
    pub status: Option<LeadStatus>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// Request for updating a lead
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLeadRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub status: Option<LeadStatus>,
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
}

impl From<UpdateLeadRequest> for LeadUpdate {
    fn from(req: UpdateLeadRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            status: req.status,
            notes: req.notes,
        }
    }
}

/// List leads, newest first
pub async fn list_leads(
    State(state): State<MessagingState>,
    Query(params): Query<ListLeadsParams>,
) -> Result<Json<Vec<LeadResponse>>> {
    let page = Pagination {
        offset: params.offset,
        limit: params.limit,
    };
    let leads = state
        .service
        .list_leads(params.status, page.offset(), page.limit())
        .await?;

    Ok(Json(leads.into_iter().map(Into::into).collect()))
}

pub async fn get_lead(
    State(state): State<MessagingState>,
    Path(phone): Path<String>,
) -> Result<Json<LeadResponse>> {
    let lead = state
        .service
        .get_lead(&phone)
        .await?
        .ok_or_else(|| Error::NotFound("Lead not found".to_string()))?;

    Ok(Json(lead.into()))
}

pub async fn update_lead(
    State(state): State<MessagingState>,
    Path(phone): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateLeadRequest>,
) -> Result<Json<LeadResponse>> {
    let lead = state.service.update_lead(&phone, req.into()).await?;
    Ok(Json(lead.into()))
}

/// Delete a lead with everything it owns
pub async fn delete_lead(
    State(state): State<MessagingState>,
    Path(phone): Path<String>,
) -> Result<StatusCode> {
    if !state.service.delete_lead(&phone).await? {
        return Err(Error::NotFound("Lead not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
