use std::sync::Arc;

use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse};
use base64::Engine as _;
use chrono::Utc;

use crate::error::ApiError;
use crate::models::*;
use crate::repo::AdRepo;
use crate::storage::{object_key, MediaStore};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1").service(
            web::resource("/ads")
                .route(web::get().to(list_ads))
                .route(web::post().to(create_ad))
                .route(web::put().to(update_ad))
                .route(web::delete().to(delete_ad))
                .route(web::method(Method::OPTIONS).to(preflight))
                .default_service(web::to(method_not_allowed)),
        ),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn AdRepo>,
    pub media: Arc<dyn MediaStore>,
}

/// PUT sub-actions, resolved once from the `action` query flag. Anything
/// unrecognized falls through to a plain re-read of the ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    Like,
    View,
}

impl UpdateAction {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(UpdateAction::Like),
            "view" => Some(UpdateAction::View),
            _ => None,
        }
    }
}

/// Caller identity comes from the `X-User-Id` header, trusted as-is.
/// A missing header degrades to the empty string, which matches no
/// like/view rows.
fn user_id(req: &HttpRequest) -> String {
    req.headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

#[derive(Debug, serde::Deserialize)]
pub struct UpdateQuery {
    pub action: Option<String>,
    pub id: Option<Id>,
}

#[derive(Debug, serde::Deserialize)]
pub struct DeleteQuery {
    pub id: Option<Id>,
}

/// Explicit preflight: answered before any repo or storage access.
pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("Access-Control-Allow-Origin", "*"))
        .insert_header(("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"))
        .insert_header(("Access-Control-Allow-Headers", "Content-Type, X-User-Id"))
        .finish()
}

pub async fn method_not_allowed() -> Result<HttpResponse, ApiError> {
    Err(ApiError::MethodNotAllowed)
}

#[utoipa::path(
    get,
    path = "/api/v1/ads",
    params(("X-User-Id" = Option<String>, Header, description = "Caller identity for the user_liked/user_viewed flags")),
    responses(
        (status = 200, description = "All ads, newest first", body = [AdListItem])
    )
)]
pub async fn list_ads(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = user_id(&req);
    let ads = data.repo.list_ads(&user).await?;
    Ok(HttpResponse::Ok().json(ads))
}

#[utoipa::path(
    post,
    path = "/api/v1/ads",
    request_body = CreateAdRequest,
    responses(
        (status = 201, description = "Ad created", body = Ad),
        (status = 400, description = "Missing or malformed fields")
    )
)]
pub async fn create_ad(
    data: web::Data<AppState>,
    payload: web::Json<CreateAdRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    if !req.has_required_fields() {
        return Err(ApiError::BadRequest("Missing required fields".into()));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.file_data)
        .map_err(|_| ApiError::BadRequest("Invalid base64 file data".into()))?;

    // Upload strictly before the insert: a failed upload must not leave a row.
    let key = object_key(&req.file_name, Utc::now());
    data.media.put(&key, &req.file_type, &bytes).await?;
    let url = data.media.public_url(&key);

    let ad = data
        .repo
        .create_ad(NewAd {
            kind: AdType::from_mime(&req.file_type),
            url,
            title: req.title,
            description: req.description,
        })
        .await?;
    Ok(HttpResponse::Created().json(ad))
}

#[utoipa::path(
    put,
    path = "/api/v1/ads",
    params(
        ("action" = Option<String>, Query, description = "like (toggle) or view (write-once)"),
        ("id" = Option<i64>, Query, description = "Ad id"),
        ("X-User-Id" = Option<String>, Header, description = "Caller identity")
    ),
    responses(
        (status = 200, description = "Ad after the action", body = Ad),
        (status = 400, description = "Missing ad id"),
        (status = 404, description = "Ad not found")
    )
)]
pub async fn update_ad(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<UpdateQuery>,
) -> Result<HttpResponse, ApiError> {
    let ad_id = query
        .id
        .ok_or_else(|| ApiError::BadRequest("Missing ad id".into()))?;
    let user = user_id(&req);

    let action = query.action.as_deref().and_then(UpdateAction::parse);
    let ad = match action {
        Some(UpdateAction::Like) => data.repo.toggle_like(ad_id, &user).await?,
        Some(UpdateAction::View) => data.repo.record_view(ad_id, &user).await?,
        // unknown or absent action: no mutation, just return the current row
        None => data.repo.get_ad(ad_id).await?,
    };
    Ok(HttpResponse::Ok().json(ad))
}

#[utoipa::path(
    delete,
    path = "/api/v1/ads",
    params(("id" = Option<i64>, Query, description = "Ad id")),
    responses(
        (status = 200, description = "Acknowledged (whether or not the ad existed)", body = DeleteResponse),
        (status = 400, description = "Missing ad id")
    )
)]
pub async fn delete_ad(
    data: web::Data<AppState>,
    query: web::Query<DeleteQuery>,
) -> Result<HttpResponse, ApiError> {
    let ad_id = query
        .id
        .ok_or_else(|| ApiError::BadRequest("Missing ad id".into()))?;
    data.repo.delete_ad(ad_id).await?;
    Ok(HttpResponse::Ok().json(DeleteResponse { success: true }))
}
