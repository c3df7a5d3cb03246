use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{dal::account_db, domain::lead::SearchRequest, services::PipelineOrchestrator};

const DEFAULT_TARGET_LIMIT: u32 = 5;

fn default_target_limit() -> u32 {
    DEFAULT_TARGET_LIMIT
}

#[derive(Deserialize)]
pub struct StartSearchBody {
    pub requester_id: Uuid,
    pub keyword: String,
    pub location: String,
    #[serde(default = "default_target_limit")]
    pub target_limit: u32,
}

fn parse_search_request(body: StartSearchBody) -> Result<SearchRequest, String> {
    let keyword = body.keyword.trim();
    let location = body.location.trim();

    if keyword.is_empty() {
        return Err("keyword must not be empty".to_string());
    }
    if location.is_empty() {
        return Err("location must not be empty".to_string());
    }
    if body.target_limit == 0 || i32::try_from(body.target_limit).is_err() {
        return Err(format!("target_limit {} is out of range", body.target_limit));
    }

    Ok(SearchRequest {
        keyword: keyword.to_string(),
        location: location.to_string(),
        requester_id: body.requester_id,
        limit: body.target_limit as usize,
    })
}

#[post("/start-search")]
pub async fn start_search(
    body: web::Json<StartSearchBody>,
    pool: web::Data<PgPool>,
    orchestrator: web::Data<PipelineOrchestrator>,
) -> HttpResponse {
    let request = match parse_search_request(body.into_inner()) {
        Ok(request) => request,
        Err(message) => return HttpResponse::BadRequest().json(json!({ "error": message })),
    };

    let credits = request.limit as i32;
    let balance = match account_db::debit_credits(&pool, request.requester_id, credits).await {
        Ok(Some(balance)) => balance,
        Ok(None) => {
            log::info!(
                "Refused search for {}: not enough credits for {}",
                request.requester_id,
                credits
            );
            return HttpResponse::BadRequest().json(json!({ "error": "insufficient credits" }));
        }
        Err(e) => {
            log::error!("Failed to debit credits for {}: {:?}", request.requester_id, e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    log::info!(
        "Starting search '{}' in '{}' for {} ({} credits left)",
        request.keyword,
        request.location,
        request.requester_id,
        balance
    );
    orchestrator.into_inner().spawn_supervised(request);

    HttpResponse::Accepted().json(json!({
        "status": "started",
        "credits_remaining": balance,
    }))
}
