//! Catalog search and title bounds

use super::{DetailsQuery, SearchQuery};
use crate::api::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};

/// GET /catalog/search - Search titles
#[utoipa::path(
    get,
    path = "/api/v1/catalog/search",
    tag = "catalog",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching titles", body = Vec<crate::catalog::CatalogEntry>),
        (status = 502, description = "Catalog unavailable", body = crate::error::ApiError)
    )
)]
pub async fn search_catalog(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Response {
    if query.title.trim().is_empty() {
        return crate::error::Error::InvalidRequest("title must not be empty".into())
            .into_response();
    }
    match state.catalog.search(&query.title).await {
        Ok(hits) => Json(hits).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "catalog search failed");
            e.into_response()
        }
    }
}

/// GET /catalog/:id - Volume and chapter bounds of a title
#[utoipa::path(
    get,
    path = "/api/v1/catalog/{id}",
    tag = "catalog",
    params(
        ("id" = String, Path, description = "Catalog identifier"),
        DetailsQuery
    ),
    responses(
        (status = 200, description = "Title bounds", body = crate::catalog::CatalogDetails),
        (status = 502, description = "Catalog unavailable", body = crate::error::ApiError)
    )
)]
pub async fn catalog_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DetailsQuery>,
) -> Response {
    let language = query
        .language
        .unwrap_or_else(|| state.config.conversion.language.clone());
    match state.catalog.details(&id, &language).await {
        Ok(details) => Json(details).into_response(),
        Err(e) => e.into_response(),
    }
}
