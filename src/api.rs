//! REST API for the storage allocator.
//!
//! Exposes placement, removal, moves, analytics and warehouse administration
//! over HTTP. Uses Axum as the web framework and supports CORS. Engine calls
//! take blocking locks and therefore run on the blocking thread pool.

use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, Query, State};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
};
use log::{error, info};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::analytics::{
    AnalyticsEngine, CellInfo, CellLocation, CellRecordInfo, CellUtilization, DetailedStats,
    ItemVolume, Recommendation, WarehouseStats,
};
use crate::config::ApiConfig;
use crate::engine::{AllocatorConfig, CellCandidate, Move, Placement, PlacementEngine, Removal};
use crate::error::{AllocResult, AllocatorError};
use crate::inventory::InMemoryInventory;
use crate::model::{
    CellId, ItemDescriptor, ItemId, Rack, RackId, StorageClass, Warehouse, WarehouseId,
};
use crate::orientation::Orientation;
use crate::topology::{SharedTopology, Topology, WarehouseLayout};
use crate::types::Dims3;

/// Shared handles of the running service.
#[derive(Clone)]
pub struct ApiState {
    topology: SharedTopology,
    inventory: Arc<InMemoryInventory>,
    placement: Arc<PlacementEngine>,
    analytics: Arc<AnalyticsEngine>,
    config: AllocatorConfig,
}

impl ApiState {
    /// Creates a state with an empty topology and inventory.
    pub fn new(config: AllocatorConfig) -> Self {
        let topology = SharedTopology::new(Topology::new());
        let inventory = Arc::new(InMemoryInventory::new());
        Self {
            placement: Arc::new(PlacementEngine::new(
                topology.clone(),
                inventory.clone(),
                config,
            )),
            analytics: Arc::new(AnalyticsEngine::new(
                topology.clone(),
                inventory.clone(),
                config,
            )),
            topology,
            inventory,
            config,
        }
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>stockplace API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Registers an item descriptor with the in-process inventory.
///
/// `pending` sets the number of units waiting to be placed. When omitted, an
/// existing counter is kept.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "footprint": {"length": 40.0, "width": 30.0, "height": 20.0},
    "storage_class": "ambient",
    "pending": 100
}))]
pub struct RegisterItemRequest {
    pub id: ItemId,
    #[serde(default)]
    pub footprint: Option<Dims3>,
    pub storage_class: StorageClass,
    #[serde(default)]
    pub pending: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct RegisteredItem {
    pub item: ItemDescriptor,
    pub unplaced: u64,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "R5",
    "cells": 10,
    "cell_dims": {"length": 100.0, "width": 100.0, "height": 50.0}
}))]
pub struct AddRackRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub cells: u32,
    pub cell_dims: Dims3,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({"item_id": 1, "quantity": 10}))]
pub struct QuantityRequest {
    pub item_id: ItemId,
    pub quantity: u32,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({"item_id": 1, "cell_id": 3, "quantity": 10, "orientation": "standard"}))]
pub struct CellPlacementRequest {
    pub item_id: ItemId,
    pub cell_id: CellId,
    pub quantity: u32,
    #[serde(default)]
    #[schema(nullable = true)]
    pub orientation: Option<Orientation>,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({"item_id": 1, "cell_id": 3, "quantity": 5}))]
pub struct RemovalRequest {
    pub item_id: ItemId,
    pub cell_id: CellId,
    pub quantity: u32,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({"item_id": 1, "from_cell_id": 3, "to_cell_id": 4, "quantity": 5}))]
pub struct MoveRequest {
    pub item_id: ItemId,
    pub from_cell_id: CellId,
    pub to_cell_id: CellId,
    pub quantity: u32,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UnderutilizedQuery {
    /// Highest occupancy percent to include (defaults to the "mostly empty" band)
    pub max_occupancy: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct CapacityResponse {
    pub cell_id: CellId,
    pub item_id: ItemId,
    pub max_placeable: u32,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "invalid_json",
        err.to_string(),
    )
}

fn status_for(err: &AllocatorError) -> StatusCode {
    match err {
        AllocatorError::NotFound { .. } => StatusCode::NOT_FOUND,
        AllocatorError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AllocatorError::Infeasible(_)
        | AllocatorError::IncompatibleStorageClass { .. }
        | AllocatorError::InsufficientOccupancy { .. }
        | AllocatorError::NotEmpty { .. } => StatusCode::CONFLICT,
        AllocatorError::ConcurrentModification(_) => StatusCode::SERVICE_UNAVAILABLE,
        AllocatorError::CompensationFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn allocator_error(err: AllocatorError) -> Response {
    error_response(status_for(&err), err.code(), err.to_string())
}

fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload.map(|Json(value)| value).map_err(json_deserialize_error)
}

/// Runs an engine call on the blocking pool and maps its outcome to a response.
async fn run_blocking<T, F>(status: StatusCode, task: F) -> Response
where
    F: FnOnce() -> AllocResult<T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(Ok(value)) => (status, Json(value)).into_response(),
        Ok(Err(err)) => allocator_error(err),
        Err(err) => {
            error!("❌ Engine task aborted: {}", err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                err.to_string(),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_register_item,
        handle_item_locations,
        handle_create_warehouse,
        handle_list_warehouses,
        handle_delete_warehouse,
        handle_add_rack,
        handle_delete_rack,
        handle_warehouse_stats,
        handle_detailed_stats,
        handle_underutilized,
        handle_cell_info,
        handle_cell_capacity,
        handle_place_optimal,
        handle_place_in_cell,
        handle_check_placement,
        handle_remove,
        handle_move
    ),
    components(
        schemas(
            RegisterItemRequest,
            RegisteredItem,
            AddRackRequest,
            QuantityRequest,
            CellPlacementRequest,
            RemovalRequest,
            MoveRequest,
            CapacityResponse,
            ErrorResponse,
            Dims3,
            StorageClass,
            Orientation,
            ItemDescriptor,
            WarehouseLayout,
            Warehouse,
            Rack,
            Placement,
            Removal,
            Move,
            CellCandidate,
            CellLocation,
            WarehouseStats,
            DetailedStats,
            ItemVolume,
            CellUtilization,
            Recommendation,
            CellInfo,
            CellRecordInfo
        )
    ),
    tags(
        (name = "placement", description = "Placing, removing and moving stock"),
        (name = "analytics", description = "Read-only occupancy queries"),
        (name = "admin", description = "Items, warehouses and racks")
    )
)]
struct ApiDoc;

/// Builds the router with all API and documentation routes.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        // Administration
        .route("/items", post(handle_register_item))
        .route("/items/{id}/locations", get(handle_item_locations))
        .route(
            "/warehouses",
            post(handle_create_warehouse).get(handle_list_warehouses),
        )
        .route("/warehouses/{id}", delete(handle_delete_warehouse))
        .route("/warehouses/{id}/racks", post(handle_add_rack))
        .route("/racks/{id}", delete(handle_delete_rack))
        // Analytics
        .route("/warehouses/{id}/stats", get(handle_warehouse_stats))
        .route("/warehouses/{id}/stats/detailed", get(handle_detailed_stats))
        .route("/warehouses/{id}/underutilized", get(handle_underutilized))
        .route("/cells/{id}", get(handle_cell_info))
        .route("/cells/{id}/capacity/{item_id}", get(handle_cell_capacity))
        // Placement
        .route("/placements/optimal", post(handle_place_optimal))
        .route("/placements/cell", post(handle_place_in_cell))
        .route("/placements/check", post(handle_check_placement))
        .route("/removals", post(handle_remove))
        .route("/moves", post(handle_move))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address and serves until the server terminates.
pub async fn start_api_server(
    config: ApiConfig,
    allocator_config: AllocatorConfig,
) -> std::io::Result<()> {
    let app = router(ApiState::new(allocator_config));

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let display_host = config.display_host().to_string();
    info!(
        "🚀 Server running on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("💡 Local access: http://localhost:{}", config.port());
    }
    info!("📦 Placement: POST /placements/optimal, /placements/cell, /placements/check, /removals, /moves");
    info!("📊 Analytics: GET /warehouses/{{id}}/stats, /cells/{{id}}, /items/{{id}}/locations");
    info!("📑 Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

#[utoipa::path(
    post,
    path = "/items",
    request_body = RegisterItemRequest,
    responses(
        (status = 200, description = "Item registered", body = RegisteredItem),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid item", body = ErrorResponse)
    ),
    tag = "admin"
)]
async fn handle_register_item(
    State(state): State<ApiState>,
    payload: Result<Json<RegisterItemRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let item = match ItemDescriptor::new(request.id, request.footprint, request.storage_class) {
        Ok(item) => item,
        Err(err) => return allocator_error(err.into()),
    };

    match request.pending {
        Some(pending) => state.inventory.register_with_pending(item.clone(), pending),
        None => state.inventory.register(item.clone()),
    }
    let unplaced = state.inventory.unplaced(item.id).unwrap_or(0);
    info!("🏷️ Registered item {} ({} unplaced)", item.id, unplaced);
    (StatusCode::OK, Json(RegisteredItem { item, unplaced })).into_response()
}

#[utoipa::path(
    get,
    path = "/items/{id}/locations",
    params(("id" = u64, Path, description = "Item id")),
    responses(
        (status = 200, description = "Cells holding the item", body = Vec<CellLocation>),
        (status = NOT_FOUND, description = "Unknown item", body = ErrorResponse)
    ),
    tag = "analytics"
)]
async fn handle_item_locations(
    State(state): State<ApiState>,
    Path(item_id): Path<ItemId>,
) -> Response {
    run_blocking(StatusCode::OK, move || state.analytics.locations_of(item_id)).await
}

#[utoipa::path(
    post,
    path = "/warehouses",
    request_body = WarehouseLayout,
    responses(
        (status = 201, description = "Warehouse created with all racks and cells", body = Warehouse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid layout", body = ErrorResponse)
    ),
    tag = "admin"
)]
async fn handle_create_warehouse(
    State(state): State<ApiState>,
    payload: Result<Json<WarehouseLayout>, JsonRejection>,
) -> Response {
    let layout = match parse_json(payload) {
        Ok(layout) => layout,
        Err(response) => return response,
    };
    run_blocking(StatusCode::CREATED, move || {
        let mut topology = state.topology.write(state.config.lock_timeout)?;
        let id = topology.create_warehouse(&layout)?;
        topology.warehouse(id).cloned()
    })
    .await
}

#[utoipa::path(
    get,
    path = "/warehouses",
    responses(
        (status = 200, description = "Statistics of every warehouse", body = Vec<WarehouseStats>)
    ),
    tag = "analytics"
)]
async fn handle_list_warehouses(State(state): State<ApiState>) -> Response {
    run_blocking(StatusCode::OK, move || state.analytics.overview()).await
}

#[utoipa::path(
    delete,
    path = "/warehouses/{id}",
    params(("id" = u64, Path, description = "Warehouse id")),
    responses(
        (status = 200, description = "Warehouse deleted", body = Warehouse),
        (status = NOT_FOUND, description = "Unknown warehouse", body = ErrorResponse),
        (status = CONFLICT, description = "Warehouse still holds stock", body = ErrorResponse)
    ),
    tag = "admin"
)]
async fn handle_delete_warehouse(
    State(state): State<ApiState>,
    Path(warehouse_id): Path<WarehouseId>,
) -> Response {
    run_blocking(StatusCode::OK, move || {
        let timeout = state.config.lock_timeout;
        state
            .topology
            .write(timeout)?
            .delete_warehouse(warehouse_id, timeout)
    })
    .await
}

#[utoipa::path(
    post,
    path = "/warehouses/{id}/racks",
    params(("id" = u64, Path, description = "Warehouse id")),
    request_body = AddRackRequest,
    responses(
        (status = 201, description = "Rack added", body = Rack),
        (status = NOT_FOUND, description = "Unknown warehouse", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid rack", body = ErrorResponse)
    ),
    tag = "admin"
)]
async fn handle_add_rack(
    State(state): State<ApiState>,
    Path(warehouse_id): Path<WarehouseId>,
    payload: Result<Json<AddRackRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    run_blocking(StatusCode::CREATED, move || {
        let mut topology = state.topology.write(state.config.lock_timeout)?;
        let rack_id =
            topology.add_rack(warehouse_id, request.name, request.cells, request.cell_dims)?;
        topology.rack(rack_id).cloned()
    })
    .await
}

#[utoipa::path(
    delete,
    path = "/racks/{id}",
    params(("id" = u64, Path, description = "Rack id")),
    responses(
        (status = 200, description = "Rack deleted", body = Rack),
        (status = NOT_FOUND, description = "Unknown rack", body = ErrorResponse),
        (status = CONFLICT, description = "Rack still holds stock", body = ErrorResponse)
    ),
    tag = "admin"
)]
async fn handle_delete_rack(
    State(state): State<ApiState>,
    Path(rack_id): Path<RackId>,
) -> Response {
    run_blocking(StatusCode::OK, move || {
        let timeout = state.config.lock_timeout;
        state.topology.write(timeout)?.delete_rack(rack_id, timeout)
    })
    .await
}

#[utoipa::path(
    get,
    path = "/warehouses/{id}/stats",
    params(("id" = u64, Path, description = "Warehouse id")),
    responses(
        (status = 200, description = "Aggregated occupancy", body = WarehouseStats),
        (status = NOT_FOUND, description = "Unknown warehouse", body = ErrorResponse)
    ),
    tag = "analytics"
)]
async fn handle_warehouse_stats(
    State(state): State<ApiState>,
    Path(warehouse_id): Path<WarehouseId>,
) -> Response {
    run_blocking(StatusCode::OK, move || {
        state.analytics.warehouse_statistics(warehouse_id)
    })
    .await
}

#[utoipa::path(
    get,
    path = "/warehouses/{id}/stats/detailed",
    params(("id" = u64, Path, description = "Warehouse id")),
    responses(
        (status = 200, description = "Occupancy with per-item breakdown", body = DetailedStats),
        (status = NOT_FOUND, description = "Unknown warehouse", body = ErrorResponse)
    ),
    tag = "analytics"
)]
async fn handle_detailed_stats(
    State(state): State<ApiState>,
    Path(warehouse_id): Path<WarehouseId>,
) -> Response {
    run_blocking(StatusCode::OK, move || {
        state.analytics.detailed_statistics(warehouse_id)
    })
    .await
}

#[utoipa::path(
    get,
    path = "/warehouses/{id}/underutilized",
    params(("id" = u64, Path, description = "Warehouse id"), UnderutilizedQuery),
    responses(
        (status = 200, description = "Cells at or below the threshold, least occupied first", body = Vec<CellUtilization>),
        (status = NOT_FOUND, description = "Unknown warehouse", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Threshold outside 0..=100", body = ErrorResponse)
    ),
    tag = "analytics"
)]
async fn handle_underutilized(
    State(state): State<ApiState>,
    Path(warehouse_id): Path<WarehouseId>,
    Query(query): Query<UnderutilizedQuery>,
) -> Response {
    let threshold = query
        .max_occupancy
        .unwrap_or(state.config.occupancy_bands.mostly_empty_below);
    if !(0.0..=100.0).contains(&threshold) {
        return allocator_error(AllocatorError::InvalidRequest(format!(
            "max_occupancy must be between 0 and 100, got {}",
            threshold
        )));
    }
    run_blocking(StatusCode::OK, move || {
        state.analytics.underutilized_cells(warehouse_id, threshold)
    })
    .await
}

#[utoipa::path(
    get,
    path = "/cells/{id}",
    params(("id" = u64, Path, description = "Cell id")),
    responses(
        (status = 200, description = "Cell occupancy and records", body = CellInfo),
        (status = NOT_FOUND, description = "Unknown cell", body = ErrorResponse)
    ),
    tag = "analytics"
)]
async fn handle_cell_info(State(state): State<ApiState>, Path(cell_id): Path<CellId>) -> Response {
    run_blocking(StatusCode::OK, move || state.analytics.cell_info(cell_id)).await
}

#[utoipa::path(
    get,
    path = "/cells/{id}/capacity/{item_id}",
    params(
        ("id" = u64, Path, description = "Cell id"),
        ("item_id" = u64, Path, description = "Item id")
    ),
    responses(
        (status = 200, description = "Largest quantity the cell accepts now", body = CapacityResponse),
        (status = NOT_FOUND, description = "Unknown cell or item", body = ErrorResponse),
        (status = CONFLICT, description = "Storage class mismatch", body = ErrorResponse)
    ),
    tag = "analytics"
)]
async fn handle_cell_capacity(
    State(state): State<ApiState>,
    Path((cell_id, item_id)): Path<(CellId, ItemId)>,
) -> Response {
    run_blocking(StatusCode::OK, move || {
        let max_placeable = state.analytics.max_placeable(item_id, cell_id)?;
        Ok(CapacityResponse {
            cell_id,
            item_id,
            max_placeable,
        })
    })
    .await
}

#[utoipa::path(
    post,
    path = "/placements/optimal",
    request_body = QuantityRequest,
    responses(
        (status = 200, description = "Stock placed in the least occupied feasible cell", body = Placement),
        (status = CONFLICT, description = "No cell can take the quantity", body = ErrorResponse),
        (status = SERVICE_UNAVAILABLE, description = "Concurrent modification, retry", body = ErrorResponse)
    ),
    tag = "placement"
)]
async fn handle_place_optimal(
    State(state): State<ApiState>,
    payload: Result<Json<QuantityRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    run_blocking(StatusCode::OK, move || {
        state
            .placement
            .place_optimal(request.item_id, request.quantity)
    })
    .await
}

#[utoipa::path(
    post,
    path = "/placements/cell",
    request_body = CellPlacementRequest,
    responses(
        (status = 200, description = "Stock placed in the given cell", body = Placement),
        (status = NOT_FOUND, description = "Unknown cell or item", body = ErrorResponse),
        (status = CONFLICT, description = "Does not fit or wrong storage class", body = ErrorResponse)
    ),
    tag = "placement"
)]
async fn handle_place_in_cell(
    State(state): State<ApiState>,
    payload: Result<Json<CellPlacementRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    run_blocking(StatusCode::OK, move || {
        state.placement.place_in_cell(
            request.item_id,
            request.cell_id,
            request.quantity,
            request.orientation,
        )
    })
    .await
}

#[utoipa::path(
    post,
    path = "/placements/check",
    request_body = QuantityRequest,
    responses(
        (status = 200, description = "Cells that could take the quantity, least occupied first", body = Vec<CellCandidate>),
        (status = NOT_FOUND, description = "Unknown item", body = ErrorResponse)
    ),
    tag = "placement"
)]
async fn handle_check_placement(
    State(state): State<ApiState>,
    payload: Result<Json<QuantityRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    run_blocking(StatusCode::OK, move || {
        state
            .analytics
            .available_cells(request.item_id, request.quantity)
    })
    .await
}

#[utoipa::path(
    post,
    path = "/removals",
    request_body = RemovalRequest,
    responses(
        (status = 200, description = "Stock removed", body = Removal),
        (status = CONFLICT, description = "Cell holds fewer units", body = ErrorResponse)
    ),
    tag = "placement"
)]
async fn handle_remove(
    State(state): State<ApiState>,
    payload: Result<Json<RemovalRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    run_blocking(StatusCode::OK, move || {
        state
            .placement
            .remove_from_cell(request.item_id, request.cell_id, request.quantity)
    })
    .await
}

#[utoipa::path(
    post,
    path = "/moves",
    request_body = MoveRequest,
    responses(
        (status = 200, description = "Stock moved", body = Move),
        (status = CONFLICT, description = "Move rejected, source restored", body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Source could not be restored", body = ErrorResponse)
    ),
    tag = "placement"
)]
async fn handle_move(
    State(state): State<ApiState>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> Response {
    let request = match parse_json(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };
    run_blocking(StatusCode::OK, move || {
        state.placement.move_item(
            request.item_id,
            request.from_cell_id,
            request.to_cell_id,
            request.quantity,
        )
    })
    .await
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
