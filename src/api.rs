use crate::config::HttpConfig;
use crate::store::{Recipe, RecipeStore};
use crate::uploads::UploadStore;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecipeStore>,
    pub uploads: Arc<UploadStore>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn store_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.to_string(),
            code: "STORE_ERROR".to_string(),
        }),
    )
}

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message,
            code: "BAD_REQUEST".to_string(),
        }),
    )
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    // Browser clients are served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let serve_uploads = ServeDir::new(state.uploads.dir());

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/:id", delete(delete_recipe))
        .nest_service(state.uploads.url_prefix(), serve_uploads)
        // No request size limit is applied at this layer
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "recipe-service"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(state.store.pool()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// List all recipes
#[instrument(skip(state))]
async fn list_recipes(State(state): State<AppState>) -> Result<Json<Vec<Recipe>>, ApiError> {
    let recipes = state.store.list().await.map_err(|e| {
        error!(error = %e, "Failed to fetch recipes");
        store_error("Failed to fetch recipes")
    })?;

    Ok(Json(recipes))
}

/// Create a recipe from a multipart form, storing the image if one was sent
#[instrument(skip(state, multipart))]
async fn create_recipe(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Recipe>, ApiError> {
    let form = RecipeForm::from_multipart(multipart).await?;

    let ingredients = form.parsed_ingredients().map_err(|e| {
        bad_request(format!("Invalid ingredients list: {}", e))
    })?;

    let image = match &form.image {
        Some(upload) => state
            .uploads
            .store(upload.file_name.as_deref(), &upload.data)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to store uploaded image");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Failed to store image".to_string(),
                        code: "UPLOAD_ERROR".to_string(),
                    }),
                )
            })?,
        None => String::new(),
    };

    let recipe = form.into_recipe(Utc::now().timestamp_millis(), ingredients, image);

    // A failed insert after a successful file write leaves the file orphaned;
    // no cleanup is attempted.
    let stored = state.store.insert(&recipe).await.map_err(|e| {
        error!(error = %e, "Failed to add recipe");
        store_error("Failed to add recipe")
    })?;

    Ok(Json(stored))
}

/// Delete a recipe by id
#[instrument(skip(state))]
async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = state.store.delete_by_id(id).await.map_err(|e| {
        error!(error = %e, "Failed to delete recipe");
        store_error("Failed to delete recipe")
    })?;

    if deleted {
        Ok(Json(serde_json::json!({ "message": "Recipe deleted" })))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Recipe not found".to_string(),
                code: "NOT_FOUND".to_string(),
            }),
        ))
    }
}

/// One uploaded file from the create form
#[derive(Debug)]
struct ImageUpload {
    file_name: Option<String>,
    data: Bytes,
}

/// Fields of the create-recipe multipart form
#[derive(Debug, Default)]
struct RecipeForm {
    name: Option<String>,
    ingredients: Option<String>,
    procedure: Option<String>,
    notes: Option<String>,
    image: Option<ImageUpload>,
}

impl RecipeForm {
    /// Drain a multipart stream into the known fields; unknown fields are
    /// ignored, at most one `image` file is kept.
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| bad_request(format!("Invalid multipart body: {}", e)))?
        {
            let field_name = field.name().map(str::to_string);
            match field_name.as_deref() {
                Some("name") => form.name = Some(read_text(field).await?),
                Some("ingredients") => form.ingredients = Some(read_text(field).await?),
                Some("procedure") => form.procedure = Some(read_text(field).await?),
                Some("notes") => form.notes = Some(read_text(field).await?),
                Some("image") => {
                    let file_name = field.file_name().map(str::to_string);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| bad_request(format!("Invalid image field: {}", e)))?;
                    form.image = Some(ImageUpload { file_name, data });
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Parse the JSON-encoded ingredients field; absent or blank means empty
    fn parsed_ingredients(&self) -> Result<Vec<String>, serde_json::Error> {
        match self.ingredients.as_deref() {
            None => Ok(Vec::new()),
            Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(raw),
        }
    }

    /// Build the record, applying the defaulting rules once at the boundary.
    /// Browsers send a blank `name` field rather than omitting it, so empty
    /// defaults the same way as absent.
    fn into_recipe(self, id: i64, ingredients: Vec<String>, image: String) -> Recipe {
        Recipe {
            id,
            name: self
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Unnamed Recipe".to_string()),
            ingredients,
            procedure: self.procedure.unwrap_or_default(),
            notes: self.notes.unwrap_or_default(),
            image,
        }
    }
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| bad_request(format!("Invalid form field: {}", e)))
}

/// Start the recipe API server
pub async fn start_server(state: AppState, config: &HttpConfig) -> Result<()> {
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting recipe API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use axum::body::Body;
    use axum::http::Request;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    /// State over a lazy pool with nothing listening; store calls fail, but
    /// routing, parsing, and the upload handler run for real.
    fn disconnected_state(upload_dir: &std::path::Path) -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://127.0.0.1:1/recipes")
            .unwrap();

        AppState {
            store: Arc::new(RecipeStore::from_pool(pool)),
            uploads: Arc::new(UploadStore::new(&UploadConfig {
                dir: upload_dir.to_path_buf(),
                url_prefix: "/uploads".to_string(),
            })),
        }
    }

    fn multipart_create_request(image: &[u8]) -> Request<Body> {
        let boundary = "recipe-form-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nBig\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; \
                 filename=\"big.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(image);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/recipes")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_large_upload_is_not_size_limited() {
        let tmp = tempfile::tempdir().unwrap();
        let router = create_router(disconnected_state(tmp.path()));

        // Over axum's default 2 MiB body limit
        let image = vec![0u8; 3 * 1024 * 1024];
        let response = router.oneshot(multipart_create_request(&image)).await.unwrap();

        // The body must get past multipart parsing; only the unreachable
        // store may fail
        assert_ne!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // The image was written before the insert was attempted
        let mut entries = std::fs::read_dir(tmp.path()).unwrap();
        let stored = entries.next().unwrap().unwrap();
        assert!(stored.file_name().to_string_lossy().ends_with("-big.jpg"));
        assert_eq!(stored.metadata().unwrap().len(), 3 * 1024 * 1024);
    }

    #[test]
    fn test_minimal_form_applies_defaults() {
        let form = RecipeForm::default();
        let ingredients = form.parsed_ingredients().unwrap();
        assert!(ingredients.is_empty());

        let recipe = form.into_recipe(1700000000000, ingredients, String::new());
        assert_eq!(recipe.name, "Unnamed Recipe");
        assert_eq!(recipe.procedure, "");
        assert_eq!(recipe.notes, "");
        assert_eq!(recipe.image, "");
        assert_eq!(recipe.id, 1700000000000);
    }

    #[test]
    fn test_blank_name_defaults() {
        let form = RecipeForm {
            name: Some(String::new()),
            ..Default::default()
        };

        let recipe = form.into_recipe(1, Vec::new(), String::new());
        assert_eq!(recipe.name, "Unnamed Recipe");
    }

    #[test]
    fn test_ingredients_preserve_order() {
        let form = RecipeForm {
            ingredients: Some(r#"["flour","sugar"]"#.to_string()),
            ..Default::default()
        };

        let ingredients = form.parsed_ingredients().unwrap();
        assert_eq!(ingredients, vec!["flour", "sugar"]);
    }

    #[test]
    fn test_blank_ingredients_default_to_empty() {
        let form = RecipeForm {
            ingredients: Some("   ".to_string()),
            ..Default::default()
        };

        assert!(form.parsed_ingredients().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_ingredients_rejected() {
        let form = RecipeForm {
            ingredients: Some("not json".to_string()),
            ..Default::default()
        };

        assert!(form.parsed_ingredients().is_err());
    }

    #[test]
    fn test_supplied_fields_kept() {
        let form = RecipeForm {
            name: Some("Pancakes".to_string()),
            procedure: Some("Mix and fry".to_string()),
            notes: Some("double the sugar".to_string()),
            ..Default::default()
        };

        let recipe = form.into_recipe(1, Vec::new(), "/uploads/1-p.jpg".to_string());
        assert_eq!(recipe.name, "Pancakes");
        assert_eq!(recipe.procedure, "Mix and fry");
        assert_eq!(recipe.notes, "double the sugar");
        assert_eq!(recipe.image, "/uploads/1-p.jpg");
    }
}
