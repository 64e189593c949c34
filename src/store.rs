use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Stored recipe record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    /// Creation timestamp in milliseconds since epoch, assigned once by the
    /// service. Expected unique but not enforced by a constraint.
    pub id: i64,
    /// Recipe name
    pub name: String,
    /// Ordered free-form ingredient entries
    #[sqlx(json)]
    pub ingredients: Vec<String>,
    /// Preparation steps
    pub procedure: String,
    /// Free-form notes
    pub notes: String,
    /// URL path of the uploaded image, empty when none was supplied
    pub image: String,
}

/// Recipe store backed by PostgreSQL
pub struct RecipeStore {
    pool: PgPool,
}

impl RecipeStore {
    /// Create a new recipe store with connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!("Connected to PostgreSQL database");

        Ok(Self { pool })
    }

    /// Create a store over an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed");
        Ok(())
    }

    /// List all recipes in store-native order
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Recipe>> {
        let recipes = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, name, ingredients, "procedure", notes, image
            FROM recipes
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list recipes")?;

        Ok(recipes)
    }

    /// Insert a recipe and return the stored record
    #[instrument(skip(self, recipe), fields(id = recipe.id, name = %recipe.name))]
    pub async fn insert(&self, recipe: &Recipe) -> Result<Recipe> {
        let stored = sqlx::query_as::<_, Recipe>(
            r#"
            INSERT INTO recipes (id, name, ingredients, "procedure", notes, image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, ingredients, "procedure", notes, image
            "#,
        )
        .bind(recipe.id)
        .bind(&recipe.name)
        .bind(Json(&recipe.ingredients))
        .bind(&recipe.procedure)
        .bind(&recipe.notes)
        .bind(&recipe.image)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert recipe")?;

        debug!(id = stored.id, "Recipe stored");

        metrics::counter!("recipes.created").increment(1);

        Ok(stored)
    }

    /// Delete the recipe with the given id, returning whether a record was
    /// removed. Duplicate ids are not prevented by any constraint; at most one
    /// row is removed per call.
    #[instrument(skip(self))]
    pub async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM recipes
            WHERE ctid IN (SELECT ctid FROM recipes WHERE id = $1 LIMIT 1)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to delete recipe")?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            metrics::counter!("recipes.deleted").increment(1);
        }

        Ok(deleted)
    }

    /// Get the connection pool (for readiness checks)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
