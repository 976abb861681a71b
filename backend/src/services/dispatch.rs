//! Dispatch queries and maintenance: totals views, partial updates, deletes

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::Dispatch;
use shared::validation::validate_dispatch_value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::store::postgres::{DispatchRow, DISPATCH_COLUMNS};

/// Dispatch service for reading and editing planned dispatches
#[derive(Clone)]
pub struct DispatchService {
    db: PgPool,
}

/// A manifest line joined with its product
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ManifestProduct {
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub unit_weight_kg: Decimal,
    pub unit_price: Decimal,
}

impl ManifestProduct {
    pub fn line_weight_kg(&self) -> Decimal {
        self.unit_weight_kg * Decimal::from(self.quantity)
    }

    pub fn line_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Dispatch with its manifest and aggregate figures
#[derive(Debug, Clone, Serialize)]
pub struct DispatchWithTotals {
    #[serde(flatten)]
    pub dispatch: Dispatch,
    pub products: Vec<ManifestProduct>,
    pub item_count: i64,
    pub total_kg: Decimal,
    pub total_price: Decimal,
}

impl DispatchWithTotals {
    pub fn new(dispatch: Dispatch, products: Vec<ManifestProduct>) -> Self {
        let item_count = products.iter().map(|p| i64::from(p.quantity)).sum();
        let total_kg = products.iter().map(ManifestProduct::line_weight_kg).sum();
        let total_price = products.iter().map(ManifestProduct::line_price).sum();

        Self {
            dispatch,
            products,
            item_count,
            total_kg,
            total_price,
        }
    }
}

/// Input for updating a dispatch. Status changes go through the state
/// endpoint, so any field outside this list is rejected.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateDispatchInput {
    pub scheduled_date: Option<DateTime<Utc>>,
    pub value: Option<Decimal>,
    pub truck_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64))]
    pub distance: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub duration: Option<String>,
}

impl UpdateDispatchInput {
    pub fn is_empty(&self) -> bool {
        self.scheduled_date.is_none()
            && self.value.is_none()
            && self.truck_id.is_none()
            && self.distance.is_none()
            && self.duration.is_none()
    }

    /// Field-level checks shared by every caller
    pub fn check(&self) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::ValidationError(
                "at least one field must be provided".to_string(),
            ));
        }

        self.validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        if let Some(value) = self.value {
            validate_dispatch_value(value).map_err(|msg| AppError::Validation {
                field: "value".to_string(),
                message: msg.to_string(),
                message_es: "El valor del despacho no puede ser negativo".to_string(),
            })?;
        }

        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct ManifestRow {
    dispatch_id: Uuid,
    sku: String,
    name: String,
    quantity: i32,
    unit_weight_kg: Decimal,
    unit_price: Decimal,
}

impl DispatchService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Every dispatch, oldest first
    pub async fn list_dispatches(&self) -> AppResult<Vec<DispatchWithTotals>> {
        let rows = sqlx::query_as::<_, DispatchRow>(&format!(
            "SELECT {} FROM dispatches ORDER BY created_at ASC, id ASC",
            DISPATCH_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        self.with_totals(rows).await
    }

    /// Dispatches of one quotation
    pub async fn list_by_quotation(&self, quotation_id: Uuid) -> AppResult<Vec<DispatchWithTotals>> {
        let rows = sqlx::query_as::<_, DispatchRow>(&format!(
            "SELECT {} FROM dispatches WHERE quotation_id = $1 ORDER BY created_at ASC, id ASC",
            DISPATCH_COLUMNS
        ))
        .bind(quotation_id)
        .fetch_all(&self.db)
        .await?;

        self.with_totals(rows).await
    }

    pub async fn get_dispatch(&self, dispatch_id: Uuid) -> AppResult<DispatchWithTotals> {
        let row = sqlx::query_as::<_, DispatchRow>(&format!(
            "SELECT {} FROM dispatches WHERE id = $1",
            DISPATCH_COLUMNS
        ))
        .bind(dispatch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Dispatch {}", dispatch_id)))?;

        self.with_totals(vec![row])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Dispatch {}", dispatch_id)))
    }

    /// Apply a partial update
    pub async fn update_dispatch(
        &self,
        dispatch_id: Uuid,
        input: UpdateDispatchInput,
    ) -> AppResult<DispatchWithTotals> {
        input.check()?;

        if let Some(truck_id) = input.truck_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM trucks WHERE id = $1)",
            )
            .bind(truck_id)
            .fetch_one(&self.db)
            .await?;

            if !exists {
                return Err(AppError::NotFound(format!("Truck {}", truck_id)));
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE dispatches SET
                scheduled_date = COALESCE($2, scheduled_date),
                value = COALESCE($3, value),
                truck_id = COALESCE($4, truck_id),
                distance = COALESCE($5, distance),
                duration = COALESCE($6, duration)
            WHERE id = $1
            "#,
        )
        .bind(dispatch_id)
        .bind(input.scheduled_date)
        .bind(input.value)
        .bind(input.truck_id)
        .bind(&input.distance)
        .bind(&input.duration)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Dispatch {}", dispatch_id)));
        }

        tracing::info!(%dispatch_id, "Dispatch updated");
        self.get_dispatch(dispatch_id).await
    }

    /// Delete a dispatch; its manifest goes with it
    pub async fn delete_dispatch(&self, dispatch_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM dispatches WHERE id = $1")
            .bind(dispatch_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Dispatch {}", dispatch_id)));
        }

        tracing::info!(%dispatch_id, "Dispatch deleted");
        Ok(())
    }

    async fn with_totals(&self, rows: Vec<DispatchRow>) -> AppResult<Vec<DispatchWithTotals>> {
        let dispatches = rows
            .into_iter()
            .map(Dispatch::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        if dispatches.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = dispatches.iter().map(|d| d.id).collect();
        let lines = sqlx::query_as::<_, ManifestRow>(
            r#"
            SELECT dp.dispatch_id, dp.sku, p.name, dp.quantity,
                   p.weight_kg AS unit_weight_kg, p.price AS unit_price
            FROM dispatch_products dp
            JOIN products p ON p.sku = dp.sku
            WHERE dp.dispatch_id = ANY($1)
            ORDER BY dp.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_dispatch: HashMap<Uuid, Vec<ManifestProduct>> = HashMap::new();
        for line in lines {
            by_dispatch
                .entry(line.dispatch_id)
                .or_default()
                .push(ManifestProduct {
                    sku: line.sku,
                    name: line.name,
                    quantity: line.quantity,
                    unit_weight_kg: line.unit_weight_kg,
                    unit_price: line.unit_price,
                });
        }

        Ok(dispatches
            .into_iter()
            .map(|dispatch| {
                let products = by_dispatch.remove(&dispatch.id).unwrap_or_default();
                DispatchWithTotals::new(dispatch, products)
            })
            .collect())
    }
}
