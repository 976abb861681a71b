//! PostgreSQL implementation of the planning store

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::models::{
    Branch, ClientAddress, Dispatch, DispatchManifestLine, DispatchStatus, NewDispatch, Product,
    Quotation, QuotationItem, Truck, TruckType,
};
use shared::types::PostalAddress;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{DispatchTransaction, PlanningStore};
use crate::error::{AppError, AppResult};

/// Planning store backed by a connection pool
#[derive(Clone)]
pub struct PgPlanningStore {
    db: PgPool,
}

impl PgPlanningStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// One open planning transaction
pub struct PgDispatchTx {
    tx: Transaction<'static, Postgres>,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    sku: String,
    name: String,
    description: Option<String>,
    weight_kg: Decimal,
    length_cm: Decimal,
    width_cm: Decimal,
    height_cm: Decimal,
    price: Decimal,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            sku: row.sku,
            name: row.name,
            description: row.description,
            weight_kg: row.weight_kg,
            length_cm: row.length_cm,
            width_cm: row.width_cm,
            height_cm: row.height_cm,
            price: row.price,
        }
    }
}

#[derive(Debug, FromRow)]
struct AddressRow {
    id: Uuid,
    owner: String,
    street: String,
    commune: String,
    city: String,
    is_delivery: bool,
}

impl AddressRow {
    fn postal(&self) -> PostalAddress {
        PostalAddress::new(&self.street, &self.commune, &self.city)
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct DispatchRow {
    id: Uuid,
    quotation_id: Uuid,
    truck_id: Uuid,
    origin_branch_id: Uuid,
    destination_address_id: Uuid,
    scheduled_date: DateTime<Utc>,
    status: String,
    value: Decimal,
    distance: Option<String>,
    duration: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DispatchRow> for Dispatch {
    type Error = AppError;

    fn try_from(row: DispatchRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<DispatchStatus>()
            .map_err(|e| AppError::Internal(format!("Corrupt dispatch {}: {}", row.id, e)))?;

        Ok(Dispatch {
            id: row.id,
            quotation_id: row.quotation_id,
            truck_id: row.truck_id,
            origin_branch_id: row.origin_branch_id,
            destination_address_id: row.destination_address_id,
            scheduled_date: row.scheduled_date,
            status,
            value: row.value,
            distance: row.distance,
            duration: row.duration,
            created_at: row.created_at,
        })
    }
}

pub(crate) const DISPATCH_COLUMNS: &str = "id, quotation_id, truck_id, origin_branch_id, \
     destination_address_id, scheduled_date, status, value, distance, duration, created_at";

#[axum::async_trait]
impl PlanningStore for PgPlanningStore {
    async fn quotation(&self, quotation_id: Uuid) -> AppResult<Option<Quotation>> {
        let row = sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, client_rut, status FROM quotations WHERE id = $1",
        )
        .bind(quotation_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|(id, client_rut, status)| Quotation {
            id,
            client_rut,
            status,
        }))
    }

    async fn quotation_items(&self, quotation_id: Uuid) -> AppResult<Vec<QuotationItem>> {
        let rows = sqlx::query_as::<_, (Uuid, String, Uuid, i32)>(
            r#"
            SELECT quotation_id, sku, branch_id, quantity
            FROM quotation_items
            WHERE quotation_id = $1
            ORDER BY id
            "#,
        )
        .bind(quotation_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(quotation_id, sku, branch_id, quantity)| QuotationItem {
                quotation_id,
                sku,
                branch_id,
                quantity,
            })
            .collect())
    }

    async fn product(&self, sku: &str) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT sku, name, description, weight_kg, length_cm, width_cm, height_cm, price
            FROM products
            WHERE sku = $1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn truck_types(&self) -> AppResult<Vec<TruckType>> {
        let rows = sqlx::query_as::<_, (Uuid, String, Decimal, Decimal)>(
            r#"
            SELECT id, name, max_weight_kg, max_volume_m3
            FROM truck_types
            ORDER BY max_weight_kg ASC, max_volume_m3 ASC, id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, max_weight_kg, max_volume_m3)| TruckType {
                id,
                name,
                max_weight_kg,
                max_volume_m3,
            })
            .collect())
    }

    async fn delivery_address(&self, client_rut: &str) -> AppResult<Option<ClientAddress>> {
        let row = sqlx::query_as::<_, AddressRow>(
            r#"
            SELECT id, client_rut AS owner, street, commune, city, is_delivery
            FROM client_addresses
            WHERE client_rut = $1 AND is_delivery = true
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(client_rut)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| ClientAddress {
            id: r.id,
            address: r.postal(),
            is_delivery: r.is_delivery,
            client_rut: r.owner,
        }))
    }

    async fn branch(&self, branch_id: Uuid) -> AppResult<Option<Branch>> {
        let row = sqlx::query_as::<_, AddressRow>(
            r#"
            SELECT id, name AS owner, street, commune, city, false AS is_delivery
            FROM branches
            WHERE id = $1
            "#,
        )
        .bind(branch_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| Branch {
            id: r.id,
            address: r.postal(),
            name: r.owner,
        }))
    }

    async fn client_address(&self, address_id: Uuid) -> AppResult<Option<ClientAddress>> {
        let row = sqlx::query_as::<_, AddressRow>(
            r#"
            SELECT id, client_rut AS owner, street, commune, city, is_delivery
            FROM client_addresses
            WHERE id = $1
            "#,
        )
        .bind(address_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| ClientAddress {
            id: r.id,
            address: r.postal(),
            is_delivery: r.is_delivery,
            client_rut: r.owner,
        }))
    }

    async fn dispatch(&self, dispatch_id: Uuid) -> AppResult<Option<Dispatch>> {
        let row = sqlx::query_as::<_, DispatchRow>(&format!(
            "SELECT {} FROM dispatches WHERE id = $1",
            DISPATCH_COLUMNS
        ))
        .bind(dispatch_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Dispatch::try_from).transpose()
    }

    async fn set_dispatch_travel(
        &self,
        dispatch_id: Uuid,
        distance: &str,
        duration: &str,
    ) -> AppResult<u64> {
        let result = sqlx::query("UPDATE dispatches SET distance = $2, duration = $3 WHERE id = $1")
            .bind(dispatch_id)
            .bind(distance)
            .bind(duration)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn set_dispatch_status(
        &self,
        quotation_id: Uuid,
        status: DispatchStatus,
    ) -> AppResult<u64> {
        let result = sqlx::query("UPDATE dispatches SET status = $2 WHERE quotation_id = $1")
            .bind(quotation_id)
            .bind(status.as_str())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn begin(&self) -> AppResult<Box<dyn DispatchTransaction>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgDispatchTx { tx }))
    }
}

#[axum::async_trait]
impl DispatchTransaction for PgDispatchTx {
    async fn delete_dispatches_for_quotation(&mut self, quotation_id: Uuid) -> AppResult<u64> {
        // Manifest lines go with their dispatch through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM dispatches WHERE quotation_id = $1")
            .bind(quotation_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_active_truck(&mut self, truck_type_id: Uuid) -> AppResult<Option<Truck>> {
        let row = sqlx::query_as::<_, (Uuid, String, Uuid, bool)>(
            r#"
            SELECT id, license_plate, truck_type_id, active
            FROM trucks
            WHERE truck_type_id = $1 AND active = true
            ORDER BY license_plate ASC
            LIMIT 1
            "#,
        )
        .bind(truck_type_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|(id, license_plate, truck_type_id, active)| Truck {
            id,
            license_plate,
            truck_type_id,
            active,
        }))
    }

    async fn insert_dispatch(&mut self, dispatch: &NewDispatch) -> AppResult<Dispatch> {
        let row = sqlx::query_as::<_, DispatchRow>(&format!(
            r#"
            INSERT INTO dispatches (
                id, quotation_id, truck_id, origin_branch_id, destination_address_id,
                scheduled_date, status, value
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            DISPATCH_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(dispatch.quotation_id)
        .bind(dispatch.truck_id)
        .bind(dispatch.origin_branch_id)
        .bind(dispatch.destination_address_id)
        .bind(dispatch.scheduled_date)
        .bind(dispatch.status.as_str())
        .bind(dispatch.value)
        .fetch_one(&mut *self.tx)
        .await?;

        Dispatch::try_from(row)
    }

    async fn insert_manifest_line(&mut self, line: &DispatchManifestLine) -> AppResult<()> {
        sqlx::query("INSERT INTO dispatch_products (dispatch_id, sku, quantity) VALUES ($1, $2, $3)")
            .bind(line.dispatch_id)
            .bind(&line.sku)
            .bind(line.quantity)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn decrement_stock(
        &mut self,
        sku: &str,
        branch_id: Uuid,
        quantity: i32,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE stock_by_branch
            SET quantity = quantity - $3
            WHERE sku = $1 AND branch_id = $2 AND quantity >= $3
            "#,
        )
        .bind(sku)
        .bind(branch_id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
