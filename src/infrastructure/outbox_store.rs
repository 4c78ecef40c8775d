use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::OutboxStore;
use crate::domain::stock::StockAdjustment;
use crate::schema::stock_outbox;

use super::models::StockOutboxRow;

pub struct DieselOutboxStore {
    pool: DbPool,
}

impl DieselOutboxStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl OutboxStore for DieselOutboxStore {
    fn find_unsent(&self) -> Result<Vec<StockAdjustment>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = stock_outbox::table
            .filter(stock_outbox::sent.eq(false))
            .order(stock_outbox::created_at.asc())
            .select(StockOutboxRow::as_select())
            .load(&mut conn)?;

        rows.into_iter()
            .map(|row| {
                Ok(StockAdjustment {
                    id: row.id,
                    endpoint: row.endpoint.parse()?,
                    payload: row.payload,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    fn mark_sent(&self, id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        // A plain flag flip keeps this idempotent: re-marking an already-sent
        // record (or one pruned in the meantime) touches zero rows.
        diesel::update(stock_outbox::table.find(id))
            .set(stock_outbox::sent.eq(true))
            .execute(&mut conn)?;

        Ok(())
    }
}
