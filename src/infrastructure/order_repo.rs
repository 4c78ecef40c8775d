use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    line_total, order_total, OrderLineInput, OrderLineView, OrderStatus, OrderView,
};
use crate::domain::ports::OrderRepository;
use crate::domain::stock::{StockEndpoint, StockInstruction, StockLine};
use crate::schema::{order_lines, orders, stock_outbox};

use super::models::{NewOrderLineRow, NewOrderRow, NewStockOutboxRow, OrderLineRow, OrderRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

// ── Transaction helpers ───────────────────────────────────────────────────────

fn order_row(conn: &mut PgConnection, id: Uuid) -> Result<OrderRow, DomainError> {
    orders::table
        .find(id)
        .select(OrderRow::as_select())
        .first(conn)
        .optional()?
        .ok_or(DomainError::NotFound)
}

fn lines_for(conn: &mut PgConnection, order_id: Uuid) -> Result<Vec<OrderLineRow>, DomainError> {
    Ok(order_lines::table
        .filter(order_lines::order_id.eq(order_id))
        .select(OrderLineRow::as_select())
        .load(conn)?)
}

/// The quantities an order currently holds reserved, as outbox payload lines.
fn reserved_stock(lines: &[OrderLineRow]) -> Vec<StockLine> {
    lines
        .iter()
        .map(|l| StockLine {
            product_id: l.product_id,
            stock: l.quantity,
        })
        .collect()
}

/// The quantities a submitted line set will reserve.
fn requested_stock(lines: &[OrderLineInput]) -> Vec<StockLine> {
    lines
        .iter()
        .map(|l| StockLine {
            product_id: l.product_id,
            stock: l.quantity,
        })
        .collect()
}

/// Append one outbox record inside the caller's transaction. A payload that
/// fails to serialize aborts the whole transaction.
fn append_outbox(
    conn: &mut PgConnection,
    instruction: &StockInstruction,
) -> Result<(), DomainError> {
    let payload = instruction.payload()?;
    diesel::insert_into(stock_outbox::table)
        .values(&NewStockOutboxRow {
            id: Uuid::new_v4(),
            payload,
            endpoint: instruction.endpoint.as_str().to_string(),
            sent: false,
        })
        .execute(conn)?;
    Ok(())
}

fn insert_lines(
    conn: &mut PgConnection,
    order_id: Uuid,
    lines: &[OrderLineInput],
) -> Result<(), DomainError> {
    let rows: Vec<NewOrderLineRow> = lines
        .iter()
        .map(|l| NewOrderLineRow {
            id: Uuid::new_v4(),
            order_id,
            product_id: l.product_id,
            product_name: l.product_name.clone(),
            quantity: l.quantity,
            unit_price: l.unit_price.clone(),
            total_price: line_total(l.quantity, &l.unit_price),
        })
        .collect();
    diesel::insert_into(order_lines::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

fn to_view(order: OrderRow, lines: Vec<OrderLineRow>) -> Result<OrderView, DomainError> {
    Ok(OrderView {
        id: order.id,
        delivery_date: order.delivery_date,
        status: order.status.parse()?,
        price: order.price,
        created_at: order.created_at,
        lines: lines
            .into_iter()
            .map(|l| OrderLineView {
                id: l.id,
                product_id: l.product_id,
                product_name: l.product_name,
                quantity: l.quantity,
                unit_price: l.unit_price,
                total_price: l.total_price,
            })
            .collect(),
    })
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl OrderRepository for DieselOrderRepository {
    fn list(&self) -> Result<Vec<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let order_rows = orders::table
            .select(OrderRow::as_select())
            .order(orders::created_at.desc())
            .load(&mut conn)?;

        let line_rows = OrderLineRow::belonging_to(&order_rows)
            .select(OrderLineRow::as_select())
            .load(&mut conn)?
            .grouped_by(&order_rows);

        order_rows
            .into_iter()
            .zip(line_rows)
            .map(|(order, lines)| to_view(order, lines))
            .collect()
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let order = orders::table
            .find(id)
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        let lines = lines_for(&mut conn, order.id)?;
        to_view(order, lines).map(Some)
    }

    fn create(
        &self,
        delivery_date: NaiveDate,
        lines: Vec<OrderLineInput>,
    ) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            // 1. Insert the order with its computed total.
            let order_id = Uuid::new_v4();
            diesel::insert_into(orders::table)
                .values(&NewOrderRow {
                    id: order_id,
                    delivery_date,
                    status: OrderStatus::ToDo.as_str().to_string(),
                    price: order_total(&lines),
                })
                .execute(conn)?;

            // 2. Insert the lines.
            insert_lines(conn, order_id, &lines)?;

            // 3. Reserve the new quantities.
            append_outbox(
                conn,
                &StockInstruction::new(StockEndpoint::ConsumeStock, requested_stock(&lines)),
            )?;

            let order = order_row(conn, order_id)?;
            let lines = lines_for(conn, order_id)?;
            to_view(order, lines)
        })
    }

    fn update(
        &self,
        id: Uuid,
        delivery_date: NaiveDate,
        lines: Vec<OrderLineInput>,
    ) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let order = order_row(conn, id)?;

            // 1. Give back the quantities held by the lines being replaced.
            let old_lines = lines_for(conn, order.id)?;
            append_outbox(
                conn,
                &StockInstruction::new(StockEndpoint::AddStock, reserved_stock(&old_lines)),
            )?;

            // 2. Replace the lines wholesale.
            diesel::delete(order_lines::table.filter(order_lines::order_id.eq(order.id)))
                .execute(conn)?;
            insert_lines(conn, order.id, &lines)?;

            // 3. Store the new delivery date and total.
            diesel::update(orders::table.find(order.id))
                .set((
                    orders::delivery_date.eq(delivery_date),
                    orders::price.eq(order_total(&lines)),
                    orders::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            // 4. Reserve the new quantities.
            append_outbox(
                conn,
                &StockInstruction::new(StockEndpoint::ConsumeStock, requested_stock(&lines)),
            )?;

            let order = order_row(conn, id)?;
            let lines = lines_for(conn, id)?;
            to_view(order, lines)
        })
    }

    fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let order = order_row(conn, id)?;

            // 1. Give back everything the order held reserved.
            let old_lines = lines_for(conn, order.id)?;
            append_outbox(
                conn,
                &StockInstruction::new(StockEndpoint::AddStock, reserved_stock(&old_lines)),
            )?;

            // 2. Retire the lines, then the order itself.
            diesel::delete(order_lines::table.filter(order_lines::order_id.eq(order.id)))
                .execute(conn)?;
            diesel::delete(orders::table.find(order.id)).execute(conn)?;

            Ok(())
        })
    }

    fn transition(&self, id: Uuid, target: OrderStatus) -> Result<OrderView, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            let order = order_row(conn, id)?;
            let current: OrderStatus = order.status.parse()?;

            // Guard and stock effect both come from the central table.
            let effect = current.transition_to(target)?;

            let lines = lines_for(conn, order.id)?;
            if let Some(endpoint) = effect {
                append_outbox(
                    conn,
                    &StockInstruction::new(endpoint, reserved_stock(&lines)),
                )?;
            }

            diesel::update(orders::table.find(order.id))
                .set((
                    orders::status.eq(target.as_str()),
                    orders::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            let order = order_row(conn, id)?;
            to_view(order, lines)
        })
    }
}
