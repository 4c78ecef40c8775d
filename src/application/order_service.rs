use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{OrderLineInput, OrderStatus, OrderView};
use crate::domain::ports::OrderRepository;

/// Facade over the repository port, one method per lifecycle operation.
///
/// Takes its persistence collaborator by explicit construction; the guarded
/// transitions all funnel through `OrderRepository::transition` so the guard
/// logic stays in one place.
pub struct OrderService<R> {
    repo: R,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn list_orders(&self) -> Result<Vec<OrderView>, DomainError> {
        self.repo.list()
    }

    pub fn get_order(&self, id: Uuid) -> Result<OrderView, DomainError> {
        self.repo.find_by_id(id)?.ok_or(DomainError::NotFound)
    }

    pub fn create_order(
        &self,
        delivery_date: NaiveDate,
        lines: Vec<OrderLineInput>,
    ) -> Result<OrderView, DomainError> {
        self.repo.create(delivery_date, lines)
    }

    pub fn update_order(
        &self,
        id: Uuid,
        delivery_date: NaiveDate,
        lines: Vec<OrderLineInput>,
    ) -> Result<OrderView, DomainError> {
        self.repo.update(id, delivery_date, lines)
    }

    pub fn delete_order(&self, id: Uuid) -> Result<(), DomainError> {
        self.repo.delete(id)
    }

    pub fn mark_to_do(&self, id: Uuid) -> Result<OrderView, DomainError> {
        self.repo.transition(id, OrderStatus::ToDo)
    }

    pub fn mark_in_progress(&self, id: Uuid) -> Result<OrderView, DomainError> {
        self.repo.transition(id, OrderStatus::InProgress)
    }

    pub fn mark_prepared(&self, id: Uuid) -> Result<OrderView, DomainError> {
        self.repo.transition(id, OrderStatus::Prepared)
    }

    pub fn mark_delivered(&self, id: Uuid) -> Result<OrderView, DomainError> {
        self.repo.transition(id, OrderStatus::Delivered)
    }

    pub fn mark_cancelled(&self, id: Uuid) -> Result<OrderView, DomainError> {
        self.repo.transition(id, OrderStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bigdecimal::BigDecimal;
    use chrono::Utc;

    use super::*;

    /// Records the transitions requested of it and answers with a fixed view.
    struct StubRepo {
        transitions: Mutex<Vec<OrderStatus>>,
    }

    impl StubRepo {
        fn new() -> Self {
            Self {
                transitions: Mutex::new(Vec::new()),
            }
        }

        fn view(status: OrderStatus) -> OrderView {
            OrderView {
                id: Uuid::new_v4(),
                delivery_date: NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(),
                status,
                price: BigDecimal::from(0),
                created_at: Utc::now(),
                lines: vec![],
            }
        }
    }

    impl OrderRepository for StubRepo {
        fn list(&self) -> Result<Vec<OrderView>, DomainError> {
            Ok(vec![])
        }

        fn find_by_id(&self, _id: Uuid) -> Result<Option<OrderView>, DomainError> {
            Ok(None)
        }

        fn create(
            &self,
            _delivery_date: NaiveDate,
            _lines: Vec<OrderLineInput>,
        ) -> Result<OrderView, DomainError> {
            Ok(Self::view(OrderStatus::ToDo))
        }

        fn update(
            &self,
            _id: Uuid,
            _delivery_date: NaiveDate,
            _lines: Vec<OrderLineInput>,
        ) -> Result<OrderView, DomainError> {
            Err(DomainError::NotFound)
        }

        fn delete(&self, _id: Uuid) -> Result<(), DomainError> {
            Ok(())
        }

        fn transition(&self, _id: Uuid, target: OrderStatus) -> Result<OrderView, DomainError> {
            self.transitions.lock().unwrap().push(target);
            Ok(Self::view(target))
        }
    }

    #[test]
    fn get_order_maps_missing_order_to_not_found() {
        let service = OrderService::new(StubRepo::new());

        let result = service.get_order(Uuid::new_v4());

        assert!(matches!(result, Err(DomainError::NotFound)));
    }

    #[test]
    fn mark_operations_request_their_target_status() {
        let service = OrderService::new(StubRepo::new());
        let id = Uuid::new_v4();

        service.mark_in_progress(id).unwrap();
        service.mark_prepared(id).unwrap();
        service.mark_delivered(id).unwrap();
        service.mark_cancelled(id).unwrap();
        service.mark_to_do(id).unwrap();

        let transitions = service.repo.transitions.lock().unwrap();
        assert_eq!(
            *transitions,
            vec![
                OrderStatus::InProgress,
                OrderStatus::Prepared,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
                OrderStatus::ToDo,
            ]
        );
    }
}
