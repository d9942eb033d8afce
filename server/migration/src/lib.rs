pub use sea_orm_migration::prelude::*;

mod m20260701_094500_create_task_table;
mod m20260708_101500_add_owner_event_date_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260701_094500_create_task_table::Migration),
            Box::new(m20260708_101500_add_owner_event_date_index::Migration),
        ]
    }
}
