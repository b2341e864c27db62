pub mod inventory_history;
pub mod inventory_record;
pub mod order;
pub mod order_item;
pub mod product;

use sea_orm_migration::prelude::*;

pub struct Migrator;

impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(product::Migration),
            Box::new(inventory_record::Migration),
            Box::new(inventory_history::Migration),
            Box::new(order::Migration),
            Box::new(order_item::Migration),
        ]
    }
}
