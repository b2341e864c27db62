pub mod inventory_history;
pub mod inventory_record;
pub mod order;
pub mod order_item;
pub mod product;

pub use inventory_history::Entity as InventoryHistory;
pub use inventory_history::Model as HistoryEntry;
pub use inventory_record::Entity as InventoryRecords;
pub use inventory_record::Model as InventoryRecord;
pub use order::Entity as Orders;
pub use order::Model as Order;
pub use order_item::Entity as OrderItems;
pub use order_item::Model as OrderItem;
pub use product::Entity as Products;
pub use product::Model as Product;
