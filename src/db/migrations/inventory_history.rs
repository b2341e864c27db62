use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // No foreign key to products: the audit trail outlives whatever it describes.
        manager
            .create_table(
                Table::create()
                    .table(InventoryHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InventoryHistory::ProductId).integer().not_null())
                    .col(ColumnDef::new(InventoryHistory::Variant).string().not_null())
                    .col(
                        ColumnDef::new(InventoryHistory::Date)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryHistory::Kind).string_len(16).not_null())
                    .col(ColumnDef::new(InventoryHistory::Quantity).big_integer().not_null())
                    .col(
                        ColumnDef::new(InventoryHistory::PreviousQuantity)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryHistory::NewQuantity).big_integer().not_null())
                    .col(ColumnDef::new(InventoryHistory::Reason).string().not_null())
                    .col(ColumnDef::new(InventoryHistory::Reference).string().null())
                    .col(ColumnDef::new(InventoryHistory::PerformedBy).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-inventory_history-product")
                    .table(InventoryHistory::Table)
                    .col(InventoryHistory::ProductId)
                    .col(InventoryHistory::Variant)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InventoryHistory::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum InventoryHistory {
    Table,
    Id,
    ProductId,
    Variant,
    Date,
    Kind,
    Quantity,
    PreviousQuantity,
    NewQuantity,
    Reason,
    Reference,
    PerformedBy,
}
