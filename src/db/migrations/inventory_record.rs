use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InventoryRecords::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(InventoryRecords::ProductId).integer().not_null())
                    .col(
                        ColumnDef::new(InventoryRecords::Variant)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::StockQuantity)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::ReservedQuantity)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::AvailableQuantity)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::InventoryStatus)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::LowStockThreshold)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InventoryRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(InventoryRecords::ProductId)
                            .col(InventoryRecords::Variant),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-inventory_records-product_id")
                            .from(InventoryRecords::Table, InventoryRecords::ProductId)
                            .to(super::product::Products::Table, super::product::Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InventoryRecords::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
pub enum InventoryRecords {
    Table,
    ProductId,
    Variant,
    StockQuantity,
    ReservedQuantity,
    AvailableQuantity,
    InventoryStatus,
    LowStockThreshold,
    UpdatedAt,
}
