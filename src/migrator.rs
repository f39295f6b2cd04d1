use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_reference_tables::Migration),
            Box::new(m20240101_000002_create_auth_tables::Migration),
            Box::new(m20240101_000003_create_materials_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_reference_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_reference_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Currencies::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Currencies::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Currencies::Name)
                                .string_len(3)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Currencies::Symbol).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Partners::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Partners::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Partners::Name).string().not_null())
                        .col(ColumnDef::new(Partners::Email).string().null())
                        .col(ColumnDef::new(Partners::Phone).string().null())
                        .col(
                            ColumnDef::new(Partners::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Currencies every deployment can rely on
            let seed = Query::insert()
                .into_table(Currencies::Table)
                .columns([Currencies::Name, Currencies::Symbol])
                .values_panic(["USD".into(), "$".into()])
                .values_panic(["EUR".into(), "€".into()])
                .values_panic(["IDR".into(), "Rp".into()])
                .on_conflict(OnConflict::column(Currencies::Name).do_nothing().to_owned())
                .to_owned();
            manager.exec_stmt(seed).await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Partners::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Currencies::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Currencies {
        Table,
        Id,
        Name,
        Symbol,
    }

    #[derive(DeriveIden)]
    pub enum Partners {
        Table,
        Id,
        Name,
        Email,
        Phone,
        CreatedAt,
    }
}

mod m20240101_000002_create_auth_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_auth_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Users::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Users::Login).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).text().not_null())
                        .col(
                            ColumnDef::new(Users::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ApiKeys::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ApiKeys::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ApiKeys::Name).string().not_null())
                        .col(ColumnDef::new(ApiKeys::UserId).integer().not_null())
                        .col(ColumnDef::new(ApiKeys::Scope).string().null())
                        .col(ColumnDef::new(ApiKeys::KeyIndex).string_len(8).not_null())
                        .col(ColumnDef::new(ApiKeys::KeyHash).text().not_null())
                        .col(
                            ColumnDef::new(ApiKeys::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ApiKeys::ExpiresAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ApiKeys::LastUsedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_api_keys_user_id")
                                .from(ApiKeys::Table, ApiKeys::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_api_keys_key_index")
                        .table(ApiKeys::Table)
                        .col(ApiKeys::KeyIndex)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ApiKeys::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Users {
        Table,
        Id,
        Login,
        Name,
        PasswordHash,
        Active,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ApiKeys {
        Table,
        Id,
        Name,
        UserId,
        Scope,
        KeyIndex,
        KeyHash,
        CreatedAt,
        ExpiresAt,
        LastUsedAt,
    }
}

mod m20240101_000003_create_materials_table {

    use super::m20240101_000001_create_reference_tables::{Currencies, Partners};
    use super::m20240101_000002_create_auth_tables::Users;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_materials_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Materials::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Materials::MaterialCode).string().not_null())
                        .col(ColumnDef::new(Materials::Name).string().not_null())
                        .col(
                            ColumnDef::new(Materials::MaterialType)
                                .string_len(16)
                                .not_null()
                                .default("fabric"),
                        )
                        .col(ColumnDef::new(Materials::CurrencyId).integer().null())
                        .col(
                            ColumnDef::new(Materials::MaterialBuyPrice)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Materials::PartnerId).integer().not_null())
                        .col(
                            ColumnDef::new(Materials::CreateDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Materials::WriteDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Materials::CreateUid).integer().null())
                        .col(ColumnDef::new(Materials::WriteUid).integer().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_materials_partner_id")
                                .from(Materials::Table, Materials::PartnerId)
                                .to(Partners::Table, Partners::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_materials_currency_id")
                                .from(Materials::Table, Materials::CurrencyId)
                                .to(Currencies::Table, Currencies::Id)
                                .on_delete(ForeignKeyAction::SetNull)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_materials_create_uid")
                                .from(Materials::Table, Materials::CreateUid)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_materials_write_uid")
                                .from(Materials::Table, Materials::WriteUid)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_materials_material_code")
                        .table(Materials::Table)
                        .col(Materials::MaterialCode)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_materials_material_type")
                        .table(Materials::Table)
                        .col(Materials::MaterialType)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        Id,
        MaterialCode,
        Name,
        MaterialType,
        CurrencyId,
        MaterialBuyPrice,
        PartnerId,
        CreateDate,
        WriteDate,
        CreateUid,
        WriteUid,
    }
}
