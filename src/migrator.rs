use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_merchants_table::Migration),
            Box::new(m20240301_000002_create_funnels_table::Migration),
            Box::new(m20240301_000003_create_affiliates_table::Migration),
            Box::new(m20240301_000004_create_provider_credentials_table::Migration),
            Box::new(m20240301_000005_create_orders_table::Migration),
            Box::new(m20240301_000006_create_contacts_table::Migration),
            Box::new(m20240301_000007_create_visits_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_merchants_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_merchants_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Merchants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Merchants::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Merchants::Name).string().not_null())
                        .col(ColumnDef::new(Merchants::ApiKey).string().not_null())
                        .col(ColumnDef::new(Merchants::NotifyUrl).string().null())
                        .col(ColumnDef::new(Merchants::NotifyToken).string().null())
                        .col(ColumnDef::new(Merchants::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_merchants_api_key")
                        .table(Merchants::Table)
                        .col(Merchants::ApiKey)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Merchants::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Merchants {
        Table,
        Id,
        Name,
        ApiKey,
        NotifyUrl,
        NotifyToken,
        CreatedAt,
    }
}

mod m20240301_000002_create_funnels_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_funnels_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Funnels::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Funnels::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Funnels::MerchantId).uuid().not_null())
                        .col(ColumnDef::new(Funnels::Name).string().not_null())
                        .col(ColumnDef::new(Funnels::LaunchedAt).timestamp().null())
                        .col(ColumnDef::new(Funnels::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_funnels_merchant_id")
                        .table(Funnels::Table)
                        .col(Funnels::MerchantId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Funnels::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Funnels {
        Table,
        Id,
        MerchantId,
        Name,
        LaunchedAt,
        CreatedAt,
    }
}

mod m20240301_000003_create_affiliates_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_affiliates_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Affiliates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Affiliates::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Affiliates::Code).string().not_null())
                        .col(ColumnDef::new(Affiliates::DisplayName).string().not_null())
                        .col(
                            ColumnDef::new(Affiliates::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_affiliates_code")
                        .table(Affiliates::Table)
                        .col(Affiliates::Code)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Affiliates::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Affiliates {
        Table,
        Id,
        Code,
        DisplayName,
        CreatedAt,
    }
}

mod m20240301_000004_create_provider_credentials_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_provider_credentials_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProviderCredentials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProviderCredentials::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProviderCredentials::MerchantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProviderCredentials::Provider)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProviderCredentials::ApiKey)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProviderCredentials::ApiSecret)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProviderCredentials::WebhookSecret)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProviderCredentials::EndpointOverride)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProviderCredentials::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One credentials row per (merchant, provider)
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_provider_credentials_merchant_provider")
                        .table(ProviderCredentials::Table)
                        .col(ProviderCredentials::MerchantId)
                        .col(ProviderCredentials::Provider)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProviderCredentials::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum ProviderCredentials {
        Table,
        Id,
        MerchantId,
        Provider,
        ApiKey,
        ApiSecret,
        WebhookSecret,
        EndpointOverride,
        CreatedAt,
    }
}

mod m20240301_000005_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::FunnelId).uuid().null())
                        .col(ColumnDef::new(Orders::MerchantId).uuid().not_null())
                        .col(ColumnDef::new(Orders::AffiliateId).uuid().null())
                        .col(ColumnDef::new(Orders::Provider).string().not_null())
                        .col(
                            ColumnDef::new(Orders::ExternalReference)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Amount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Currency).string().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::FailureReason).string().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            // The idempotency key: concurrent duplicate deliveries race on this
            // unique index and only one insert can win.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_external_reference")
                        .table(Orders::Table)
                        .col(Orders::ExternalReference)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_merchant_created_at")
                        .table(Orders::Table)
                        .col(Orders::MerchantId)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        FunnelId,
        MerchantId,
        AffiliateId,
        Provider,
        ExternalReference,
        Amount,
        Currency,
        Status,
        FailureReason,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000006_create_contacts_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_contacts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Contacts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Contacts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Contacts::MerchantId).uuid().not_null())
                        .col(ColumnDef::new(Contacts::FunnelId).uuid().not_null())
                        .col(ColumnDef::new(Contacts::AffiliateId).uuid().null())
                        .col(ColumnDef::new(Contacts::OrderId).uuid().null())
                        .col(ColumnDef::new(Contacts::Email).string().null())
                        .col(ColumnDef::new(Contacts::Name).string().null())
                        .col(ColumnDef::new(Contacts::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_contacts_merchant_created_at")
                        .table(Contacts::Table)
                        .col(Contacts::MerchantId)
                        .col(Contacts::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Contacts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Contacts {
        Table,
        Id,
        MerchantId,
        FunnelId,
        AffiliateId,
        OrderId,
        Email,
        Name,
        CreatedAt,
    }
}

mod m20240301_000007_create_visits_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_visits_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Visits::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Visits::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Visits::VisitorId).string().not_null())
                        .col(ColumnDef::new(Visits::SessionId).string().not_null())
                        .col(ColumnDef::new(Visits::FunnelId).uuid().not_null())
                        .col(ColumnDef::new(Visits::FunnelStepId).uuid().null())
                        .col(ColumnDef::new(Visits::UserAgent).string().not_null())
                        .col(ColumnDef::new(Visits::Referrer).string().null())
                        .col(ColumnDef::new(Visits::SourceType).string().not_null())
                        .col(ColumnDef::new(Visits::DeviceType).string().not_null())
                        .col(ColumnDef::new(Visits::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_visits_funnel_created_at")
                        .table(Visits::Table)
                        .col(Visits::FunnelId)
                        .col(Visits::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_visits_visitor_id")
                        .table(Visits::Table)
                        .col(Visits::VisitorId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Visits::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Visits {
        Table,
        Id,
        VisitorId,
        SessionId,
        FunnelId,
        FunnelStepId,
        UserAgent,
        Referrer,
        SourceType,
        DeviceType,
        CreatedAt,
    }
}
