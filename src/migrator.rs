use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_organisation_tables::Migration),
            Box::new(m20240301_000002_create_box_table::Migration),
            Box::new(m20240301_000003_create_transfer_agreement_tables::Migration),
            Box::new(m20240301_000004_create_shipment_tables::Migration),
        ]
    }
}

mod m20240301_000001_create_organisation_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_organisation_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Organisation::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Organisation::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Organisation::Name).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Base::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Base::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Base::Name).string().not_null())
                        .col(ColumnDef::new(Base::OrganisationId).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_base_organisation_id")
                                .from(Base::Table, Base::OrganisationId)
                                .to(Organisation::Table, Organisation::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_base_organisation_id")
                        .table(Base::Table)
                        .col(Base::OrganisationId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Location::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Location::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Location::Name).string().not_null())
                        .col(ColumnDef::new(Location::BaseId).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_location_base_id")
                                .from(Location::Table, Location::BaseId)
                                .to(Base::Table, Base::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Location::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Base::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Organisation::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Organisation {
        Table,
        Id,
        Name,
    }

    #[derive(DeriveIden)]
    pub(super) enum Base {
        Table,
        Id,
        Name,
        OrganisationId,
    }

    #[derive(DeriveIden)]
    pub(super) enum Location {
        Table,
        Id,
        Name,
        BaseId,
    }
}

mod m20240301_000002_create_box_table {
    use super::m20240301_000001_create_organisation_tables::Location;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_box_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Boxes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Boxes::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Boxes::LabelIdentifier)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Boxes::LocationId).integer().not_null())
                        .col(
                            ColumnDef::new(Boxes::State)
                                .string()
                                .not_null()
                                .default("InStock"),
                        )
                        .col(
                            ColumnDef::new(Boxes::LastModifiedOn)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_box_location_id")
                                .from(Boxes::Table, Boxes::LocationId)
                                .to(Location::Table, Location::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_box_location_id")
                        .table(Boxes::Table)
                        .col(Boxes::LocationId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Boxes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Boxes {
        #[sea_orm(iden = "box")]
        Table,
        Id,
        LabelIdentifier,
        LocationId,
        State,
        LastModifiedOn,
    }
}

mod m20240301_000003_create_transfer_agreement_tables {
    use super::m20240301_000001_create_organisation_tables::{Base, Organisation};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_transfer_agreement_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(TransferAgreement::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransferAgreement::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(TransferAgreement::SourceOrganisationId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferAgreement::TargetOrganisationId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransferAgreement::Type).string().not_null())
                        .col(ColumnDef::new(TransferAgreement::State).string().not_null())
                        .col(
                            ColumnDef::new(TransferAgreement::ValidFrom)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferAgreement::ValidUntil)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(TransferAgreement::RequestedBy)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferAgreement::RequestedOn)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransferAgreement::AcceptedBy).integer().null())
                        .col(
                            ColumnDef::new(TransferAgreement::AcceptedOn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(TransferAgreement::TerminatedBy)
                                .integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(TransferAgreement::TerminatedOn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(TransferAgreement::Comment).text().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_agreement_source_organisation_id")
                                .from(
                                    TransferAgreement::Table,
                                    TransferAgreement::SourceOrganisationId,
                                )
                                .to(Organisation::Table, Organisation::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_agreement_target_organisation_id")
                                .from(
                                    TransferAgreement::Table,
                                    TransferAgreement::TargetOrganisationId,
                                )
                                .to(Organisation::Table, Organisation::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transfer_agreement_source_organisation_id")
                        .table(TransferAgreement::Table)
                        .col(TransferAgreement::SourceOrganisationId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transfer_agreement_target_organisation_id")
                        .table(TransferAgreement::Table)
                        .col(TransferAgreement::TargetOrganisationId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransferAgreementDetail::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransferAgreementDetail::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(TransferAgreementDetail::TransferAgreementId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferAgreementDetail::SourceBaseId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransferAgreementDetail::TargetBaseId)
                                .integer()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_agreement_detail_agreement_id")
                                .from(
                                    TransferAgreementDetail::Table,
                                    TransferAgreementDetail::TransferAgreementId,
                                )
                                .to(TransferAgreement::Table, TransferAgreement::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_agreement_detail_source_base_id")
                                .from(
                                    TransferAgreementDetail::Table,
                                    TransferAgreementDetail::SourceBaseId,
                                )
                                .to(Base::Table, Base::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transfer_agreement_detail_target_base_id")
                                .from(
                                    TransferAgreementDetail::Table,
                                    TransferAgreementDetail::TargetBaseId,
                                )
                                .to(Base::Table, Base::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_transfer_agreement_detail_agreement_id")
                        .table(TransferAgreementDetail::Table)
                        .col(TransferAgreementDetail::TransferAgreementId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(TransferAgreementDetail::Table)
                        .to_owned(),
                )
                .await?;
            manager
                .drop_table(Table::drop().table(TransferAgreement::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum TransferAgreement {
        Table,
        Id,
        SourceOrganisationId,
        TargetOrganisationId,
        Type,
        State,
        ValidFrom,
        ValidUntil,
        RequestedBy,
        RequestedOn,
        AcceptedBy,
        AcceptedOn,
        TerminatedBy,
        TerminatedOn,
        Comment,
    }

    #[derive(DeriveIden)]
    enum TransferAgreementDetail {
        Table,
        Id,
        TransferAgreementId,
        SourceBaseId,
        TargetBaseId,
    }
}

mod m20240301_000004_create_shipment_tables {
    use super::m20240301_000001_create_organisation_tables::{Base, Location};
    use super::m20240301_000002_create_box_table::Boxes;
    use super::m20240301_000003_create_transfer_agreement_tables::TransferAgreement;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_shipment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Shipment::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Shipment::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Shipment::SourceBaseId).integer().not_null())
                        .col(ColumnDef::new(Shipment::TargetBaseId).integer().not_null())
                        .col(
                            ColumnDef::new(Shipment::TransferAgreementId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Shipment::State).string().not_null())
                        .col(ColumnDef::new(Shipment::StartedBy).integer().not_null())
                        .col(
                            ColumnDef::new(Shipment::StartedOn)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Shipment::SentBy).integer().null())
                        .col(
                            ColumnDef::new(Shipment::SentOn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Shipment::CanceledBy).integer().null())
                        .col(
                            ColumnDef::new(Shipment::CanceledOn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Shipment::CompletedBy).integer().null())
                        .col(
                            ColumnDef::new(Shipment::CompletedOn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_source_base_id")
                                .from(Shipment::Table, Shipment::SourceBaseId)
                                .to(Base::Table, Base::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_target_base_id")
                                .from(Shipment::Table, Shipment::TargetBaseId)
                                .to(Base::Table, Base::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_transfer_agreement_id")
                                .from(Shipment::Table, Shipment::TransferAgreementId)
                                .to(TransferAgreement::Table, TransferAgreement::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_transfer_agreement_id")
                        .table(Shipment::Table)
                        .col(Shipment::TransferAgreementId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShipmentDetail::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentDetail::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ShipmentDetail::ShipmentId).integer().not_null())
                        .col(ColumnDef::new(ShipmentDetail::BoxId).integer().not_null())
                        .col(
                            ColumnDef::new(ShipmentDetail::SourceLocationId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentDetail::TargetLocationId)
                                .integer()
                                .null(),
                        )
                        .col(ColumnDef::new(ShipmentDetail::CreatedBy).integer().not_null())
                        .col(
                            ColumnDef::new(ShipmentDetail::CreatedOn)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentDetail::RemovedBy).integer().null())
                        .col(
                            ColumnDef::new(ShipmentDetail::RemovedOn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(ShipmentDetail::LostBy).integer().null())
                        .col(
                            ColumnDef::new(ShipmentDetail::LostOn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(ShipmentDetail::ReceivedBy).integer().null())
                        .col(
                            ColumnDef::new(ShipmentDetail::ReceivedOn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentDetail::DeletedOn)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_detail_shipment_id")
                                .from(ShipmentDetail::Table, ShipmentDetail::ShipmentId)
                                .to(Shipment::Table, Shipment::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_detail_box_id")
                                .from(ShipmentDetail::Table, ShipmentDetail::BoxId)
                                .to(Boxes::Table, Boxes::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_detail_source_location_id")
                                .from(ShipmentDetail::Table, ShipmentDetail::SourceLocationId)
                                .to(Location::Table, Location::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_detail_target_location_id")
                                .from(ShipmentDetail::Table, ShipmentDetail::TargetLocationId)
                                .to(Location::Table, Location::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_detail_shipment_id")
                        .table(ShipmentDetail::Table)
                        .col(ShipmentDetail::ShipmentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_detail_box_id")
                        .table(ShipmentDetail::Table)
                        .col(ShipmentDetail::BoxId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShipmentDetail::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Shipment::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Shipment {
        Table,
        Id,
        SourceBaseId,
        TargetBaseId,
        TransferAgreementId,
        State,
        StartedBy,
        StartedOn,
        SentBy,
        SentOn,
        CanceledBy,
        CanceledOn,
        CompletedBy,
        CompletedOn,
    }

    #[derive(DeriveIden)]
    enum ShipmentDetail {
        Table,
        Id,
        ShipmentId,
        BoxId,
        SourceLocationId,
        TargetLocationId,
        CreatedBy,
        CreatedOn,
        RemovedBy,
        RemovedOn,
        LostBy,
        LostOn,
        ReceivedBy,
        ReceivedOn,
        DeletedOn,
    }
}
