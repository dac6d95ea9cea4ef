//! Shipments from preparation through completion or cancellation.

mod common;

use assert_matches::assert_matches;
use boxtransfer_api::{
    commands::shipments::{CreateShipmentCommand, ReceivedShipmentDetail, UpdateShipmentCommand},
    entities::{
        boxes::BoxState,
        shipment::{self, ShipmentState},
        transfer_agreement::{self, TransferAgreementType},
    },
    errors::ServiceError,
    events::Event,
};
use chrono::{Duration, Utc};
use common::{location_of, TestApp, ATHENS, LESVOS, THESSALONIKI, USER};

async fn start_shipment(
    app: &TestApp,
    agreement: &transfer_agreement::Model,
    source_base_id: i32,
    target_base_id: i32,
) -> Result<shipment::Model, ServiceError> {
    app.state
        .shipments
        .create_shipment(CreateShipmentCommand {
            source_base_id,
            target_base_id,
            transfer_agreement_id: agreement.id,
            started_by: USER,
        })
        .await
}

fn prepare(shipment_id: i32, labels: &[&str]) -> UpdateShipmentCommand {
    UpdateShipmentCommand {
        shipment_id,
        user_id: USER,
        prepared_box_label_identifiers: labels.iter().map(|l| l.to_string()).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn shipment_runs_from_preparing_to_completed() {
    let mut app = TestApp::new().await;
    let agreement = app.accepted_agreement(TransferAgreementType::SendingTo).await;
    let tents = app.seed_box("TENTS-01", 1).await;
    let blankets = app.seed_box("BLANKETS-02", 1).await;
    let diapers = app.seed_box("DIAPERS-03", 1).await;
    app.drain_events();

    let shipment = start_shipment(&app, &agreement, 1, 3).await.unwrap();
    assert_eq!(shipment.state, ShipmentState::Preparing);
    assert_eq!(shipment.started_by, USER);

    let service = app.state.shipments.clone();
    service
        .update_shipment(prepare(shipment.id, &["TENTS-01", "BLANKETS-02", "DIAPERS-03"]))
        .await
        .unwrap();
    assert_eq!(app.find_box(tents.id).await.state, BoxState::MarkedForShipment);

    let removed = service
        .update_shipment(UpdateShipmentCommand {
            shipment_id: shipment.id,
            user_id: USER,
            removed_box_label_identifiers: vec!["DIAPERS-03".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!removed.completed);
    assert_eq!(app.find_box(diapers.id).await.state, BoxState::InStock);

    let details = service.active_details(shipment.id).await.unwrap();
    assert_eq!(details.len(), 2);

    let sent = service.send_shipment(shipment.id, USER + 1).await.unwrap();
    assert_eq!(sent.state, ShipmentState::Sent);
    assert_eq!(sent.sent_by, Some(USER + 1));
    assert_eq!(app.find_box(tents.id).await.state, BoxState::InTransit);
    assert_eq!(app.find_box(blankets.id).await.state, BoxState::InTransit);
    assert_eq!(app.find_box(diapers.id).await.state, BoxState::InStock);

    let tents_detail = details.iter().find(|d| d.box_id == tents.id).unwrap();
    let partial = service
        .update_shipment(UpdateShipmentCommand {
            shipment_id: shipment.id,
            user_id: USER + 2,
            received_shipment_details: vec![ReceivedShipmentDetail {
                shipment_detail_id: tents_detail.id,
                target_location_id: location_of(3),
            }],
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!partial.completed);
    assert_eq!(partial.shipment.state, ShipmentState::Sent);

    let received_tents = app.find_box(tents.id).await;
    assert_eq!(received_tents.state, BoxState::Received);
    assert_eq!(received_tents.location_id, location_of(3));

    let done = service
        .update_shipment(UpdateShipmentCommand {
            shipment_id: shipment.id,
            user_id: USER + 2,
            lost_box_label_identifiers: vec!["BLANKETS-02".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(done.completed);
    assert_eq!(done.shipment.state, ShipmentState::Completed);
    assert_eq!(done.shipment.completed_by, Some(USER + 2));
    assert_eq!(app.find_box(blankets.id).await.state, BoxState::Lost);

    let closed = service.active_details(shipment.id).await.unwrap();
    assert_eq!(closed.len(), 2);
    assert!(closed.iter().all(|d| !d.is_active()));

    assert_eq!(
        app.drain_events(),
        vec![
            Event::ShipmentCreated {
                shipment_id: shipment.id,
                transfer_agreement_id: agreement.id,
            },
            Event::ShipmentUpdated(shipment.id),
            Event::ShipmentUpdated(shipment.id),
            Event::ShipmentSent(shipment.id),
            Event::ShipmentUpdated(shipment.id),
            Event::ShipmentUpdated(shipment.id),
            Event::ShipmentCompleted(shipment.id),
        ]
    );
}

#[tokio::test]
async fn agreement_must_be_accepted() {
    let app = TestApp::new().await;
    let agreement = app
        .state
        .transfer_agreements
        .create_agreement(TestApp::agreement_request(
            LESVOS,
            ATHENS,
            TransferAgreementType::SendingTo,
            vec![1],
        ))
        .await
        .unwrap();

    assert_matches!(
        start_shipment(&app, &agreement, 1, 3).await,
        Err(ServiceError::InvalidState { actual, .. }) if actual == "UnderReview"
    );
}

#[tokio::test]
async fn agreement_must_be_in_effect() {
    let app = TestApp::new().await;
    let mut request =
        TestApp::agreement_request(LESVOS, ATHENS, TransferAgreementType::SendingTo, vec![1]);
    request.valid_from = Some((Utc::now() + Duration::days(10)).date_naive());
    let agreement = app
        .state
        .transfer_agreements
        .create_agreement(request)
        .await
        .unwrap();
    app.state
        .transfer_agreements
        .accept_agreement(agreement.id, USER)
        .await
        .unwrap();

    assert_matches!(
        start_shipment(&app, &agreement, 1, 3).await,
        Err(ServiceError::AgreementNotInEffect { agreement_id }) if agreement_id == agreement.id
    );
}

#[tokio::test]
async fn base_pair_must_be_covered() {
    let app = TestApp::new().await;
    let one_way = app.accepted_agreement(TransferAgreementType::SendingTo).await;

    assert_matches!(
        start_shipment(&app, &one_way, 3, 1).await,
        Err(ServiceError::InvalidBase { base_id: 3, expected_base_ids }) if expected_base_ids == vec![1, 2]
    );
    assert_matches!(
        start_shipment(&app, &one_way, 1, 5).await,
        Err(ServiceError::InvalidBase { base_id: 5, expected_base_ids }) if expected_base_ids == vec![3, 4]
    );

    let both_ways = app
        .accepted_agreement(TransferAgreementType::Bidirectional)
        .await;
    let reversed = start_shipment(&app, &both_ways, 3, 1).await.unwrap();
    assert_eq!(reversed.source_base_id, 3);
    assert_eq!(reversed.target_base_id, 1);
}

#[tokio::test]
async fn only_in_stock_boxes_from_the_source_base_can_be_prepared() {
    let app = TestApp::new().await;
    let agreement = app.accepted_agreement(TransferAgreementType::SendingTo).await;
    let first = start_shipment(&app, &agreement, 1, 3).await.unwrap();
    let second = start_shipment(&app, &agreement, 1, 4).await.unwrap();
    app.seed_box("RICE-01", 1).await;
    let elsewhere = app.seed_box("RICE-02", 2).await;

    app.state
        .shipments
        .update_shipment(prepare(first.id, &["RICE-01"]))
        .await
        .unwrap();

    assert_matches!(
        app.state.shipments.update_shipment(prepare(second.id, &["RICE-01"])).await,
        Err(ServiceError::InvalidBoxState { label_identifier, state })
            if label_identifier == "RICE-01" && state == "MarkedForShipment"
    );
    assert_matches!(
        app.state.shipments.update_shipment(prepare(first.id, &["RICE-02"])).await,
        Err(ServiceError::InvalidBase { base_id: 2, expected_base_ids }) if expected_base_ids == vec![1]
    );
    assert_eq!(app.find_box(elsewhere.id).await.state, BoxState::InStock);
    assert_matches!(
        app.state.shipments.update_shipment(prepare(first.id, &["NOPE"])).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn failed_update_rolls_back_every_change() {
    let app = TestApp::new().await;
    let agreement = app.accepted_agreement(TransferAgreementType::SendingTo).await;
    let shipment = start_shipment(&app, &agreement, 1, 3).await.unwrap();
    let good = app.seed_box("SOAP-01", 1).await;
    app.seed_box("SOAP-02", 2).await;

    let result = app
        .state
        .shipments
        .update_shipment(prepare(shipment.id, &["SOAP-01", "SOAP-02"]))
        .await;
    assert_matches!(result, Err(ServiceError::InvalidBase { .. }));

    assert_eq!(app.find_box(good.id).await.state, BoxState::InStock);
    assert!(app
        .state
        .shipments
        .active_details(shipment.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn box_list_is_frozen_once_sent() {
    let app = TestApp::new().await;
    let agreement = app.accepted_agreement(TransferAgreementType::SendingTo).await;
    let shipment = start_shipment(&app, &agreement, 1, 3).await.unwrap();
    app.seed_box("WATER-01", 1).await;
    app.seed_box("WATER-02", 1).await;
    app.state
        .shipments
        .update_shipment(prepare(shipment.id, &["WATER-01"]))
        .await
        .unwrap();

    // Outcomes are only accepted once the boxes are on their way
    assert_matches!(
        app.state
            .shipments
            .update_shipment(UpdateShipmentCommand {
                shipment_id: shipment.id,
                user_id: USER,
                lost_box_label_identifiers: vec!["WATER-01".to_string()],
                ..Default::default()
            })
            .await,
        Err(ServiceError::InvalidState { actual, .. }) if actual == "Preparing"
    );

    app.state.shipments.send_shipment(shipment.id, USER).await.unwrap();

    assert_matches!(
        app.state.shipments.update_shipment(prepare(shipment.id, &["WATER-02"])).await,
        Err(ServiceError::InvalidState { actual, .. }) if actual == "Sent"
    );
    assert_matches!(
        app.state.shipments.send_shipment(shipment.id, USER).await,
        Err(ServiceError::InvalidState { .. })
    );
    assert_matches!(
        app.state.shipments.cancel_shipment(shipment.id, USER).await,
        Err(ServiceError::InvalidState { actual, .. }) if actual == "Sent"
    );
}

#[tokio::test]
async fn empty_shipment_cannot_be_sent() {
    let mut app = TestApp::new().await;
    let agreement = app.accepted_agreement(TransferAgreementType::SendingTo).await;
    let shipment = start_shipment(&app, &agreement, 1, 3).await.unwrap();
    let rice = app.seed_box("RICE-01", 1).await;
    let service = app.state.shipments.clone();

    service
        .update_shipment(prepare(shipment.id, &["RICE-01"]))
        .await
        .unwrap();
    service
        .update_shipment(UpdateShipmentCommand {
            shipment_id: shipment.id,
            user_id: USER,
            removed_box_label_identifiers: vec!["RICE-01".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();
    app.drain_events();

    assert_matches!(
        service.send_shipment(shipment.id, USER).await,
        Err(ServiceError::ValidationError(_))
    );
    let stored = service.get_shipment(shipment.id).await.unwrap();
    assert_eq!(stored.state, ShipmentState::Preparing);
    assert!(stored.sent_on.is_none());
    assert!(app.drain_events().is_empty());

    let canceled = service.cancel_shipment(shipment.id, USER).await.unwrap();
    assert_eq!(canceled.state, ShipmentState::Canceled);
    assert_eq!(app.find_box(rice.id).await.state, BoxState::InStock);
}

#[tokio::test]
async fn boxes_are_received_at_the_target_base_only() {
    let app = TestApp::new().await;
    let agreement = app.accepted_agreement(TransferAgreementType::SendingTo).await;
    let shipment = start_shipment(&app, &agreement, 1, 3).await.unwrap();
    let other = start_shipment(&app, &agreement, 2, 4).await.unwrap();
    let flour = app.seed_box("FLOUR-01", 1).await;
    app.seed_box("FLOUR-02", 2).await;

    let service = &app.state.shipments;
    service
        .update_shipment(prepare(shipment.id, &["FLOUR-01"]))
        .await
        .unwrap();
    service
        .update_shipment(prepare(other.id, &["FLOUR-02"]))
        .await
        .unwrap();
    service.send_shipment(shipment.id, USER).await.unwrap();
    service.send_shipment(other.id, USER).await.unwrap();

    let detail = service.active_details(shipment.id).await.unwrap().remove(0);
    let other_detail = service.active_details(other.id).await.unwrap().remove(0);

    let receive = |detail_id: i32, location_id: i32| UpdateShipmentCommand {
        shipment_id: shipment.id,
        user_id: USER,
        received_shipment_details: vec![ReceivedShipmentDetail {
            shipment_detail_id: detail_id,
            target_location_id: location_id,
        }],
        ..Default::default()
    };

    assert_matches!(
        service.update_shipment(receive(detail.id, location_of(4))).await,
        Err(ServiceError::InvalidBase { base_id: 4, expected_base_ids }) if expected_base_ids == vec![3]
    );
    assert_eq!(app.find_box(flour.id).await.state, BoxState::InTransit);

    assert_matches!(
        service.update_shipment(receive(other_detail.id, location_of(3))).await,
        Err(ServiceError::InvalidShipmentDetail { detail_id }) if detail_id == other_detail.id
    );

    let result = service
        .update_shipment(receive(detail.id, location_of(3)))
        .await
        .unwrap();
    assert!(result.completed);

    // Completed shipments take no further outcomes
    assert_matches!(
        service.update_shipment(receive(detail.id, location_of(3))).await,
        Err(ServiceError::InvalidState { actual, .. }) if actual == "Completed"
    );
}

#[tokio::test]
async fn canceling_returns_boxes_to_stock() {
    let mut app = TestApp::new().await;
    let agreement = app.accepted_agreement(TransferAgreementType::SendingTo).await;
    let shipment = start_shipment(&app, &agreement, 2, 4).await.unwrap();
    let cups = app.seed_box("CUPS-01", 2).await;
    app.state
        .shipments
        .update_shipment(prepare(shipment.id, &["CUPS-01"]))
        .await
        .unwrap();
    app.drain_events();

    let canceled = app
        .state
        .shipments
        .cancel_shipment(shipment.id, USER + 3)
        .await
        .unwrap();
    assert_eq!(canceled.state, ShipmentState::Canceled);
    assert_eq!(canceled.canceled_by, Some(USER + 3));
    assert!(canceled.canceled_on.is_some());

    assert_eq!(app.find_box(cups.id).await.state, BoxState::InStock);
    assert!(app
        .state
        .shipments
        .active_details(shipment.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(app.drain_events(), vec![Event::ShipmentCanceled(shipment.id)]);

    // Boxes released by a cancellation can go out again
    let retry = start_shipment(&app, &agreement, 2, 4).await.unwrap();
    app.state
        .shipments
        .update_shipment(prepare(retry.id, &["CUPS-01"]))
        .await
        .unwrap();
}

#[tokio::test]
async fn shipments_are_listed_for_participating_organisations() {
    let app = TestApp::new().await;
    let agreement = app.accepted_agreement(TransferAgreementType::SendingTo).await;
    let shipment = start_shipment(&app, &agreement, 1, 3).await.unwrap();

    let for_lesvos = app.state.shipments.list_for_organisation(LESVOS).await.unwrap();
    let for_athens = app.state.shipments.list_for_organisation(ATHENS).await.unwrap();
    let for_north = app
        .state
        .shipments
        .list_for_organisation(THESSALONIKI)
        .await
        .unwrap();

    assert_eq!(for_lesvos.iter().map(|s| s.id).collect::<Vec<_>>(), vec![shipment.id]);
    assert_eq!(for_athens.len(), 1);
    assert!(for_north.is_empty());
}
