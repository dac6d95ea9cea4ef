//! Transfer agreement lifecycle against the real schema.

mod common;

use assert_matches::assert_matches;
use boxtransfer_api::{
    entities::transfer_agreement::{TransferAgreementState, TransferAgreementType},
    errors::ServiceError,
    events::Event,
    services::BaseKind,
};
use chrono::{NaiveDate, TimeZone, Utc};
use common::{TestApp, ATHENS, LESVOS, THESSALONIKI, USER};
use rstest::rstest;
use tempfile::TempDir;

fn ids<T>(models: &[T], id: impl Fn(&T) -> i32) -> Vec<i32> {
    models.iter().map(id).collect()
}

#[rstest]
#[case::sending_to(TransferAgreementType::SendingTo, LESVOS, vec![1, 2], ATHENS, vec![3, 4])]
#[case::receiving_from(TransferAgreementType::ReceivingFrom, ATHENS, vec![3, 4], LESVOS, vec![1, 2])]
#[case::bidirectional(TransferAgreementType::Bidirectional, LESVOS, vec![1, 2], ATHENS, vec![3, 4])]
#[tokio::test]
async fn create_assigns_roles_by_type(
    #[case] r#type: TransferAgreementType,
    #[case] source_organisation: i32,
    #[case] source_bases: Vec<i32>,
    #[case] target_organisation: i32,
    #[case] target_bases: Vec<i32>,
) {
    let mut app = TestApp::new().await;
    let service = &app.state.transfer_agreements;

    let agreement = service
        .create_agreement(TestApp::agreement_request(LESVOS, ATHENS, r#type, vec![1, 2]))
        .await
        .unwrap();

    assert_eq!(agreement.state, TransferAgreementState::UnderReview);
    assert_eq!(agreement.r#type, r#type);
    assert_eq!(agreement.source_organisation_id, source_organisation);
    assert_eq!(agreement.target_organisation_id, target_organisation);
    assert_eq!(agreement.requested_by, USER);
    assert!(agreement.accepted_by.is_none());

    let listed_sources = service.list_bases(agreement.id, BaseKind::Source).await.unwrap();
    let listed_targets = service.list_bases(agreement.id, BaseKind::Target).await.unwrap();
    assert_eq!(ids(&listed_sources, |b| b.id), source_bases);
    assert_eq!(ids(&listed_targets, |b| b.id), target_bases);

    let details = service.details(agreement.id).await.unwrap();
    assert_eq!(details.len(), source_bases.len() * target_bases.len());

    assert_eq!(
        app.drain_events(),
        vec![Event::TransferAgreementCreated {
            agreement_id: agreement.id,
            source_organisation_id: source_organisation,
            target_organisation_id: target_organisation,
        }]
    );
}

#[tokio::test]
async fn explicit_partner_bases_limit_the_pairs() {
    let app = TestApp::new().await;
    let mut request =
        TestApp::agreement_request(LESVOS, ATHENS, TransferAgreementType::SendingTo, vec![2, 1, 2]);
    request.partner_organisation_base_ids = Some(vec![4]);

    let agreement = app
        .state
        .transfer_agreements
        .create_agreement(request)
        .await
        .unwrap();

    let pairs: Vec<(i32, i32)> = app
        .state
        .transfer_agreements
        .details(agreement.id)
        .await
        .unwrap()
        .into_iter()
        .map(|d| (d.source_base_id, d.target_base_id))
        .collect();
    assert_eq!(pairs.len(), 2);
    assert!(pairs.contains(&(1, 4)));
    assert!(pairs.contains(&(2, 4)));
}

#[tokio::test]
async fn agreement_with_own_organisation_is_rejected() {
    let app = TestApp::new().await;
    let result = app
        .state
        .transfer_agreements
        .create_agreement(TestApp::agreement_request(
            LESVOS,
            LESVOS,
            TransferAgreementType::SendingTo,
            vec![1],
        ))
        .await;

    assert_matches!(
        result,
        Err(ServiceError::InvalidOrganisation { organisation_id }) if organisation_id == LESVOS
    );
}

#[tokio::test]
async fn foreign_base_rolls_back_the_agreement() {
    let mut app = TestApp::new().await;
    let result = app
        .state
        .transfer_agreements
        .create_agreement(TestApp::agreement_request(
            LESVOS,
            ATHENS,
            TransferAgreementType::SendingTo,
            vec![1, 5],
        ))
        .await;

    assert_matches!(
        result,
        Err(ServiceError::InvalidBase { base_id: 5, expected_base_ids }) if expected_base_ids == vec![1, 2]
    );

    let stored = app
        .state
        .transfer_agreements
        .list_for_organisation(LESVOS, None)
        .await
        .unwrap();
    assert!(stored.is_empty());
    assert!(app.drain_events().is_empty());
}

#[tokio::test]
async fn partner_base_outside_partner_organisation_is_rejected() {
    let app = TestApp::new().await;
    let mut request =
        TestApp::agreement_request(LESVOS, ATHENS, TransferAgreementType::ReceivingFrom, vec![1]);
    request.partner_organisation_base_ids = Some(vec![3, 5]);

    let result = app.state.transfer_agreements.create_agreement(request).await;
    assert_matches!(
        result,
        Err(ServiceError::InvalidBase { base_id: 5, expected_base_ids }) if expected_base_ids == vec![3, 4]
    );
}

#[tokio::test]
async fn reversed_dates_are_rejected() {
    let app = TestApp::new().await;
    let mut request =
        TestApp::agreement_request(LESVOS, ATHENS, TransferAgreementType::SendingTo, vec![1]);
    request.valid_from = NaiveDate::from_ymd_opt(2024, 5, 10);
    request.valid_until = NaiveDate::from_ymd_opt(2024, 5, 1);

    let result = app.state.transfer_agreements.create_agreement(request).await;
    assert_matches!(result, Err(ServiceError::InvalidDates { .. }));
}

#[tokio::test]
async fn unknown_timezone_is_rejected() {
    let app = TestApp::new().await;
    let mut request =
        TestApp::agreement_request(LESVOS, ATHENS, TransferAgreementType::SendingTo, vec![1]);
    request.valid_from = NaiveDate::from_ymd_opt(2024, 5, 1);
    request.timezone = Some("Atlantis/Capital".to_string());

    let result = app.state.transfer_agreements.create_agreement(request).await;
    assert_matches!(result, Err(ServiceError::InvalidTimezone(name)) if name == "Atlantis/Capital");
}

#[tokio::test]
async fn timezone_is_ignored_without_validity_dates() {
    let app = TestApp::new().await;
    let mut request =
        TestApp::agreement_request(LESVOS, ATHENS, TransferAgreementType::SendingTo, vec![1]);
    request.timezone = Some("Mars/Olympus".to_string());

    let before = Utc::now();
    let agreement = app
        .state
        .transfer_agreements
        .create_agreement(request)
        .await
        .unwrap();
    assert!(agreement.valid_from >= before);
    assert!(agreement.valid_until.is_none());
}

#[tokio::test]
async fn validity_dates_are_stored_in_utc() {
    let app = TestApp::new().await;
    let mut request =
        TestApp::agreement_request(LESVOS, ATHENS, TransferAgreementType::SendingTo, vec![1]);
    request.valid_from = NaiveDate::from_ymd_opt(2024, 1, 10);
    request.valid_until = NaiveDate::from_ymd_opt(2024, 1, 20);
    request.timezone = Some("Europe/Athens".to_string());

    let agreement = app
        .state
        .transfer_agreements
        .create_agreement(request)
        .await
        .unwrap();

    assert_eq!(
        agreement.valid_from,
        Utc.with_ymd_and_hms(2024, 1, 9, 22, 0, 0).unwrap()
    );
    assert_eq!(
        agreement.valid_until,
        Some(Utc.with_ymd_and_hms(2024, 1, 20, 21, 59, 59).unwrap())
    );
}

#[tokio::test]
async fn accept_happens_once() {
    let mut app = TestApp::new().await;
    let service = &app.state.transfer_agreements;
    let agreement = service
        .create_agreement(TestApp::agreement_request(
            LESVOS,
            ATHENS,
            TransferAgreementType::SendingTo,
            vec![1],
        ))
        .await
        .unwrap();

    let accepted = service.accept_agreement(agreement.id, 42).await.unwrap();
    assert_eq!(accepted.state, TransferAgreementState::Accepted);
    assert_eq!(accepted.accepted_by, Some(42));
    assert!(accepted.accepted_on.is_some());

    let again = service.accept_agreement(agreement.id, 42).await;
    assert_matches!(
        again,
        Err(ServiceError::InvalidState { expected, actual })
            if expected == vec!["UnderReview"] && actual == "Accepted"
    );

    let events = app.drain_events();
    assert_eq!(events.last(), Some(&Event::TransferAgreementAccepted(agreement.id)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_accepts_succeed_once() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("transfers.db").display());
    let mut app = TestApp::with_database_url(&url).await;
    let service = app.state.transfer_agreements.clone();
    let agreement = service
        .create_agreement(TestApp::agreement_request(
            LESVOS,
            ATHENS,
            TransferAgreementType::SendingTo,
            vec![1],
        ))
        .await
        .unwrap();
    app.drain_events();

    let (first, second) = tokio::join!(
        service.accept_agreement(agreement.id, 41),
        service.accept_agreement(agreement.id, 42),
    );

    let (accepted, rejected) = match (first, second) {
        (Ok(accepted), Err(err)) | (Err(err), Ok(accepted)) => (accepted, err),
        other => panic!("expected exactly one accept to succeed, got {other:?}"),
    };
    assert_eq!(accepted.state, TransferAgreementState::Accepted);
    assert_matches!(
        rejected,
        ServiceError::InvalidState { expected, actual }
            if expected == vec!["UnderReview"] && actual == "Accepted"
    );

    let stored = service.get_agreement(agreement.id).await.unwrap();
    assert_eq!(stored.accepted_by, accepted.accepted_by);
    assert_eq!(
        app.drain_events(),
        vec![Event::TransferAgreementAccepted(agreement.id)]
    );
}

#[tokio::test]
async fn cancel_under_review_records_termination() {
    let app = TestApp::new().await;
    let service = &app.state.transfer_agreements;
    let agreement = service
        .create_agreement(TestApp::agreement_request(
            LESVOS,
            ATHENS,
            TransferAgreementType::SendingTo,
            vec![1],
        ))
        .await
        .unwrap();

    let canceled = service.cancel_agreement(agreement.id, USER).await.unwrap();
    assert_eq!(canceled.state, TransferAgreementState::Canceled);
    assert_eq!(canceled.terminated_by, Some(USER));
    let terminated_on = canceled.terminated_on.expect("terminated_on set");
    assert!((Utc::now() - terminated_on).num_seconds().abs() < 5);
    assert!(canceled.accepted_on.is_none());
}

#[tokio::test]
async fn rejected_agreement_cannot_be_canceled() {
    let app = TestApp::new().await;
    let service = &app.state.transfer_agreements;
    let agreement = service
        .create_agreement(TestApp::agreement_request(
            LESVOS,
            ATHENS,
            TransferAgreementType::Bidirectional,
            vec![2],
        ))
        .await
        .unwrap();

    let rejected = service.reject_agreement(agreement.id, 9).await.unwrap();
    assert_eq!(rejected.state, TransferAgreementState::Rejected);
    assert_eq!(rejected.terminated_by, Some(9));
    assert!(rejected.terminated_on.is_some());

    assert_matches!(
        service.cancel_agreement(agreement.id, 9).await,
        Err(ServiceError::InvalidState { actual, .. }) if actual == "Rejected"
    );
    assert_matches!(
        service.accept_agreement(agreement.id, 9).await,
        Err(ServiceError::InvalidState { .. })
    );
}

#[tokio::test]
async fn accepted_agreement_can_be_canceled() {
    let app = TestApp::new().await;
    let agreement = app
        .accepted_agreement(TransferAgreementType::SendingTo)
        .await;

    let canceled = app
        .state
        .transfer_agreements
        .cancel_agreement(agreement.id, USER)
        .await
        .unwrap();
    assert_eq!(canceled.state, TransferAgreementState::Canceled);
    assert_eq!(canceled.terminated_by, Some(USER));
    assert_eq!(canceled.accepted_by, agreement.accepted_by);
}

#[tokio::test]
async fn missing_agreement_is_not_found() {
    let app = TestApp::new().await;
    assert_matches!(
        app.state.transfer_agreements.accept_agreement(999, USER).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.state.transfer_agreements.get_agreement(999).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn listing_is_scoped_to_participants_and_states() {
    let app = TestApp::new().await;
    let service = &app.state.transfer_agreements;

    let accepted = app
        .accepted_agreement(TransferAgreementType::SendingTo)
        .await;
    let pending = service
        .create_agreement(TestApp::agreement_request(
            THESSALONIKI,
            LESVOS,
            TransferAgreementType::ReceivingFrom,
            vec![5],
        ))
        .await
        .unwrap();

    let lesvos_all = service.list_for_organisation(LESVOS, None).await.unwrap();
    assert_eq!(ids(&lesvos_all, |a| a.id), vec![accepted.id, pending.id]);

    let athens_all = service.list_for_organisation(ATHENS, None).await.unwrap();
    assert_eq!(ids(&athens_all, |a| a.id), vec![accepted.id]);

    let lesvos_pending = service
        .list_for_organisation(LESVOS, Some(vec![TransferAgreementState::UnderReview]))
        .await
        .unwrap();
    assert_eq!(ids(&lesvos_pending, |a| a.id), vec![pending.id]);
}
