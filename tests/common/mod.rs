#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use boxtransfer_api::{
    auth::Claims,
    commands::transfer_agreements::CreateTransferAgreementCommand,
    config::AppConfig,
    db,
    entities::{
        base,
        boxes::{self, BoxState},
        location, organisation,
        transfer_agreement::{self, TransferAgreementType},
    },
    events::{Event, EventSender},
    AppState,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

// Lesvos runs bases 1 and 2, Athens runs 3 and 4, Thessaloniki runs 5.
pub const LESVOS: i32 = 1;
pub const ATHENS: i32 = 2;
pub const THESSALONIKI: i32 = 3;

pub const USER: i32 = 7;

/// Every seeded base has a single warehouse location
pub fn location_of(base_id: i32) -> i32 {
    base_id * 10
}

/// Application state backed by a fresh in-memory SQLite database
pub struct TestApp {
    pub state: AppState,
    router: Router,
    events: mpsc::Receiver<Event>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_database_url("sqlite::memory:").await
    }

    /// File-backed databases get a pool of several connections
    pub async fn with_database_url(database_url: &str) -> Self {
        let cfg = AppConfig::new(
            database_url.to_string(),
            JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let pool = db::establish_connection(&cfg.database_url)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, events) = mpsc::channel(1024);
        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
        let router = boxtransfer_api::app(state.clone());

        let app = Self {
            state,
            router,
            events,
        };
        app.seed_world().await;
        app
    }

    async fn seed_world(&self) {
        let db = self.state.db.as_ref();
        let organisations = [
            (LESVOS, "Lesvos Aid"),
            (ATHENS, "Athens Hub"),
            (THESSALONIKI, "North Relief"),
        ];
        for (id, name) in organisations {
            organisation::ActiveModel {
                id: Set(id),
                name: Set(name.to_string()),
            }
            .insert(db)
            .await
            .expect("seed organisation");
        }

        let bases = [(1, LESVOS), (2, LESVOS), (3, ATHENS), (4, ATHENS), (5, THESSALONIKI)];
        for (base_id, organisation_id) in bases {
            base::ActiveModel {
                id: Set(base_id),
                name: Set(format!("Base {base_id}")),
                organisation_id: Set(organisation_id),
            }
            .insert(db)
            .await
            .expect("seed base");

            location::ActiveModel {
                id: Set(location_of(base_id)),
                name: Set(format!("Warehouse {base_id}")),
                base_id: Set(base_id),
            }
            .insert(db)
            .await
            .expect("seed location");
        }
    }

    /// Inserts an in-stock box at the base's warehouse
    pub async fn seed_box(&self, label: &str, base_id: i32) -> boxes::Model {
        boxes::ActiveModel {
            label_identifier: Set(label.to_string()),
            location_id: Set(location_of(base_id)),
            state: Set(BoxState::InStock),
            last_modified_on: Set(Utc::now()),
            ..Default::default()
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("seed box")
    }

    pub async fn find_box(&self, id: i32) -> boxes::Model {
        boxes::Entity::find_by_id(id)
            .one(self.state.db.as_ref())
            .await
            .expect("query box")
            .expect("box exists")
    }

    /// Agreement request with the partner's bases left to default
    pub fn agreement_request(
        initiating: i32,
        partner: i32,
        r#type: TransferAgreementType,
        initiating_bases: Vec<i32>,
    ) -> CreateTransferAgreementCommand {
        CreateTransferAgreementCommand {
            initiating_organisation_id: initiating,
            partner_organisation_id: partner,
            r#type,
            initiating_organisation_base_ids: initiating_bases,
            partner_organisation_base_ids: None,
            valid_from: None,
            valid_until: None,
            timezone: None,
            comment: None,
            requested_by: USER,
        }
    }

    /// Lesvos (bases 1, 2) to every Athens base, already accepted
    pub async fn accepted_agreement(
        &self,
        r#type: TransferAgreementType,
    ) -> transfer_agreement::Model {
        let agreement = self
            .state
            .transfer_agreements
            .create_agreement(Self::agreement_request(LESVOS, ATHENS, r#type, vec![1, 2]))
            .await
            .expect("create agreement");
        self.state
            .transfer_agreements
            .accept_agreement(agreement.id, USER + 1)
            .await
            .expect("accept agreement")
    }

    /// Events published so far, in order
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn token(
        &self,
        user_id: i32,
        organisation_id: i32,
        permissions: &[(&str, Option<Vec<i32>>)],
    ) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            organisation_id,
            permissions: permissions
                .iter()
                .map(|(name, bases)| (name.to_string(), bases.clone()))
                .collect::<HashMap<_, _>>(),
            is_god: false,
            iat: now,
            exp: now + 3600,
            iss: self.state.config.jwt_issuer.clone(),
            aud: self.state.config.jwt_audience.clone(),
        };

        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("encode token")
    }

    /// Token carrying every permission for all bases
    pub fn full_token(&self, user_id: i32, organisation_id: i32) -> String {
        self.token(
            user_id,
            organisation_id,
            &[
                ("transfer_agreement:read", None),
                ("transfer_agreement:write", None),
                ("shipment:read", None),
                ("shipment:write", None),
            ],
        )
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}
