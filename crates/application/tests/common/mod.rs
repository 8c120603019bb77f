//! In-memory store, scripted processor and recording notifier shared by the
//! application integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::anyhow;
use application::usecases::{
    injunction_payment::InjunctionPaymentUseCase,
    payment_reconciliation::PaymentReconciliationUseCase,
    procedure_actions::ProcedureActionsUseCase, procedure_transitions::ProcedureTransitions,
    processor_events::ProcessorEventsUseCase, subscription_sync::SubscriptionSyncUseCase,
    temporal_transitions::TemporalTransitionsUseCase,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use domain::{
    entities::{
        comments::{CommentEntity, InsertCommentEntity},
        documents::{DocumentEntity, InsertDocumentEntity},
        payments::{NewPaymentEntity, PaymentChangeset, PaymentEntity},
        procedures::ProcedureEntity,
        subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity},
    },
    repositories::{
        app_users::AppUserRepository,
        comments::CommentRepository,
        documents::DocumentRepository,
        notifier::{Notifier, OutboundMessage},
        payment_gateway::{GatewayError, GatewayResult, PaymentGateway},
        payment_provider_customers::PaymentProviderCustomerRepository,
        payments::PaymentRepository,
        procedures::ProcedureRepository,
        store_error::{StoreError, StoreResult},
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        billing::BillingConfig,
        enums::procedure_statuses::ProcedureStatus,
        lifecycle_policy::LifecyclePolicy,
        payment_processor::{
            Charge, CheckoutSession, IntentStatus, Invoice, InvoiceItem, InvoiceItemRequest,
            InvoiceRequest, InvoiceStatus, Metadata, PaymentIntent, ProcessorEvent,
            ProcessorEventKind, ProcessorSubscription, ProcessorSubscriptionStatus,
            SessionPaymentStatus, SessionStatus, SubscriptionListFilter, SubscriptionRequest,
        },
    },
};
use serde::Deserialize;
use tokio::task::yield_now;
use uuid::Uuid;

pub const VALID_SIGNATURE: &str = "t=1,v1=valid";

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at_noon(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
}

pub fn metadata(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// store

#[derive(Default)]
struct StoreState {
    procedures: HashMap<Uuid, ProcedureEntity>,
    payments: Vec<PaymentEntity>,
    subscriptions: Vec<SubscriptionEntity>,
    customers: Vec<(Uuid, String, String)>,
    documents: Vec<DocumentEntity>,
    comments: Vec<CommentEntity>,
    users: HashMap<Uuid, String>,
    failing_customer_lookups: bool,
    failing_subscription_writes: bool,
}

/// Enforces the same unique keys as the Postgres schema. Every call yields
/// first so concurrent use cases interleave between reads and writes.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn seed_user(&self, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().users.insert(id, email.to_string());
        id
    }

    pub fn seed_procedure(
        &self,
        owner_user_id: Uuid,
        status: ProcedureStatus,
        configure: impl FnOnce(&mut ProcedureEntity),
    ) -> Uuid {
        let now = Utc::now();
        let mut procedure = ProcedureEntity {
            id: Uuid::new_v4(),
            status,
            client_id: Uuid::new_v4(),
            owner_user_id,
            assigned_agent_id: None,
            payment_id: None,
            payment_status: None,
            injunction_payment_id: None,
            installment_plan: None,
            notice_flag: false,
            subscription_add_on_flag: false,
            notice_fee_item_ref: None,
            dispatch_date: None,
            reminder_date_1: None,
            reminder_date_2: None,
            follow_up_sent_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        configure(&mut procedure);
        let id = procedure.id;
        self.state.lock().unwrap().procedures.insert(id, procedure);
        id
    }

    pub fn fail_customer_lookups(&self) {
        self.state.lock().unwrap().failing_customer_lookups = true;
    }

    pub fn fail_subscription_writes(&self, failing: bool) {
        self.state.lock().unwrap().failing_subscription_writes = failing;
    }

    /// Out-of-band edit, as a user update would do; bumps the version.
    pub fn edit_procedure(&self, id: Uuid, edit: impl FnOnce(&mut ProcedureEntity)) {
        let mut state = self.state.lock().unwrap();
        let procedure = state.procedures.get_mut(&id).unwrap();
        edit(procedure);
        procedure.version += 1;
    }

    pub fn seed_payment(&self, payment: PaymentEntity) {
        self.state.lock().unwrap().payments.push(payment);
    }

    pub fn seed_customer(&self, user_id: Uuid, customer_ref: &str) {
        self.state.lock().unwrap().customers.push((
            user_id,
            "stripe".to_string(),
            customer_ref.to_string(),
        ));
    }

    pub fn procedure(&self, id: Uuid) -> ProcedureEntity {
        self.state.lock().unwrap().procedures[&id].clone()
    }

    pub fn payments(&self) -> Vec<PaymentEntity> {
        self.state.lock().unwrap().payments.clone()
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionEntity> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    pub fn documents(&self, procedure_id: Uuid) -> Vec<DocumentEntity> {
        self.state
            .lock()
            .unwrap()
            .documents
            .iter()
            .filter(|doc| doc.procedure_id == procedure_id)
            .cloned()
            .collect()
    }

    pub fn comments(&self, procedure_id: Uuid) -> Vec<CommentEntity> {
        self.state
            .lock()
            .unwrap()
            .comments
            .iter()
            .filter(|comment| comment.procedure_id == procedure_id)
            .cloned()
            .collect()
    }

    pub fn has_procedure(&self, id: Uuid) -> bool {
        self.state.lock().unwrap().procedures.contains_key(&id)
    }
}

#[async_trait]
impl ProcedureRepository for InMemoryStore {
    async fn find_by_id(&self, procedure_id: Uuid) -> StoreResult<Option<ProcedureEntity>> {
        yield_now().await;
        Ok(self.state.lock().unwrap().procedures.get(&procedure_id).cloned())
    }

    async fn save_lifecycle(&self, next: &ProcedureEntity) -> StoreResult<ProcedureEntity> {
        yield_now().await;
        let mut state = self.state.lock().unwrap();
        let stored = state
            .procedures
            .get_mut(&next.id)
            .ok_or_else(|| StoreError::Internal(anyhow!("procedure {} missing", next.id)))?;
        if stored.version != next.version {
            return Err(StoreError::StaleWrite);
        }
        let changes = next.lifecycle_changeset();
        stored.status = changes.status;
        stored.assigned_agent_id = changes.assigned_agent_id;
        stored.payment_id = changes.payment_id;
        stored.payment_status = changes.payment_status;
        stored.injunction_payment_id = changes.injunction_payment_id;
        stored.dispatch_date = changes.dispatch_date;
        stored.follow_up_sent_at = changes.follow_up_sent_at;
        stored.version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn list_dispatched_on_or_before(
        &self,
        status: ProcedureStatus,
        cutoff: NaiveDate,
    ) -> StoreResult<Vec<ProcedureEntity>> {
        yield_now().await;
        Ok(self
            .state
            .lock()
            .unwrap()
            .procedures
            .values()
            .filter(|p| p.status == status && p.dispatch_date.is_some_and(|d| d <= cutoff))
            .cloned()
            .collect())
    }

    async fn list_follow_up_candidates(
        &self,
        cutoff: NaiveDate,
    ) -> StoreResult<Vec<ProcedureEntity>> {
        yield_now().await;
        Ok(self
            .state
            .lock()
            .unwrap()
            .procedures
            .values()
            .filter(|p| {
                p.status == ProcedureStatus::NoticeSent
                    && p.follow_up_sent_at.is_none()
                    && p.dispatch_date.is_some_and(|d| d <= cutoff)
            })
            .cloned()
            .collect())
    }

    async fn claim_follow_up(&self, procedure_id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        yield_now().await;
        let mut state = self.state.lock().unwrap();
        match state.procedures.get_mut(&procedure_id) {
            Some(p) if p.follow_up_sent_at.is_none() && p.status == ProcedureStatus::NoticeSent => {
                p.follow_up_sent_at = Some(at);
                p.version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_follow_up(&self, procedure_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        yield_now().await;
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.procedures.get_mut(&procedure_id) {
            if p.follow_up_sent_at == Some(at) {
                p.follow_up_sent_at = None;
                p.version += 1;
            }
        }
        Ok(())
    }

    async fn set_notice_fee_item_ref(
        &self,
        procedure_id: Uuid,
        item_ref: &str,
    ) -> StoreResult<bool> {
        yield_now().await;
        let mut state = self.state.lock().unwrap();
        match state.procedures.get_mut(&procedure_id) {
            Some(p) if p.notice_fee_item_ref.is_none() => {
                p.notice_fee_item_ref = Some(item_ref.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_draft(&self, procedure_id: Uuid) -> StoreResult<bool> {
        yield_now().await;
        let mut state = self.state.lock().unwrap();
        match state.procedures.get(&procedure_id) {
            Some(p) if p.status == ProcedureStatus::Draft => {
                state.procedures.remove(&procedure_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn check_payment_keys(
    payments: &[PaymentEntity],
    skip: Option<Uuid>,
    intent_id: &str,
    procedure_id: Option<Uuid>,
) -> StoreResult<()> {
    for other in payments.iter().filter(|p| Some(p.id) != skip) {
        if other.external_payment_intent_id == intent_id {
            return Err(StoreError::UniqueViolation(
                "payments_external_payment_intent_id_key".into(),
            ));
        }
        if procedure_id.is_some() && other.procedure_id == procedure_id {
            return Err(StoreError::UniqueViolation("payments_procedure_id_key".into()));
        }
    }
    Ok(())
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn find_by_id(&self, payment_id: Uuid) -> StoreResult<Option<PaymentEntity>> {
        yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state.payments.iter().find(|p| p.id == payment_id).cloned())
    }

    async fn find_by_procedure_id(
        &self,
        procedure_id: Uuid,
    ) -> StoreResult<Option<PaymentEntity>> {
        yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .payments
            .iter()
            .find(|p| p.procedure_id == Some(procedure_id))
            .cloned())
    }

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> StoreResult<Option<PaymentEntity>> {
        yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .payments
            .iter()
            .find(|p| p.external_payment_intent_id == payment_intent_id)
            .cloned())
    }

    async fn insert_payment(&self, payment: NewPaymentEntity) -> StoreResult<PaymentEntity> {
        yield_now().await;
        let mut state = self.state.lock().unwrap();
        check_payment_keys(
            &state.payments,
            None,
            &payment.external_payment_intent_id,
            payment.procedure_id,
        )?;
        let now = Utc::now();
        let row = PaymentEntity {
            id: Uuid::new_v4(),
            owner_user_id: payment.owner_user_id,
            procedure_id: payment.procedure_id,
            external_payment_intent_id: payment.external_payment_intent_id,
            external_charge_id: payment.external_charge_id,
            amount_minor: payment.amount_minor,
            currency: payment.currency,
            status: payment.status,
            description: payment.description,
            metadata: payment.metadata,
            created_at: now,
            updated_at: now,
        };
        state.payments.push(row.clone());
        Ok(row)
    }

    async fn update_payment(
        &self,
        payment_id: Uuid,
        changes: PaymentChangeset,
    ) -> StoreResult<PaymentEntity> {
        yield_now().await;
        let mut state = self.state.lock().unwrap();
        let index = state
            .payments
            .iter()
            .position(|p| p.id == payment_id)
            .ok_or_else(|| StoreError::Internal(anyhow!("payment {payment_id} missing")))?;

        let mut row = state.payments[index].clone();
        if let Some(procedure_id) = changes.procedure_id {
            row.procedure_id = procedure_id;
        }
        if let Some(intent_id) = changes.external_payment_intent_id {
            row.external_payment_intent_id = intent_id;
        }
        if let Some(charge_id) = changes.external_charge_id {
            row.external_charge_id = Some(charge_id);
        }
        if let Some(amount) = changes.amount_minor {
            row.amount_minor = amount;
        }
        if let Some(currency) = changes.currency {
            row.currency = currency;
        }
        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(description) = changes.description {
            row.description = Some(description);
        }
        if let Some(metadata) = changes.metadata {
            row.metadata = metadata;
        }
        row.updated_at = Utc::now();

        check_payment_keys(
            &state.payments,
            Some(payment_id),
            &row.external_payment_intent_id,
            row.procedure_id,
        )?;
        state.payments[index] = row.clone();
        Ok(row)
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryStore {
    async fn find_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<SubscriptionEntity>> {
        yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.user_id == user_id)
            .cloned())
    }

    async fn find_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> StoreResult<Option<SubscriptionEntity>> {
        yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.external_subscription_id == external_subscription_id)
            .cloned())
    }

    async fn replace_for_user(
        &self,
        subscription: UpsertSubscriptionEntity,
    ) -> StoreResult<SubscriptionEntity> {
        yield_now().await;
        let mut state = self.state.lock().unwrap();
        if state.failing_subscription_writes {
            return Err(StoreError::Internal(anyhow!("subscription write failed")));
        }
        let now = Utc::now();
        state.subscriptions.retain(|s| {
            s.user_id != subscription.user_id
                || s.external_subscription_id == subscription.external_subscription_id
        });
        if let Some(existing) = state
            .subscriptions
            .iter_mut()
            .find(|s| s.external_subscription_id == subscription.external_subscription_id)
        {
            existing.external_price_id = subscription.external_price_id;
            existing.status = subscription.status;
            existing.current_period_start = subscription.current_period_start;
            existing.current_period_end = subscription.current_period_end;
            existing.cancel_at_period_end = subscription.cancel_at_period_end;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        if state
            .subscriptions
            .iter()
            .any(|s| s.user_id == subscription.user_id)
        {
            return Err(StoreError::UniqueViolation("subscriptions_user_id_key".into()));
        }
        let row = SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: subscription.user_id,
            external_subscription_id: subscription.external_subscription_id,
            external_price_id: subscription.external_price_id,
            status: subscription.status,
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            cancel_at_period_end: subscription.cancel_at_period_end,
            created_at: now,
            updated_at: now,
        };
        state.subscriptions.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl PaymentProviderCustomerRepository for InMemoryStore {
    async fn find_customer_ref(
        &self,
        user_id: Uuid,
        provider: &str,
    ) -> StoreResult<Option<String>> {
        yield_now().await;
        let state = self.state.lock().unwrap();
        if state.failing_customer_lookups {
            return Err(StoreError::Internal(anyhow!("customer lookup failed")));
        }
        Ok(state
            .customers
            .iter()
            .find(|(user, p, _)| *user == user_id && p == provider)
            .map(|(_, _, customer)| customer.clone()))
    }

    async fn find_user_by_customer_ref(
        &self,
        provider: &str,
        customer_ref: &str,
    ) -> StoreResult<Option<Uuid>> {
        yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .customers
            .iter()
            .find(|(_, p, customer)| p == provider && customer == customer_ref)
            .map(|(user, _, _)| *user))
    }

    async fn upsert_customer_ref(
        &self,
        user_id: Uuid,
        provider: &str,
        customer_ref: &str,
    ) -> StoreResult<()> {
        yield_now().await;
        let mut state = self.state.lock().unwrap();
        state
            .customers
            .retain(|(user, p, _)| !(*user == user_id && p == provider));
        state
            .customers
            .push((user_id, provider.to_string(), customer_ref.to_string()));
        Ok(())
    }
}

#[async_trait]
impl DocumentRepository for InMemoryStore {
    async fn list_by_procedure(&self, procedure_id: Uuid) -> StoreResult<Vec<DocumentEntity>> {
        yield_now().await;
        Ok(self.documents(procedure_id))
    }

    async fn insert_document(
        &self,
        document: InsertDocumentEntity,
    ) -> StoreResult<DocumentEntity> {
        yield_now().await;
        let mut state = self.state.lock().unwrap();
        if state
            .documents
            .iter()
            .any(|d| d.procedure_id == document.procedure_id && d.signature == document.signature)
        {
            return Err(StoreError::UniqueViolation(
                "documents_procedure_id_signature_key".into(),
            ));
        }
        let row = DocumentEntity {
            id: Uuid::new_v4(),
            procedure_id: document.procedure_id,
            kind: document.kind,
            storage_key: document.storage_key,
            signature: document.signature,
            created_at: Utc::now(),
        };
        state.documents.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl CommentRepository for InMemoryStore {
    async fn find_by_signature(
        &self,
        procedure_id: Uuid,
        signature: &str,
    ) -> StoreResult<Option<CommentEntity>> {
        yield_now().await;
        Ok(self
            .comments(procedure_id)
            .into_iter()
            .find(|c| c.signature == signature))
    }

    async fn insert_comment(&self, comment: InsertCommentEntity) -> StoreResult<CommentEntity> {
        yield_now().await;
        let mut state = self.state.lock().unwrap();
        if state
            .comments
            .iter()
            .any(|c| c.procedure_id == comment.procedure_id && c.signature == comment.signature)
        {
            return Err(StoreError::UniqueViolation(
                "comments_procedure_id_signature_key".into(),
            ));
        }
        let row = CommentEntity {
            id: Uuid::new_v4(),
            procedure_id: comment.procedure_id,
            author_user_id: comment.author_user_id,
            body: comment.body,
            signature: comment.signature,
            created_at: Utc::now(),
        };
        state.comments.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl AppUserRepository for InMemoryStore {
    async fn find_email(&self, user_id: Uuid) -> StoreResult<Option<String>> {
        yield_now().await;
        Ok(self.state.lock().unwrap().users.get(&user_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// processor

#[derive(Default)]
struct GatewayScript {
    sessions: HashMap<String, CheckoutSession>,
    intents: HashMap<String, PaymentIntent>,
    charges: HashMap<String, Charge>,
    invoices: HashMap<String, Invoice>,
    subscriptions: HashMap<String, ProcessorSubscription>,
    invoice_items: HashMap<String, InvoiceItem>,
    by_idempotency_key: HashMap<String, String>,
    calls: Vec<String>,
    sequence: u32,
}

/// Processor double answering from scripted objects. Create calls honour
/// idempotency keys the way the real processor does.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<GatewayScript>,
    unavailable: AtomicBool,
}

impl ScriptedGateway {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn add_intent(
        &self,
        id: &str,
        status: IntentStatus,
        amount_minor: i64,
        metadata: Metadata,
    ) {
        let intent = PaymentIntent {
            id: id.to_string(),
            status,
            amount_minor,
            currency: "eur".to_string(),
            customer_id: Some("cus_owner".to_string()),
            latest_charge_id: Some(format!("ch_{id}")),
            description: Some("Debt recovery procedure".to_string()),
            metadata,
            last_payment_error: (status == IntentStatus::RequiresPaymentMethod)
                .then(|| "card_declined".to_string()),
        };
        let mut script = self.script.lock().unwrap();
        script.charges.insert(
            format!("ch_{id}"),
            Charge {
                id: format!("ch_{id}"),
                status: domain::value_objects::payment_processor::ChargeStatus::Failed,
                failure_message: Some("Your card was declined.".to_string()),
                receipt_url: None,
            },
        );
        script.intents.insert(id.to_string(), intent);
    }

    pub fn set_intent_status(&self, id: &str, status: IntentStatus) {
        let mut script = self.script.lock().unwrap();
        if let Some(intent) = script.intents.get_mut(id) {
            intent.status = status;
        }
    }

    pub fn clear_intent_customer(&self, id: &str) {
        let mut script = self.script.lock().unwrap();
        if let Some(intent) = script.intents.get_mut(id) {
            intent.customer_id = None;
        }
    }

    pub fn add_session(
        &self,
        id: &str,
        status: SessionStatus,
        payment_status: SessionPaymentStatus,
        intent_id: Option<&str>,
        metadata: Metadata,
    ) {
        self.script.lock().unwrap().sessions.insert(
            id.to_string(),
            CheckoutSession {
                id: id.to_string(),
                status,
                payment_status,
                payment_intent_id: intent_id.map(str::to_string),
                invoice_id: None,
                subscription_id: None,
                customer_id: Some("cus_owner".to_string()),
                amount_total_minor: None,
                currency: Some("eur".to_string()),
                metadata,
            },
        );
    }

    pub fn add_subscription(
        &self,
        id: &str,
        customer_id: &str,
        status: ProcessorSubscriptionStatus,
        created_secs: i64,
    ) {
        self.script.lock().unwrap().subscriptions.insert(
            id.to_string(),
            ProcessorSubscription {
                id: id.to_string(),
                customer_id: customer_id.to_string(),
                status,
                price_id: Some("price_addon".to_string()),
                current_period_start: None,
                current_period_end: None,
                cancel_at_period_end: false,
                created: Utc.timestamp_opt(created_secs, 0).unwrap(),
                metadata: Metadata::new(),
            },
        );
    }

    pub fn add_invoice(&self, id: &str, customer_id: &str, subscription_id: Option<&str>, created_secs: i64) {
        self.script.lock().unwrap().invoices.insert(
            id.to_string(),
            Invoice {
                id: id.to_string(),
                status: InvoiceStatus::Paid,
                customer_id: Some(customer_id.to_string()),
                subscription_id: subscription_id.map(str::to_string),
                payment_intent_id: None,
                created: Utc.timestamp_opt(created_secs, 0).unwrap(),
            },
        );
    }

    pub fn subscription(&self, id: &str) -> Option<ProcessorSubscription> {
        self.script.lock().unwrap().subscriptions.get(id).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == name).count()
    }

    fn begin(&self, call: &str) -> GatewayResult<std::sync::MutexGuard<'_, GatewayScript>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("scripted outage".into()));
        }
        let mut script = self.script.lock().unwrap();
        script.calls.push(call.to_string());
        Ok(script)
    }

    fn next_id(script: &mut GatewayScript, prefix: &str) -> String {
        script.sequence += 1;
        format!("{prefix}_gen_{}", script.sequence)
    }
}

#[derive(Deserialize)]
struct TestEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    object_id: String,
    #[serde(default)]
    metadata: Metadata,
    customer_id: Option<String>,
    subscription_id: Option<String>,
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn retrieve_checkout_session(&self, session_id: &str) -> GatewayResult<CheckoutSession> {
        yield_now().await;
        let script = self.begin("retrieve_checkout_session")?;
        script
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("checkout session {session_id}")))
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> GatewayResult<PaymentIntent> {
        yield_now().await;
        let script = self.begin("retrieve_payment_intent")?;
        script
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("payment intent {intent_id}")))
    }

    async fn retrieve_charge(&self, charge_id: &str) -> GatewayResult<Charge> {
        yield_now().await;
        let script = self.begin("retrieve_charge")?;
        script
            .charges
            .get(charge_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("charge {charge_id}")))
    }

    async fn retrieve_invoice(&self, invoice_id: &str) -> GatewayResult<Invoice> {
        yield_now().await;
        let script = self.begin("retrieve_invoice")?;
        script
            .invoices
            .get(invoice_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("invoice {invoice_id}")))
    }

    async fn list_invoices(&self, customer_id: &str) -> GatewayResult<Vec<Invoice>> {
        yield_now().await;
        let script = self.begin("list_invoices")?;
        Ok(script
            .invoices
            .values()
            .filter(|invoice| invoice.customer_id.as_deref() == Some(customer_id))
            .cloned()
            .collect())
    }

    async fn create_invoice_item(&self, request: InvoiceItemRequest) -> GatewayResult<InvoiceItem> {
        yield_now().await;
        let mut script = self.begin("create_invoice_item")?;
        if let Some(id) = script.by_idempotency_key.get(&request.idempotency_key).cloned() {
            return Ok(script.invoice_items[&id].clone());
        }
        let id = Self::next_id(&mut script, "ii");
        let item = InvoiceItem {
            id: id.clone(),
            invoice_id: None,
        };
        script.invoice_items.insert(id.clone(), item.clone());
        script.by_idempotency_key.insert(request.idempotency_key, id);
        Ok(item)
    }

    async fn create_invoice(&self, request: InvoiceRequest) -> GatewayResult<Invoice> {
        yield_now().await;
        let mut script = self.begin("create_invoice")?;
        if let Some(id) = script.by_idempotency_key.get(&request.idempotency_key).cloned() {
            return Ok(script.invoices[&id].clone());
        }
        let id = Self::next_id(&mut script, "in");
        let invoice = Invoice {
            id: id.clone(),
            status: InvoiceStatus::Draft,
            customer_id: Some(request.customer_id),
            subscription_id: None,
            payment_intent_id: None,
            created: Utc::now(),
        };
        script.invoices.insert(id.clone(), invoice.clone());
        script.by_idempotency_key.insert(request.idempotency_key, id);
        Ok(invoice)
    }

    async fn finalize_invoice(&self, invoice_id: &str) -> GatewayResult<Invoice> {
        yield_now().await;
        let mut script = self.begin("finalize_invoice")?;
        let invoice = script
            .invoices
            .get_mut(invoice_id)
            .ok_or_else(|| GatewayError::NotFound(format!("invoice {invoice_id}")))?;
        invoice.status = InvoiceStatus::Open;
        Ok(invoice.clone())
    }

    async fn create_subscription(
        &self,
        request: SubscriptionRequest,
    ) -> GatewayResult<ProcessorSubscription> {
        yield_now().await;
        let mut script = self.begin("create_subscription")?;
        if let Some(id) = script.by_idempotency_key.get(&request.idempotency_key).cloned() {
            return Ok(script.subscriptions[&id].clone());
        }
        let id = Self::next_id(&mut script, "sub");
        let subscription = ProcessorSubscription {
            id: id.clone(),
            customer_id: request.customer_id,
            status: ProcessorSubscriptionStatus::Active,
            price_id: Some(request.price_id),
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            created: Utc::now(),
            metadata: request.metadata,
        };
        script.subscriptions.insert(id.clone(), subscription.clone());
        script.by_idempotency_key.insert(request.idempotency_key, id);
        Ok(subscription)
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> GatewayResult<()> {
        yield_now().await;
        let mut script = self.begin("cancel_subscription")?;
        let subscription = script
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| GatewayError::NotFound(format!("subscription {subscription_id}")))?;
        subscription.status = ProcessorSubscriptionStatus::Canceled;
        Ok(())
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> GatewayResult<ProcessorSubscription> {
        yield_now().await;
        let script = self.begin("retrieve_subscription")?;
        script
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("subscription {subscription_id}")))
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
        filter: SubscriptionListFilter,
    ) -> GatewayResult<Vec<ProcessorSubscription>> {
        yield_now().await;
        let script = self.begin("list_subscriptions")?;
        Ok(script
            .subscriptions
            .values()
            .filter(|s| s.customer_id == customer_id)
            .filter(|s| {
                filter == SubscriptionListFilter::All
                    || matches!(
                        s.status,
                        ProcessorSubscriptionStatus::Active | ProcessorSubscriptionStatus::Trialing
                    )
            })
            .cloned()
            .collect())
    }

    fn verify_webhook(
        &self,
        payload: &str,
        signature_header: &str,
    ) -> GatewayResult<ProcessorEvent> {
        if signature_header != VALID_SIGNATURE {
            return Err(GatewayError::InvalidSignature);
        }
        let event: TestEvent = serde_json::from_str(payload)
            .map_err(|err| GatewayError::InvalidPayload(err.to_string()))?;
        Ok(ProcessorEvent {
            id: event.id,
            kind: ProcessorEventKind::from_type(&event.event_type),
            object_id: event.object_id,
            metadata: event.metadata,
            customer_id: event.customer_id,
            subscription_id: event.subscription_id,
        })
    }
}

// ---------------------------------------------------------------------------
// notifications

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        yield_now().await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("mailer unavailable"));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// wiring

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub reconciliation: Arc<PaymentReconciliationUseCase>,
    pub injunction: Arc<InjunctionPaymentUseCase>,
    pub subscriptions: Arc<SubscriptionSyncUseCase>,
    pub actions: ProcedureActionsUseCase,
    pub scheduler: TemporalTransitionsUseCase,
    pub events: ProcessorEventsUseCase,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::default());
        let gateway = Arc::new(ScriptedGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let gateway_port: Arc<dyn PaymentGateway + Send + Sync> = gateway.clone();
        let procedures: Arc<dyn ProcedureRepository + Send + Sync> = store.clone();
        let payments: Arc<dyn PaymentRepository + Send + Sync> = store.clone();
        let customers: Arc<dyn PaymentProviderCustomerRepository + Send + Sync> = store.clone();
        let documents: Arc<dyn DocumentRepository + Send + Sync> = store.clone();
        let comments: Arc<dyn CommentRepository + Send + Sync> = store.clone();

        let transitions = Arc::new(ProcedureTransitions::new(
            Arc::clone(&procedures),
            LifecyclePolicy::default(),
        ));
        let subscriptions = Arc::new(SubscriptionSyncUseCase::new(
            store.clone(),
            Arc::clone(&customers),
            Arc::clone(&procedures),
            Arc::clone(&gateway_port),
            BillingConfig {
                subscription_price_id: "price_addon".to_string(),
                notice_fee_minor: 2_500,
                currency: "eur".to_string(),
            },
        ));
        let reconciliation = Arc::new(PaymentReconciliationUseCase::new(
            Arc::clone(&gateway_port),
            Arc::clone(&payments),
            Arc::clone(&procedures),
            Arc::clone(&customers),
            Arc::clone(&transitions),
            Arc::clone(&subscriptions),
        ));
        let injunction = Arc::new(InjunctionPaymentUseCase::new(
            Arc::clone(&gateway_port),
            Arc::clone(&payments),
            Arc::clone(&procedures),
            Arc::clone(&documents),
            Arc::clone(&comments),
            Arc::clone(&transitions),
        ));
        let actions = ProcedureActionsUseCase::new(
            Arc::clone(&transitions),
            Arc::clone(&procedures),
            documents,
            comments,
        );
        let scheduler = TemporalTransitionsUseCase::new(
            Arc::clone(&procedures),
            store.clone(),
            notifier.clone(),
            Arc::clone(&transitions),
        );
        let events = ProcessorEventsUseCase::new(
            gateway_port,
            Arc::clone(&reconciliation),
            Arc::clone(&injunction),
            Arc::clone(&subscriptions),
        );

        Self {
            store,
            gateway,
            notifier,
            reconciliation,
            injunction,
            subscriptions,
            actions,
            scheduler,
            events,
        }
    }
}
