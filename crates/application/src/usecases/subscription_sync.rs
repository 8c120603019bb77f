use std::{cmp::Reverse, collections::HashMap, sync::Arc};

use domain::{
    entities::subscriptions::{SubscriptionEntity, UpsertSubscriptionEntity},
    repositories::{
        payment_gateway::{GatewayError, PaymentGateway},
        payment_provider_customers::PaymentProviderCustomerRepository,
        procedures::ProcedureRepository,
        store_error::{StoreError, StoreResult},
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        billing::{BillingConfig, STRIPE_PROVIDER},
        payment_processor::{
            InvoiceItemRequest, InvoiceRequest, ProcessorSubscription, SubscriptionListFilter,
            SubscriptionRequest, metadata_keys,
        },
    },
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_UPSERT_ATTEMPTS: usize = 2;

#[derive(Debug, Error)]
pub enum SubscriptionSyncError {
    #[error("payment processor unavailable: {0}")]
    ProcessorUnavailable(String),
    #[error(transparent)]
    Processor(GatewayError),
    #[error("no subscription found for user {0}")]
    NotFound(Uuid),
    #[error("user {0} has no billing customer at the payment processor")]
    MissingCustomer(Uuid),
    #[error("procedure {0} not found")]
    ProcedureNotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<GatewayError> for SubscriptionSyncError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(reason) => SubscriptionSyncError::ProcessorUnavailable(reason),
            other => SubscriptionSyncError::Processor(other),
        }
    }
}

impl SubscriptionSyncError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubscriptionSyncError::ProcessorUnavailable(_) | SubscriptionSyncError::Store(_)
        )
    }
}

pub type SyncResult<T> = Result<T, SubscriptionSyncError>;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncedSubscription {
    pub subscription: SubscriptionEntity,
    /// `false` when the row could not be confirmed against the processor.
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NoticeFeeOutcome {
    NotApplicable,
    AlreadyBilled {
        item_ref: String,
    },
    Billed {
        item_ref: String,
        invoice_id: Option<String>,
        on_subscription: bool,
    },
}

pub struct SubscriptionSyncUseCase {
    subscriptions: Arc<dyn SubscriptionRepository + Send + Sync>,
    customers: Arc<dyn PaymentProviderCustomerRepository + Send + Sync>,
    procedures: Arc<dyn ProcedureRepository + Send + Sync>,
    gateway: Arc<dyn PaymentGateway + Send + Sync>,
    billing: BillingConfig,
}

impl SubscriptionSyncUseCase {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository + Send + Sync>,
        customers: Arc<dyn PaymentProviderCustomerRepository + Send + Sync>,
        procedures: Arc<dyn ProcedureRepository + Send + Sync>,
        gateway: Arc<dyn PaymentGateway + Send + Sync>,
        billing: BillingConfig,
    ) -> Self {
        Self {
            subscriptions,
            customers,
            procedures,
            gateway,
            billing,
        }
    }

    /// Refreshes the user's subscription from the processor.
    ///
    /// Lookup order: the stored external id, the billing customer's subscriptions,
    /// then back-references on the customer's recent invoices. When the processor
    /// has nothing (or is unreachable) the stored row is returned with `fresh = false`.
    pub async fn sync_subscription(&self, user_id: Uuid) -> SyncResult<SyncedSubscription> {
        info!(%user_id, "subscriptions: sync requested");
        let local = self.subscriptions.find_by_user_id(user_id).await?;

        match self.find_remote(user_id, local.as_ref()).await {
            Ok(Some(remote)) => {
                let subscription = self.upsert(user_id, remote).await?;
                info!(
                    %user_id,
                    external_subscription_id = %subscription.external_subscription_id,
                    status = %subscription.status,
                    "subscriptions: synced"
                );
                Ok(SyncedSubscription {
                    subscription,
                    fresh: true,
                })
            }
            Ok(None) => match local {
                Some(subscription) => {
                    warn!(%user_id, "subscriptions: processor has no subscription, keeping stored row");
                    Ok(SyncedSubscription {
                        subscription,
                        fresh: false,
                    })
                }
                None => Err(SubscriptionSyncError::NotFound(user_id)),
            },
            Err(SubscriptionSyncError::ProcessorUnavailable(reason)) => match local {
                Some(subscription) => {
                    warn!(%user_id, %reason, "subscriptions: processor unreachable, serving stored row");
                    Ok(SyncedSubscription {
                        subscription,
                        fresh: false,
                    })
                }
                None => Err(SubscriptionSyncError::ProcessorUnavailable(reason)),
            },
            Err(err) => Err(err),
        }
    }

    async fn find_remote(
        &self,
        user_id: Uuid,
        local: Option<&SubscriptionEntity>,
    ) -> SyncResult<Option<ProcessorSubscription>> {
        if let Some(row) = local {
            match self
                .gateway
                .retrieve_subscription(&row.external_subscription_id)
                .await
            {
                Ok(remote) => return Ok(Some(remote)),
                Err(GatewayError::NotFound(_)) => warn!(
                    %user_id,
                    external_subscription_id = %row.external_subscription_id,
                    "subscriptions: stored subscription unknown to processor"
                ),
                Err(err) => return Err(err.into()),
            }
        }

        let customer_id = match self
            .customers
            .find_customer_ref(user_id, STRIPE_PROVIDER)
            .await
        {
            Ok(Some(customer_id)) => customer_id,
            Ok(None) => return Ok(None),
            Err(err) => {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load customer ref");
                return Err(err.into());
            }
        };

        let listed = self
            .gateway
            .list_subscriptions(&customer_id, SubscriptionListFilter::All)
            .await?;
        if let Some(best) = pick_subscription(listed) {
            return Ok(Some(best));
        }

        let mut invoices = self.gateway.list_invoices(&customer_id).await?;
        invoices.sort_by_key(|invoice| Reverse(invoice.created));
        if let Some(subscription_id) = invoices
            .into_iter()
            .find_map(|invoice| invoice.subscription_id)
        {
            info!(%user_id, %subscription_id, "subscriptions: found through invoice back-reference");
            let remote = self.gateway.retrieve_subscription(&subscription_id).await?;
            return Ok(Some(remote));
        }

        Ok(None)
    }

    /// Keyed by external id; a different subscription stored for the same user is
    /// replaced atomically, so a failed write leaves the previous row in place.
    async fn upsert(
        &self,
        user_id: Uuid,
        remote: ProcessorSubscription,
    ) -> StoreResult<SubscriptionEntity> {
        let row = UpsertSubscriptionEntity {
            user_id,
            external_subscription_id: remote.id.clone(),
            external_price_id: remote.price_id.clone(),
            status: remote.status.to_local(),
            current_period_start: remote.current_period_start,
            current_period_end: remote.current_period_end,
            cancel_at_period_end: remote.cancel_at_period_end,
        };

        let mut last_err = None;
        for _ in 0..MAX_UPSERT_ATTEMPTS {
            match self.subscriptions.replace_for_user(row.clone()).await {
                Ok(saved) => return Ok(saved),
                Err(StoreError::UniqueViolation(constraint)) => {
                    warn!(%user_id, %constraint, "subscriptions: upsert raced, retrying");
                    last_err = Some(StoreError::UniqueViolation(constraint));
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(saved) = self
            .subscriptions
            .find_by_external_id(&row.external_subscription_id)
            .await?
        {
            return Ok(saved);
        }
        Err(last_err.unwrap_or(StoreError::StaleWrite))
    }

    /// Ensures the user has one live subscription for the add-on; reuses an existing one.
    pub async fn provision_subscription(
        &self,
        user_id: Uuid,
        procedure_id: Uuid,
    ) -> SyncResult<SyncedSubscription> {
        if let Some(existing) = self.subscriptions.find_by_user_id(user_id).await? {
            if existing.status.is_live() {
                info!(
                    %user_id,
                    %procedure_id,
                    external_subscription_id = %existing.external_subscription_id,
                    "subscriptions: live subscription already provisioned"
                );
                return Ok(SyncedSubscription {
                    subscription: existing,
                    fresh: false,
                });
            }

            if let Err(err) = self
                .gateway
                .cancel_subscription(&existing.external_subscription_id)
                .await
            {
                warn!(
                    %user_id,
                    external_subscription_id = %existing.external_subscription_id,
                    error = %err,
                    "subscriptions: cancel of lingering subscription failed"
                );
            }
            // The stored row stays until the new subscription replaces it.
        }

        let customer_id = self
            .customers
            .find_customer_ref(user_id, STRIPE_PROVIDER)
            .await?
            .ok_or(SubscriptionSyncError::MissingCustomer(user_id))?;

        let metadata = HashMap::from([
            (metadata_keys::USER_ID.to_string(), user_id.to_string()),
            (metadata_keys::PROCEDURE_ID.to_string(), procedure_id.to_string()),
        ]);
        let remote = self
            .gateway
            .create_subscription(SubscriptionRequest {
                customer_id,
                price_id: self.billing.subscription_price_id.clone(),
                metadata,
                idempotency_key: format!("subscription-{user_id}-{procedure_id}"),
            })
            .await?;

        let subscription = self.upsert(user_id, remote).await?;
        info!(
            %user_id,
            %procedure_id,
            external_subscription_id = %subscription.external_subscription_id,
            "subscriptions: provisioned"
        );
        Ok(SyncedSubscription {
            subscription,
            fresh: true,
        })
    }

    /// Bills the formal notice fee once per procedure, on the live billing cycle when
    /// there is one, otherwise as a one-off invoice.
    pub async fn bill_notice_fee(&self, procedure_id: Uuid) -> SyncResult<NoticeFeeOutcome> {
        let procedure = self
            .procedures
            .find_by_id(procedure_id)
            .await?
            .ok_or(SubscriptionSyncError::ProcedureNotFound(procedure_id))?;

        if !procedure.notice_flag {
            return Ok(NoticeFeeOutcome::NotApplicable);
        }
        if let Some(item_ref) = procedure.notice_fee_item_ref {
            return Ok(NoticeFeeOutcome::AlreadyBilled { item_ref });
        }

        let owner = procedure.owner_user_id;
        let customer_id = self
            .customers
            .find_customer_ref(owner, STRIPE_PROVIDER)
            .await?
            .ok_or(SubscriptionSyncError::MissingCustomer(owner))?;
        let billing_subscription = self
            .subscriptions
            .find_by_user_id(owner)
            .await?
            .filter(|subscription| subscription.status.is_billable());

        let metadata = HashMap::from([(
            metadata_keys::PROCEDURE_ID.to_string(),
            procedure_id.to_string(),
        )]);
        let description = "Formal notice fee".to_string();

        let item = self
            .gateway
            .create_invoice_item(InvoiceItemRequest {
                customer_id: customer_id.clone(),
                amount_minor: self.billing.notice_fee_minor,
                currency: self.billing.currency.clone(),
                description: description.clone(),
                subscription_id: billing_subscription
                    .as_ref()
                    .map(|subscription| subscription.external_subscription_id.clone()),
                metadata: metadata.clone(),
                idempotency_key: format!("notice-fee-{procedure_id}"),
            })
            .await?;

        let invoice_id = if billing_subscription.is_none() {
            let invoice = self
                .gateway
                .create_invoice(InvoiceRequest {
                    customer_id,
                    description,
                    metadata,
                    idempotency_key: format!("notice-fee-invoice-{procedure_id}"),
                })
                .await?;
            let finalized = self.gateway.finalize_invoice(&invoice.id).await?;
            Some(finalized.id)
        } else {
            None
        };

        if !self
            .procedures
            .set_notice_fee_item_ref(procedure_id, &item.id)
            .await?
        {
            warn!(%procedure_id, item_ref = %item.id, "subscriptions: notice fee already recorded by another run");
        }
        info!(
            %procedure_id,
            item_ref = %item.id,
            on_subscription = billing_subscription.is_some(),
            "subscriptions: notice fee billed"
        );

        Ok(NoticeFeeOutcome::Billed {
            item_ref: item.id,
            invoice_id,
            on_subscription: billing_subscription.is_some(),
        })
    }

    /// Webhook entry for subscription lifecycle events.
    pub async fn apply_processor_subscription(
        &self,
        external_subscription_id: &str,
    ) -> SyncResult<Option<SubscriptionEntity>> {
        let remote = self
            .gateway
            .retrieve_subscription(external_subscription_id)
            .await?;

        let user_id = match remote
            .metadata
            .get(metadata_keys::USER_ID)
            .and_then(|raw| Uuid::parse_str(raw).ok())
        {
            Some(user_id) => Some(user_id),
            None => match self
                .customers
                .find_user_by_customer_ref(STRIPE_PROVIDER, &remote.customer_id)
                .await?
            {
                Some(user_id) => Some(user_id),
                None => self
                    .subscriptions
                    .find_by_external_id(external_subscription_id)
                    .await?
                    .map(|row| row.user_id),
            },
        };

        let Some(user_id) = user_id else {
            warn!(
                external_subscription_id,
                customer_id = %remote.customer_id,
                "subscriptions: no local user for processor subscription"
            );
            return Ok(None);
        };

        self.upsert(user_id, remote).await.map(Some).map_err(Into::into)
    }
}

/// Active or trialing first, then incomplete, then anything; newest wins ties.
fn pick_subscription(candidates: Vec<ProcessorSubscription>) -> Option<ProcessorSubscription> {
    candidates
        .into_iter()
        .min_by_key(|subscription| (subscription.status.selection_rank(), Reverse(subscription.created)))
}
