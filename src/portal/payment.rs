//! Payment activation and its HMAC-SHA1 authorization token
//!
//! The payment service authenticates callers with
//! `ASC {public_key}:{timestamp}:{signature}` where `signature` is the
//! URL-safe, unpadded base64 HMAC-SHA1 of `"{timestamp}\n{public_key}"`
//! under the shared machine key. The timestamp is UTC
//! `yyyyMMddHHmmss`, so tokens built within one second are identical.

use super::http::{Envelope, PortalApi, read_json};
use crate::config::PortalConfig;
use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha1::Sha1;
use tracing::{debug, info};

type HmacSha1 = Hmac<Sha1>;

const OHIO_REGION: &str = "us-east-2";

/// Base64url HMAC-SHA1 of `message`, without padding.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the key is rejected.
pub fn sign(secret: &str, message: &str) -> Result<String> {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|e| Error::Signing(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Payment `Authorization` header value for instant `at`.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the key is rejected.
pub fn create_token(secret: &str, public_key: &str, at: DateTime<Utc>) -> Result<String> {
    let timestamp = at.format("%Y%m%d%H%M%S").to_string();
    let signature = sign(secret, &format!("{timestamp}\n{public_key}"))?;
    Ok(format!("ASC {public_key}:{timestamp}:{signature}"))
}

/// Identifier of a tenant on the payment side.
#[must_use]
pub fn payment_portal_id(aws_region: Option<&str>, tenant_id: u64) -> String {
    if aws_region == Some(OHIO_REGION) {
        format!("docspace.io.ohio{tenant_id}")
    } else {
        format!("docspace.io{tenant_id}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalInfo {
    pub tenant_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPortalInfo {
    tenant_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRefresh {
    pub tariff: Value,
    pub quota: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: Value,
    pub refresh: PaymentRefresh,
}

/// Activates a paid plan on a provisioned portal.
pub struct PaymentApi {
    api: PortalApi,
    payment_url: String,
    machine_key: String,
    public_key: String,
    customer_email: String,
    aws_region: Option<String>,
}

impl PaymentApi {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `MACHINEKEY` or `PKEY` is missing.
    pub fn new(api: PortalApi, config: &PortalConfig) -> Result<Self> {
        let machine_key = config
            .machine_key
            .clone()
            .ok_or_else(|| Error::Config("MACHINEKEY not set".to_string()))?;
        let public_key = config
            .public_key
            .clone()
            .ok_or_else(|| Error::Config("PKEY not set".to_string()))?;

        Ok(Self {
            api,
            payment_url: config.payment_url.trim_end_matches('/').to_string(),
            machine_key,
            public_key,
            customer_email: config.admin.email.clone(),
            aws_region: config.aws_region.clone(),
        })
    }

    /// Token for the current second.
    ///
    /// # Errors
    ///
    /// See [`create_token`].
    pub fn token(&self) -> Result<String> {
        create_token(&self.machine_key, &self.public_key, Utc::now())
    }

    /// # Errors
    ///
    /// Returns an error on a non-2xx response or a body without
    /// `tenantId`.
    pub async fn portal_info(&self) -> Result<PortalInfo> {
        let response = self.api.get("portal").send().await?;
        let info: Envelope<RawPortalInfo> =
            read_json(response, "Failed to get portal info").await?;

        let tenant_id = info.response.tenant_id.ok_or_else(|| {
            Error::Api("TenantId not found in portal info response".to_string())
        })?;
        Ok(PortalInfo { tenant_id })
    }

    /// # Errors
    ///
    /// Returns an error if signing fails or the payment service rejects
    /// the call.
    pub async fn make_payment(&self, tenant_id: u64, quantity: u32) -> Result<Value> {
        let portal_id = payment_portal_id(self.aws_region.as_deref(), tenant_id);
        debug!("Paying for {} ({} seats)", portal_id, quantity);

        let response = self
            .api
            .client()
            .post(format!("{}/api/license/setdspsaaspaid", self.payment_url))
            .header(reqwest::header::AUTHORIZATION, self.token()?)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&json!({
                "portalId": portal_id,
                "customerEmail": self.customer_email,
                "quantity": quantity,
            }))
            .send()
            .await?;
        read_json(response, "Payment failed").await
    }

    /// Make the portal re-read its tariff and quota
    ///
    /// # Errors
    ///
    /// Returns an error on a non-2xx response.
    pub async fn refresh_payment_info(&self) -> Result<PaymentRefresh> {
        let response = self
            .api
            .get("portal/tariff")
            .query(&[("refresh", true)])
            .send()
            .await?;
        let tariff = read_json(response, "Failed to refresh tariff info").await?;

        let response = self
            .api
            .get("portal/payment/quota")
            .query(&[("refresh", true)])
            .send()
            .await?;
        let quota = read_json(response, "Failed to refresh quota info").await?;

        Ok(PaymentRefresh { tariff, quota })
    }

    /// Look up the tenant, pay for `quantity` seats, refresh
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn setup_payment(&self, quantity: u32) -> Result<PaymentOutcome> {
        let info = self.portal_info().await?;
        let payment = self.make_payment(info.tenant_id, quantity).await?;
        let refresh = self.refresh_payment_info().await?;

        info!("Payment activated for tenant {}", info.tenant_id);
        Ok(PaymentOutcome { payment, refresh })
    }
}
