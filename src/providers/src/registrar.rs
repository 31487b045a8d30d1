//! Registrar provider client (§4.1, §6 "Registrar request" wire format).
//!
//! Namecheap-shaped: requests are XML-encoded form-urlencoded GETs, responses
//! are XML. Retryable network/timeout/rate-limit failures go through
//! [`crate::retry::with_backoff`] at the call site, not inside this client.

use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::http::shared_client;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

/// All four contact roles (registrant/admin/tech/billing) are populated from
/// a single record per §4.3 `registering_domain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub city: String,
    pub state_province: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    pub email: String,
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub available: bool,
    pub premium: bool,
    pub premium_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResult {
    pub domain: String,
    pub charged_amount: f64,
    pub order_id: String,
    pub transaction_id: String,
}

#[async_trait]
pub trait Registrar: Send + Sync {
    async fn check(&self, domain: &str) -> ProviderResult<CheckResult>;
    async fn register(
        &self,
        domain: &str,
        years: u32,
        contacts: &Contact,
    ) -> ProviderResult<RegisterResult>;
    async fn set_custom_nameservers(
        &self,
        domain: &str,
        nameservers: &[String],
    ) -> ProviderResult<()>;
}

pub struct NamecheapRegistrar {
    api_key: String,
    username: String,
    client_ip: String,
    base_url: String,
    http: reqwest::Client,
}

impl NamecheapRegistrar {
    pub fn new(api_key: String, username: String, client_ip: String, sandbox: bool) -> Self {
        let base_url = if sandbox {
            "https://api.sandbox.namecheap.com/xml.response".to_string()
        } else {
            "https://api.namecheap.com/xml.response".to_string()
        };
        Self {
            api_key,
            username,
            client_ip,
            base_url,
            http: shared_client(),
        }
    }

    fn base_params(&self, command: &str) -> Vec<(String, String)> {
        vec![
            ("ApiUser".into(), self.username.clone()),
            ("ApiKey".into(), self.api_key.clone()),
            ("UserName".into(), self.username.clone()),
            ("ClientIp".into(), self.client_ip.clone()),
            ("Command".into(), command.into()),
        ]
    }

    async fn call(&self, params: &[(String, String)]) -> ProviderResult<String> {
        let response = self
            .http
            .get(&self.base_url)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.map_err(ProviderError::from)?;

        if status.as_u16() == 429 {
            return Err(ProviderError::new(ProviderErrorKind::RateLimited, "namecheap rate limited")
                .with_status(429));
        }
        if !status.is_success() {
            return Err(ProviderError::upstream_failure(format!(
                "namecheap returned {status}"
            ))
            .with_status(status.as_u16()));
        }

        if xml_response_status(&body)? != "OK" {
            let message = xml_error_message(&body).unwrap_or_else(|| "unknown namecheap error".into());
            return Err(ProviderError::upstream_invalid(message));
        }

        Ok(body)
    }
}

#[async_trait]
impl Registrar for NamecheapRegistrar {
    async fn check(&self, domain: &str) -> ProviderResult<CheckResult> {
        let mut params = self.base_params("namecheap.domains.check");
        params.push(("DomainList".into(), domain.into()));
        let body = self.call(&params).await?;

        let available = xml_attr_bool(&body, "DomainCheckResult", "Available")
            .ok_or_else(|| ProviderError::upstream_invalid("missing Available attribute"))?;
        let premium = xml_attr_bool(&body, "DomainCheckResult", "IsPremiumName").unwrap_or(false);
        let premium_price = if premium {
            xml_attr_f64(&body, "DomainCheckResult", "PremiumRegistrationPrice")
        } else {
            None
        };

        Ok(CheckResult {
            available,
            premium,
            premium_price,
        })
    }

    async fn register(
        &self,
        domain: &str,
        years: u32,
        contacts: &Contact,
    ) -> ProviderResult<RegisterResult> {
        let mut params = self.base_params("namecheap.domains.create");
        params.push(("DomainName".into(), domain.into()));
        params.push(("Years".into(), years.to_string()));
        for role in ["Registrant", "Tech", "Admin", "AuxBilling"] {
            params.push((format!("{role}FirstName"), contacts.first_name.clone()));
            params.push((format!("{role}LastName"), contacts.last_name.clone()));
            params.push((format!("{role}Address1"), contacts.address1.clone()));
            params.push((format!("{role}City"), contacts.city.clone()));
            params.push((format!("{role}StateProvince"), contacts.state_province.clone()));
            params.push((format!("{role}PostalCode"), contacts.postal_code.clone()));
            params.push((format!("{role}Country"), contacts.country.clone()));
            params.push((format!("{role}Phone"), contacts.phone.clone()));
            params.push((format!("{role}EmailAddress"), contacts.email.clone()));
        }

        let body = self.call(&params).await?;

        let charged_amount = xml_attr_f64(&body, "DomainCreateResult", "ChargedAmount").unwrap_or(0.0);
        let order_id = xml_attr(&body, "DomainCreateResult", "OrderID").unwrap_or_default();
        let transaction_id = xml_attr(&body, "DomainCreateResult", "TransactionID").unwrap_or_default();

        Ok(RegisterResult {
            domain: domain.to_string(),
            charged_amount,
            order_id,
            transaction_id,
        })
    }

    async fn set_custom_nameservers(
        &self,
        domain: &str,
        nameservers: &[String],
    ) -> ProviderResult<()> {
        let (sld, tld) = domain
            .split_once('.')
            .ok_or_else(|| ProviderError::upstream_invalid("malformed domain"))?;
        let mut params = self.base_params("namecheap.domains.dns.setCustom");
        params.push(("SLD".into(), sld.into()));
        params.push(("TLD".into(), tld.into()));
        params.push(("Nameservers".into(), nameservers.join(",")));

        self.call(&params).await?;
        Ok(())
    }
}

fn xml_response_status(body: &str) -> ProviderResult<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"ApiResponse" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"Status" {
                        return Ok(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
                return Ok("ERROR".to_string());
            }
            Ok(Event::Eof) => return Err(ProviderError::upstream_invalid("no ApiResponse element")),
            Err(e) => return Err(ProviderError::upstream_invalid(e.to_string())),
            _ => continue,
        }
    }
}

fn xml_error_message(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut in_errors = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"Errors" => in_errors = true,
            Ok(Event::Text(t)) if in_errors => {
                return Some(t.unescape().ok()?.into_owned());
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => continue,
        }
    }
}

fn xml_attr(body: &str, element: &str, attr_name: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == element.as_bytes() => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == attr_name.as_bytes() {
                        return Some(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
                return None;
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => continue,
        }
    }
}

fn xml_attr_bool(body: &str, element: &str, attr_name: &str) -> Option<bool> {
    xml_attr(body, element, attr_name).map(|v| v.eq_ignore_ascii_case("true"))
}

fn xml_attr_f64(body: &str, element: &str, attr_name: &str) -> Option<f64> {
    xml_attr(body, element, attr_name).and_then(|v| v.parse().ok())
}
