//! Customer email delivery.
//!
//! Messages are rendered from Askama templates (HTML + plain text) and sent
//! over SMTP via lettre. Without SMTP configuration every message is written
//! to the log instead and reported as [`Delivery::Logged`].

use askama::Template;
use chrono::{Datelike, Duration, Utc};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

use webshop_crm_core::{EmailStatus, InteractionType};

use crate::config::EmailConfig;
use crate::db::{CustomerRepository, EmailLogRepository, RepositoryError};
use crate::models::{Customer, EmailLog, NewEmailLog, NewInteraction};

/// Templates selectable through the email API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    #[default]
    Default,
    Welcome,
    OrderConfirmation,
    Marketing,
    ShippingNotification,
}

impl EmailTemplate {
    pub const ALL: &'static [Self] = &[
        Self::Default,
        Self::Welcome,
        Self::OrderConfirmation,
        Self::Marketing,
        Self::ShippingNotification,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Welcome => "welcome",
            Self::OrderConfirmation => "order_confirmation",
            Self::Marketing => "marketing",
            Self::ShippingNotification => "shipping_notification",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Default => "Plain message with greeting and signature",
            Self::Welcome => "Welcome message for new customers",
            Self::OrderConfirmation => "Order received confirmation",
            Self::Marketing => "Promotional offer, valid for 7 days",
            Self::ShippingNotification => "Shipment and tracking notification",
        }
    }
}

/// Fields shared by every customer-facing template.
struct CustomerContext<'a> {
    subject: &'a str,
    company: &'a str,
    year: i32,
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    message: &'a str,
    valid_until: String,
}

/// Declares an Askama template struct over [`CustomerContext`] fields.
macro_rules! customer_template {
    ($name:ident, $path:literal) => {
        #[derive(Template)]
        #[template(path = $path)]
        struct $name<'a> {
            subject: &'a str,
            company: &'a str,
            year: i32,
            first_name: &'a str,
            last_name: &'a str,
            email: &'a str,
            message: &'a str,
            valid_until: &'a str,
        }

        impl<'a> From<&'a CustomerContext<'a>> for $name<'a> {
            fn from(ctx: &'a CustomerContext<'a>) -> Self {
                Self {
                    subject: ctx.subject,
                    company: ctx.company,
                    year: ctx.year,
                    first_name: ctx.first_name,
                    last_name: ctx.last_name,
                    email: ctx.email,
                    message: ctx.message,
                    valid_until: &ctx.valid_until,
                }
            }
        }
    };
}

customer_template!(DefaultHtml, "email/default.html");
customer_template!(DefaultText, "email/default.txt");
customer_template!(WelcomeHtml, "email/welcome.html");
customer_template!(WelcomeText, "email/welcome.txt");
customer_template!(OrderConfirmationHtml, "email/order_confirmation.html");
customer_template!(OrderConfirmationText, "email/order_confirmation.txt");
customer_template!(MarketingHtml, "email/marketing.html");
customer_template!(MarketingText, "email/marketing.txt");
customer_template!(ShippingNotificationHtml, "email/shipping_notification.html");
customer_template!(ShippingNotificationText, "email/shipping_notification.txt");

/// HTML template for the portal verification link.
#[derive(Template)]
#[template(path = "email/verification.html")]
struct VerificationHtml<'a> {
    subject: &'a str,
    company: &'a str,
    year: i32,
    first_name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/verification.txt")]
struct VerificationText<'a> {
    first_name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    subject: &'a str,
    company: &'a str,
    year: i32,
    first_name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    first_name: &'a str,
    link: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A rendered message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub html: String,
    pub text: String,
}

/// How a message left the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No SMTP transport; written to the log only.
    Logged,
}

impl From<Delivery> for EmailStatus {
    fn from(delivery: Delivery) -> Self {
        match delivery {
            Delivery::Sent => Self::Sent,
            Delivery::Logged => Self::Logged,
        }
    }
}

#[derive(Clone)]
struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

/// Email service for transactional and customer emails.
#[derive(Clone)]
pub struct EmailService {
    transport: Option<SmtpTransport>,
    company: String,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("smtp", &self.transport.is_some())
            .field("company", &self.company)
            .finish()
    }
}

impl EmailService {
    /// Create the service. Without `config` messages are only logged.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be set up.
    pub fn new(config: Option<&EmailConfig>, company: &str) -> Result<Self, SmtpError> {
        let transport = config
            .map(|config| -> Result<SmtpTransport, SmtpError> {
                let credentials = Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.expose_secret().to_string(),
                );

                let mailer =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                        .port(config.smtp_port)
                        .credentials(credentials)
                        .build();

                Ok(SmtpTransport {
                    mailer,
                    from_address: config.from_address.clone(),
                })
            })
            .transpose()?;

        Ok(Self {
            transport,
            company: company.to_string(),
        })
    }

    /// A service that only logs messages.
    #[must_use]
    pub fn log_only(company: &str) -> Self {
        Self {
            transport: None,
            company: company.to_string(),
        }
    }

    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    /// Render a customer template.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Template` if rendering fails.
    pub fn render(
        &self,
        template: EmailTemplate,
        customer: &Customer,
        subject: &str,
        message: &str,
    ) -> Result<RenderedEmail, EmailError> {
        let now = Utc::now();
        let ctx = CustomerContext {
            subject,
            company: &self.company,
            year: now.year(),
            first_name: &customer.first_name,
            last_name: &customer.last_name,
            email: customer.email.as_str(),
            message,
            valid_until: (now + Duration::days(7)).format("%d-%m-%Y").to_string(),
        };

        let (html, text) = match template {
            EmailTemplate::Default => (
                DefaultHtml::from(&ctx).render()?,
                DefaultText::from(&ctx).render()?,
            ),
            EmailTemplate::Welcome => (
                WelcomeHtml::from(&ctx).render()?,
                WelcomeText::from(&ctx).render()?,
            ),
            EmailTemplate::OrderConfirmation => (
                OrderConfirmationHtml::from(&ctx).render()?,
                OrderConfirmationText::from(&ctx).render()?,
            ),
            EmailTemplate::Marketing => (
                MarketingHtml::from(&ctx).render()?,
                MarketingText::from(&ctx).render()?,
            ),
            EmailTemplate::ShippingNotification => (
                ShippingNotificationHtml::from(&ctx).render()?,
                ShippingNotificationText::from(&ctx).render()?,
            ),
        };

        Ok(RenderedEmail { html, text })
    }

    /// Send the portal verification link.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or delivery fails.
    pub async fn send_verification(
        &self,
        customer: &Customer,
        link: &str,
    ) -> Result<Delivery, EmailError> {
        let subject = format!("Bevestig je e-mailadres - {}", self.company);
        let body = RenderedEmail {
            html: VerificationHtml {
                subject: &subject,
                company: &self.company,
                year: Utc::now().year(),
                first_name: &customer.first_name,
                link,
            }
            .render()?,
            text: VerificationText {
                first_name: &customer.first_name,
                link,
            }
            .render()?,
        };
        self.send(customer.email.as_str(), &subject, &body).await
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or delivery fails.
    pub async fn send_password_reset(
        &self,
        customer: &Customer,
        link: &str,
    ) -> Result<Delivery, EmailError> {
        let subject = format!("Wachtwoord herstellen - {}", self.company);
        let body = RenderedEmail {
            html: PasswordResetHtml {
                subject: &subject,
                company: &self.company,
                year: Utc::now().year(),
                first_name: &customer.first_name,
                link,
            }
            .render()?,
            text: PasswordResetText {
                first_name: &customer.first_name,
                link,
            }
            .render()?,
        };
        self.send(customer.email.as_str(), &subject, &body).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    ///
    /// # Errors
    ///
    /// Returns error if an address is invalid or SMTP delivery fails.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &RenderedEmail,
    ) -> Result<Delivery, EmailError> {
        let Some(transport) = &self.transport else {
            tracing::info!(to = %to, subject = %subject, "SMTP not configured, email logged only");
            return Ok(Delivery::Logged);
        };

        let email = Message::builder()
            .from(
                transport
                    .from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(transport.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(body.html.clone()),
                    ),
            )?;

        transport.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(Delivery::Sent)
    }
}

// =============================================================================
// Logged customer emails
// =============================================================================

/// Sends customer emails and records each attempt in `email_logs` and the
/// customer's interaction history.
pub struct CustomerMailer<'a> {
    pool: &'a SqlitePool,
    email: &'a EmailService,
}

impl<'a> CustomerMailer<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, email: &'a EmailService) -> Self {
        Self { pool, email }
    }

    /// Render, send and log one message. Delivery failures are recorded with
    /// status `failed` rather than returned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the log or interaction cannot be written.
    pub async fn send(
        &self,
        customer: &Customer,
        template: EmailTemplate,
        subject: &str,
        message: &str,
        sent_by: &str,
    ) -> Result<EmailLog, RepositoryError> {
        let outcome = match self.email.render(template, customer, subject, message) {
            Ok(body) => self.email.send(customer.email.as_str(), subject, &body).await,
            Err(e) => Err(e),
        };

        let (status, error_message) = match outcome {
            Ok(delivery) => (EmailStatus::from(delivery), None),
            Err(e) => {
                tracing::warn!(customer_id = %customer.id, error = %e, "Failed to send customer email");
                (EmailStatus::Failed, Some(e.to_string()))
            }
        };

        let log = EmailLogRepository::new(self.pool)
            .create(&NewEmailLog {
                customer_id: Some(customer.id),
                recipient_email: customer.email.as_str().to_string(),
                subject: subject.to_string(),
                template: template.as_str().to_string(),
                status,
                error_message,
            })
            .await?;

        CustomerRepository::new(self.pool)
            .add_interaction(&NewInteraction {
                customer_id: customer.id,
                interaction_type: InteractionType::Email,
                subject: format!("Email: {subject}"),
                description: Some(format!("Template: {} ({status})", template.as_str())),
                created_by: sent_by.to_string(),
            })
            .await?;

        Ok(log)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use webshop_crm_core::{CustomerId, CustomerStatus, Email};

    fn customer() -> Customer {
        Customer {
            id: CustomerId::new(1),
            webshop_id: None,
            email: Email::parse("jan@shop.nl").unwrap(),
            first_name: "Jan".to_string(),
            last_name: "de Vries".to_string(),
            phone: None,
            address: None,
            city: None,
            postal_code: None,
            country: "Nederland".to_string(),
            date_created: Utc::now(),
            last_order_date: None,
            total_orders: 0,
            total_spent: Decimal::ZERO,
            customer_status: CustomerStatus::Active,
            tags: None,
            notes: None,
            is_verified: false,
            last_login: None,
        }
    }

    #[test]
    fn test_every_template_renders_greeting_and_message() {
        let service = EmailService::log_only("Webshop BV");
        for template in EmailTemplate::ALL {
            let body = service
                .render(*template, &customer(), "Hallo", "Uw pakket komt eraan")
                .unwrap();
            assert!(body.html.contains("Jan"), "{template:?}");
            assert!(body.html.contains("Uw pakket komt eraan"), "{template:?}");
            assert!(body.text.contains("Uw pakket komt eraan"), "{template:?}");
        }
    }

    #[test]
    fn test_html_escapes_message() {
        let service = EmailService::log_only("Webshop BV");
        let body = service
            .render(EmailTemplate::Default, &customer(), "Hi", "<script>x</script>")
            .unwrap();
        assert!(!body.html.contains("<script>"));
        assert!(body.text.contains("<script>"));
    }

    #[test]
    fn test_template_names_match_serde() {
        for template in EmailTemplate::ALL {
            let json = serde_json::to_string(template).unwrap();
            assert_eq!(json, format!("\"{}\"", template.as_str()));
        }
    }

    #[tokio::test]
    async fn test_send_without_smtp_is_logged() {
        let service = EmailService::log_only("Webshop BV");
        assert!(!service.is_configured());
        let body = RenderedEmail {
            html: String::new(),
            text: String::new(),
        };
        let delivery = service.send("jan@shop.nl", "Test", &body).await.unwrap();
        assert_eq!(delivery, Delivery::Logged);
    }
}
