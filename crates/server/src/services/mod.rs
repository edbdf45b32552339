//! Business logic services.
//!
//! # Services
//!
//! - `ads` - Google Ads and Meta campaign sync
//! - `auth` - Staff and customer authentication (argon2 + JWT)
//! - `carrier` - DHL shipments, live or simulated
//! - `email` - Customer email rendering and SMTP delivery
//! - `fulfillment` - Shipping labels and packing slips
//! - `insights` - Rule-based product, customer and business recommendations
//! - `integrations` - Stored third-party credentials
//! - `oauth` - Connecting Google Ads and Meta accounts through OAuth
//! - `pricing` - Shipping quotes and tax calculation
//! - `profit` - Profit analysis and fixed cost allocation

pub mod ads;
pub mod auth;
pub mod carrier;
pub mod email;
pub mod fulfillment;
pub mod insights;
pub mod integrations;
pub mod oauth;
pub mod pricing;
pub mod profit;

pub use auth::{AuthError, Claims, CustomerAuthService, StaffAuthService, TokenKeys, TokenKind};
pub use carrier::{Carrier, CarrierError, Dhl};
pub use email::{CustomerMailer, EmailError, EmailService, EmailTemplate};
pub use fulfillment::FulfillmentService;
pub use insights::InsightService;
pub use integrations::{Credentials, IntegrationSettings, Platform};
pub use oauth::{OAuthClient, OAuthProvider};
pub use pricing::PricingService;
pub use profit::ProfitService;
