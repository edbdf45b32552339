//! Status and category enums stored as TEXT columns.
//!
//! Every enum serializes as its snake_case database value and round-trips
//! through `as_str()` / `FromStr`, so request bodies, JSON responses and
//! database rows all share one spelling.

/// Defines a string-backed enum with `as_str`, `Display`, `FromStr` and
/// (with the `sqlite` feature) sqlx TEXT encoding.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $value)] $variant ),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the database / wire representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value),+
                }
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(format!("invalid {}: {s}", $label)),
                }
            }
        }

        #[cfg(feature = "sqlite")]
        impl ::sqlx::Type<::sqlx::Sqlite> for $name {
            fn type_info() -> ::sqlx::sqlite::SqliteTypeInfo {
                <&str as ::sqlx::Type<::sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &::sqlx::sqlite::SqliteTypeInfo) -> bool {
                <&str as ::sqlx::Type<::sqlx::Sqlite>>::compatible(ty)
            }
        }

        #[cfg(feature = "sqlite")]
        impl<'q> ::sqlx::Encode<'q, ::sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut <::sqlx::Sqlite as ::sqlx::Database>::ArgumentBuffer<'q>,
            ) -> Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <&str as ::sqlx::Encode<'q, ::sqlx::Sqlite>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

text_enum! {
    /// Staff role. Admins manage settings and webshops, managers manage
    /// catalogue, costs and campaigns, users work with customers and orders.
    #[derive(Default)]
    UserRole, "user role" {
        Admin => "admin",
        Manager => "manager",
        #[default]
        User => "user",
    }
}

impl UserRole {
    /// Whether the role may perform manager-level mutations.
    #[must_use]
    pub const fn is_manager(&self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }
}

text_enum! {
    /// Lifecycle status of a CRM customer.
    #[derive(Default)]
    CustomerStatus, "customer status" {
        #[default]
        Active => "active",
        Inactive => "inactive",
        Vip => "vip",
        Blocked => "blocked",
    }
}

text_enum! {
    /// Order fulfilment status.
    #[derive(Default)]
    OrderStatus, "order status" {
        #[default]
        Pending => "pending",
        Processing => "processing",
        Shipped => "shipped",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Kind of logged customer contact.
    InteractionType, "interaction type" {
        Email => "email",
        Phone => "phone",
        Chat => "chat",
        Meeting => "meeting",
        Note => "note",
    }
}

text_enum! {
    /// Advertising platform a campaign runs on.
    AdPlatform, "ad platform" {
        Google => "google",
        Meta => "meta",
    }
}

text_enum! {
    #[derive(Default)]
    CampaignStatus, "campaign status" {
        #[default]
        Active => "active",
        Paused => "paused",
        Ended => "ended",
    }
}

text_enum! {
    /// How often a fixed cost is billed.
    #[derive(Default)]
    BillingCycle, "billing cycle" {
        #[default]
        Monthly => "monthly",
        Quarterly => "quarterly",
        Yearly => "yearly",
    }
}

text_enum! {
    #[derive(Default)]
    SubscriptionPlan, "subscription plan" {
        #[default]
        Starter => "starter",
        Professional => "professional",
        Enterprise => "enterprise",
    }
}

text_enum! {
    /// Scope of a tax rule.
    #[derive(Default)]
    TaxScope, "tax scope" {
        #[default]
        All => "all",
        Category => "category",
    }
}

text_enum! {
    /// Delivery outcome recorded in the email log.
    EmailStatus, "email status" {
        Sent => "sent",
        Failed => "failed",
        /// No transport configured; the message was only written to the log.
        Logged => "logged",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_round_trip() {
        for status in OrderStatus::ALL {
            let parsed: OrderStatus = status.as_str().parse().unwrap();
            assert_eq!(&parsed, status);
        }
    }

    #[test]
    fn test_invalid_value_names_the_enum() {
        let err = "archived".parse::<CampaignStatus>().unwrap_err();
        assert_eq!(err, "invalid campaign status: archived");
    }

    #[test]
    fn test_serde_uses_database_spelling() {
        assert_eq!(serde_json::to_string(&CustomerStatus::Vip).unwrap(), "\"vip\"");
        let cycle: BillingCycle = serde_json::from_str("\"quarterly\"").unwrap();
        assert_eq!(cycle, BillingCycle::Quarterly);
    }

    #[test]
    fn test_manager_roles() {
        assert!(UserRole::Admin.is_manager());
        assert!(UserRole::Manager.is_manager());
        assert!(!UserRole::User.is_manager());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(SubscriptionPlan::default(), SubscriptionPlan::Starter);
        assert_eq!(UserRole::default(), UserRole::User);
    }
}
