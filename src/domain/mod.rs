pub mod billing;
pub mod campaign;
pub mod contact;
pub mod promotion;
pub mod user;

pub use billing::{
  format_amount, Payment, PaymentMethod, PaymentStatus, Plan, Subscription, SubscriptionStatus,
  FREE_PLAN_ID,
};
pub use campaign::{Campaign, CampaignStatus, MessageLog, MessageStatus};
pub use contact::Contact;
pub use promotion::Promotion;
pub use user::{Region, Role, User};
