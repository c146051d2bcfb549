pub mod affiliate;
pub mod contact;
pub mod funnel;
pub mod merchant;
pub mod order;
pub mod provider_credentials;
pub mod visit;

pub use affiliate::Entity as Affiliate;
pub use contact::Entity as Contact;
pub use funnel::Entity as Funnel;
pub use merchant::Entity as Merchant;
pub use order::Entity as Order;
pub use provider_credentials::Entity as ProviderCredentials;
pub use visit::Entity as Visit;
