//! Base business models: companies, partners, users and their groups,
//! countries and currencies.

pub mod company;
pub mod currency;
pub mod partner;
pub mod user;

use std::path::PathBuf;

use hexya_orm::Registry;
use tracing::debug;

/// Register the base models.
pub fn register(reg: &mut Registry) {
    reg.add_model(currency::currency_model());
    reg.add_model(currency::currency_rate_model());
    reg.add_model(currency::country_model());
    reg.add_model(company::company_model());
    reg.add_model(partner::partner_model());
    reg.add_model(user::group_model());
    reg.add_model(user::user_model());
    debug!("base models registered");
}

/// Directory of the seed files shipped with this module: the main
/// company, the administrator, countries and currencies.
pub fn seed_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}
