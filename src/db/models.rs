mod user;

pub use user::*;

use super::schema::EntityDescriptor;

/// Every entity reconciled at startup, in reconciliation order.
pub fn entities() -> Vec<EntityDescriptor> {
    vec![User::descriptor()]
}
