pub mod auth;
pub mod catalog;
pub mod coordinator;
pub mod events;
pub mod http;

pub use auth::{AuthClient, AuthError, DeviceContext, TokenGrant};
pub use catalog::{CatalogClient, CatalogError, NewCategory};
pub use coordinator::{RefreshCoordinator, RefreshFailure, RefreshLease, RefreshTicket, RefreshWait};
pub use events::{
    parse_kind_list, LogoutReason, SessionEvent, SessionEventFilter, SessionEventKind,
    SessionEvents,
};
pub use http::{ApiRequest, AuthenticatedClient, ClientError};
