pub mod blob;
pub mod capture;
pub mod checklist;
pub mod config;
pub mod database;
pub mod dates;
pub mod error;
pub mod feed;
pub mod grouping;
pub mod household;
pub mod model;
pub mod parser;
pub mod services;
pub mod stats;
pub mod store;
pub mod suggest;
pub mod view;
pub mod visibility;

pub use capture::TaskInput;
pub use config::{AppConfig, SuggestionEndpoint};
pub use database::Database;
pub use error::ValidationError;
pub use feed::{Snapshot, Subscription};
pub use household::{Household, Member, Session, SessionError};
pub use model::*;
pub use services::ledger::Receipt;
pub use services::tasks::PhotoTarget;
pub use services::{LedgerService, TasksService};
pub use view::{Action, Modal, ViewState};
