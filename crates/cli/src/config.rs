use anyhow::{Context, Result};
use chrono::NaiveDate;

pub use housekeep_core::config::*;
use housekeep_core::dates::{self, parse_date_spec};
use housekeep_core::household::{Household, Session};

use crate::cli::Cli;

/// Everything a command needs: resolved paths, who is acting, and for which day.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub config: AppConfig,
    pub session: Session,
    pub today: NaiveDate,
}

pub fn from_cli(cli: &Cli) -> Result<AppConfig> {
    AppConfig::discover(cli.data_dir.clone())
}

pub fn invocation(cli: &Cli) -> Result<Invocation> {
    let config = from_cli(cli)?;
    let session = resolve_session(config.household(), cli.user.as_deref())?;
    let today = match &cli.date {
        Some(spec) => parse_date_spec(spec, dates::today())
            .with_context(|| format!("Invalid --date value '{}'", spec))?,
        None => dates::today(),
    };
    Ok(Invocation {
        config,
        session,
        today,
    })
}

/// Session for `email`, or for the first admin on the roster when no email is given.
pub fn resolve_session(household: &Household, email: Option<&str>) -> Result<Session> {
    let uid = format!("cli:{}", email.unwrap_or("default").trim().to_ascii_lowercase());
    Ok(household.session_or_first_admin(&uid, email)?)
}
