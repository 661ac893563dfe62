//! Command implementations. Every view prints as pretty JSON, matching
//! the shapes the engine's view types serialize to.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use tracker_common::{Faction, ResolvedAgent, SubmitBatch, TrendPeriod};
use tracker_engine::{AgentSession, EngineError, StatEngine};

pub fn resolve<'e>(engine: &'e StatEngine, token: &str) -> Result<AgentSession<'e>> {
    match engine.resolve_by_credential(token)? {
        ResolvedAgent::Valid(identity) => Ok(engine.session(identity)),
        ResolvedAgent::Invalid => bail!("credential does not resolve to an agent"),
    }
}

pub fn register(engine: &StatEngine, name: &str, faction: &str, email: &str) -> Result<()> {
    let faction = Faction::from_letter(faction)
        .with_context(|| format!("faction must be E or R, got '{faction}'"))?;
    engine.store().add_agent(name, faction, email)?;

    let session = match engine.resolve_by_principal(email)? {
        ResolvedAgent::Valid(identity) => engine.session(identity),
        // a fresh agent has no token yet; issue the web token directly
        ResolvedAgent::Invalid => {
            tracker_engine::tokens::create_token(engine.store(), name, tracker_engine::tokens::WEB_TOKEN)?;
            match engine.resolve_by_principal(email)? {
                ResolvedAgent::Valid(identity) => engine.session(identity),
                ResolvedAgent::Invalid => bail!("registration did not produce a usable agent"),
            }
        }
    };

    print_json(&json!({
        "name": session.name(),
        "faction": session.faction(),
        "token": session.identity().token(),
    }))
}

pub fn stat_catalog(engine: &StatEngine) -> Result<()> {
    print_json(&engine.store().stat_catalog()?)
}

pub fn agent(session: &mut AgentSession<'_>) -> Result<()> {
    let level = session.level(false)?;
    let stats = session.stats(None, false)?;
    let update_time = session.update_timestamp(None, false)?;
    print_json(&json!({
        "name": session.name(),
        "faction": session.faction(),
        "level": level,
        "stats": stats,
        "update_time": update_time,
    }))
}

pub fn badges(session: &mut AgentSession<'_>) -> Result<()> {
    let badges = session.badges(None, false)?;
    print_json(&badges)
}

pub fn upcoming_badges(session: &mut AgentSession<'_>, limit: usize) -> Result<()> {
    let upcoming = session.upcoming_badges(limit, false)?;
    print_json(&upcoming)
}

pub fn ratios(session: &mut AgentSession<'_>) -> Result<()> {
    let ratios = session.ratios(false)?;
    print_json(&ratios)
}

pub fn breakdown(session: &AgentSession<'_>) -> Result<()> {
    print_json(&session.breakdown()?)
}

pub fn prediction(session: &AgentSession<'_>, stat: &str) -> Result<()> {
    print_json(&session.prediction(stat)?)
}

pub fn graph(session: &AgentSession<'_>, stat: &str) -> Result<()> {
    print_json(&session.graph(stat)?)
}

pub fn trend(session: &AgentSession<'_>, stat: &str, when: &str) -> Result<()> {
    print_json(&session.trend(stat, TrendPeriod::parse(when))?)
}

pub fn submit(
    session: &mut AgentSession<'_>,
    date: Option<NaiveDate>,
    allow_lower: bool,
    values: &[String],
) -> Result<()> {
    let mut batch = SubmitBatch {
        date,
        ..Default::default()
    };
    for pair in values {
        let Some((stat, raw)) = pair.split_once('=') else {
            bail!("'{pair}' is not a KEY=VALUE pair");
        };
        batch.set(stat, raw);
    }

    match session.submit(&batch, allow_lower) {
        Ok(()) => print_json(&json!({ "ok": true, "stats": batch.values.len() })),
        // actionable: show the human message, not a stack of causes
        Err(EngineError::Monotonicity(violation)) => bail!("{violation}"),
        Err(other) => Err(other.into()),
    }
}

pub fn token_list(session: &mut AgentSession<'_>) -> Result<()> {
    let labels = session.token_labels(false)?;
    print_json(&labels)
}

pub fn token_create(session: &mut AgentSession<'_>, label: &str) -> Result<()> {
    match session.create_token(label)? {
        Some(secret) => print_json(&json!({ "label": label.to_uppercase(), "token": secret })),
        None => bail!("a live token named '{}' already exists", label.to_uppercase()),
    }
}

pub fn token_revoke(session: &mut AgentSession<'_>, label: &str) -> Result<()> {
    if !session.revoke_token(label)? {
        bail!("no live token named '{}'", label.to_uppercase());
    }
    print_json(&json!({ "revoked": label.to_uppercase() }))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
