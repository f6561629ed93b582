use serde::Deserialize;
use serde_json::Value;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::params::SlashingParams;
use crate::router::{Handler, HandlerResult, InitGenesis, Tag};
use crate::slashing::keeper::{get_signing_info, set_params};
use crate::slashing::msgs::*;
use crate::stake::keeper as stake;
use crate::store::MultiStore;
use crate::tx::Msg;

pub fn new_handler() -> Handler {
    Box::new(|ctx: &Context, store: &mut dyn MultiStore, msg: &Msg| {
        match msg {
            Msg::Unrevoke(m) => handle_unrevoke(ctx, store, m),
            _ => Err(Error::UnknownRequest(format!(
                "unrecognized slashing msg type {}",
                msg.type_tag()
            ))),
        }
    })
}

fn handle_unrevoke(
    ctx: &Context, store: &mut dyn MultiStore, msg: &MsgUnrevoke,
) -> Result<HandlerResult> {
    let v = stake::get_validator(store, &msg.address).ok_or_else(|| {
        slashing_err(
            CODE_INVALID_VALIDATOR,
            "that address is not associated with any known validator".into(),
        )
    })?;
    if !v.revoked {
        return Err(slashing_err(
            CODE_VALIDATOR_NOT_REVOKED,
            "validator is not revoked".into(),
        ))
    }
    // no record: revoked without a liveness fault
    let jailed_until = get_signing_info(store, &v.pub_key.address())
        .map(|i| i.jailed_until)
        .unwrap_or(0);
    if ctx.block_time() < jailed_until {
        return Err(slashing_err(
            CODE_VALIDATOR_JAILED,
            format!("validator jailed until {}", jailed_until),
        ))
    }
    stake::unrevoke(ctx, store, &v.pub_key)?;
    Ok(HandlerResult::with_tags(vec![
        Tag::new("action", "unrevoke"),
        Tag::new("validator", &msg.address),
    ]))
}

#[derive(Deserialize)]
struct GenesisState {
    #[serde(default)]
    params: SlashingParams,
}

pub fn init_genesis(
    ctx: &Context, store: &mut dyn MultiStore, data: &Value,
) -> Result<()> {
    let state: GenesisState = serde_json::from_value(data.clone())
        .map_err(|e| Error::GenesisParse(format!("slashing: {}", e)))?;
    if !state.params.is_valid() {
        return Err(Error::GenesisParse(format!(
            "slashing: invalid params {:?}",
            state.params
        )))
    }
    set_params(store, &state.params);
    ctx.logger().info(format_args!("slashing genesis loaded"));
    Ok(())
}

pub fn genesis_initializer() -> InitGenesis {
    Box::new(init_genesis)
}
