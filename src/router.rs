//! Dispatch table from route names to message handlers and genesis initializers.

use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::store::{CacheMultiStore, MultiStore};
use crate::tx::Msg;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new<V: ToString>(key: &str, value: V) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// What a handler reports on success.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandlerResult {
    pub data: Vec<u8>,
    pub log: String,
    pub tags: Vec<Tag>,
}

impl HandlerResult {
    pub fn with_tags(tags: Vec<Tag>) -> Self {
        Self {
            tags,
            ..Default::default()
        }
    }
}

pub type Handler = Box<
    dyn Fn(&Context, &mut dyn MultiStore, &Msg) -> Result<HandlerResult>
        + Send
        + Sync,
>;

pub type InitGenesis =
    Box<dyn Fn(&Context, &mut dyn MultiStore, &Value) -> Result<()> + Send + Sync>;

struct Route {
    name: String,
    handler: Handler,
    init_genesis: Option<InitGenesis>,
}

/// Ordered route table. Registration happens once while the application is built; a name may be
/// registered only once.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

fn is_alpha(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphabetic())
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(
        &mut self, name: &str, handler: Handler,
        init_genesis: Option<InitGenesis>,
    ) -> Result<&mut Self> {
        if !is_alpha(name) {
            return Err(Error::Configuration(format!(
                "route {:?} must consist of letters only",
                name
            )))
        }
        if self.routes.iter().any(|r| r.name == name) {
            return Err(Error::Configuration(format!(
                "route {} is already registered",
                name
            )))
        }
        self.routes.push(Route {
            name: name.into(),
            handler,
            init_genesis,
        });
        Ok(self)
    }

    /// `None` means no route; callers report `UnknownRequest`.
    pub fn route(&self, name: &str) -> Option<&Handler> {
        self.routes.iter().find(|r| r.name == name).map(|r| &r.handler)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.name.as_str())
    }

    /// Run every registered genesis initializer, in registration order, with its entry of
    /// `data`. Either all of them apply or none does.
    pub fn init_genesis(
        &self, ctx: &Context, store: &mut dyn MultiStore,
        data: &Map<String, Value>,
    ) -> Result<()> {
        let mut cache = CacheMultiStore::new(store);
        for r in &self.routes {
            let init = match &r.init_genesis {
                Some(i) => i,
                None => continue,
            };
            let entry = data.get(&r.name).ok_or_else(|| {
                Error::GenesisParse(format!(
                    "expected module genesis information for module {} but it was not present",
                    r.name
                ))
            })?;
            init(&ctx.with_module(&r.name), &mut cache, entry)?;
        }
        cache.write();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop() -> Handler {
        Box::new(|_: &Context, _: &mut dyn MultiStore, _: &Msg| {
            Ok(HandlerResult::default())
        })
    }

    #[test]
    fn test_route_names() {
        let mut r = Router::new();
        assert!(r.add_route("bank", nop(), None).is_ok());
        for bad in ["bank2", "ba/nk", "", "stake-x"] {
            match r.add_route(bad, nop(), None) {
                Err(Error::Configuration(_)) => (),
                _ => panic!("{} accepted", bad),
            }
        }
        assert!(matches!(
            r.add_route("bank", nop(), None),
            Err(Error::Configuration(_))
        ));
        assert!(r.route("bank").is_some());
        assert!(r.route("stake").is_none());
    }
}
