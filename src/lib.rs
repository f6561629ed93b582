//! # qSDK: a Quick/Quaint/Quality application state machine for BFT chains
//!
//! - In short, qSDK is the part of a blockchain node that sits behind the consensus engine: it
//!   receives serialized transactions and block lifecycle events, applies them deterministically to
//!   versioned key-value state, and answers with result codes, tags and the new state root.
//!
//! - Many nodes run identical copies of this state machine, so every state transition must be
//!   reproducible byte for byte. Any divergence is a fork.
//!
//! # Overview
//! The crate is split into modules that can be used on their own:
//!
//! - [store]: named key-value sub-stores, copy-on-write caches for atomic transactions and
//!   committed versions with Merkle proofs.
//! - [router] and [codec]: the dispatch table from route names to handlers, and the registry that
//!   decodes polymorphic messages by their wire tag.
//! - [auth]: accounts and the ante stage (signatures, sequences, fees) that gates every message.
//! - [bank]: coin balances and atomic multi-input/multi-output transfers.
//! - [stake] and [slashing]: validator bonding, the power ranking that derives the consensus
//!   validator set, and the penalties for downtime and double signing.
//! - [app]: [app::BaseApp], which wires all of the above and drives it through
//!   `InitChain`, `BeginBlock`, `CheckTx`/`DeliverTx`, `EndBlock`, `Commit` and `Query`.
//!
//! Running a chain takes only a few steps:
//!
//! - Build the application with [BaseApp::new](app/struct.BaseApp.html#method.new).
//! - Load the genesis with [BaseApp::init_chain](app/struct.BaseApp.html#method.init_chain).
//! - For every block, call `begin_block`, `deliver_tx` for each transaction, `end_block` and
//!   `commit`.
//!
//! # On the Data Flow
//! Each transaction goes through the same read-modify-write loop:
//!
//! ```notrust
//!     tx bytes --decode--> StdTx --validate_basic--> [ ante stage ] --route--> [ handler ]
//!                                                        |                         |
//!                                                 <CacheMultiStore>       <CacheMultiStore>
//!                                                        |      ^-----write()------'
//!                                                        |        (on success only)
//!                                                   write()
//!                                           (whenever the ante stage passes)
//!                                                        v
//!                                       [ check state | deliver working state ]
//!                                                        |
//!                                                     commit()
//!                                                        v
//!                                          [ Snapshot (immutable, Arc) ] <== Querier
//! ```
//!
//! A failed handler leaves nothing behind but the sequence bump and the fee charged by the ante
//! stage. A failed ante stage leaves nothing at all.

#[macro_use] extern crate num_derive;

#[macro_use]
pub mod common;
pub mod app;
pub mod auth;
pub mod bank;
pub mod codec;
pub mod coin;
pub mod context;
pub mod crypto;
pub mod error;
pub mod params;
pub mod rat;
pub mod router;
pub mod slashing;
pub mod stake;
pub mod store;
pub mod tx;

pub use app::BaseApp;
pub use error::{Error, Result};
