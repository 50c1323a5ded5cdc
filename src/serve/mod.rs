// src/serve/mod.rs

//! Dev server and live reload.

pub mod hub;
pub mod proxy;
pub mod server;

pub use hub::{ReloadEvent, ReloadHub, ReloadKind};
pub use proxy::{Proxy, ProxyError, Upstream};
pub use server::{Origin, router, serve};
