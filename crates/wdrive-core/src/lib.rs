//! # wdrive-core
//!
//! Client core for driving iOS UI automation through a WebDriverAgent
//! server.
//!
//! The server speaks JSON over HTTP. This crate owns the parts of that
//! conversation that have to be right for automation to be reliable:
//! keeping a session alive across server restarts, waiting for elements to
//! appear, and recovering element handles after the UI re-renders.
//!
//! ## Modules
//!
//! - [`client`] - The [`Client`](client::Client) facade: lookups, gestures, apps, device
//! - [`session`] - Session creation, adoption, and invalidation
//! - [`resolver`] - Single- and multi-element lookups with polling
//! - [`element`] - Element handles and stale-reference recovery
//! - [`locator`] - Locator strategies and their wire encoding
//! - [`policy`] - Bounded retry and deadlines
//! - [`transport`] - Request descriptors, in-band sentinels, HTTP transport
//! - [`config`] - Client configuration, persisted under `~/.wdrive`
//! - [`error`] - Error taxonomy with retryable/fatal disposition
//! - [`geometry`], [`screenshot`], [`types`] - Value types
//!
//! ## Example
//!
//! ```no_run
//! use wdrive_core::client::Client;
//! use wdrive_core::config::ClientConfig;
//! use wdrive_core::locator::Locator;
//!
//! # async fn example() -> wdrive_core::error::Result<()> {
//! let client = Client::connect(ClientConfig::load()).await?;
//!
//! let mut button = client.find_element(&Locator::accessibility_id("login-button")).await?;
//! button.click().await?;
//!
//! for cell in client.find_elements(&Locator::class_name("XCUIElementTypeCell")).await? {
//!     println!("cell {} -> {}", cell.index(), cell.id());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod element;
pub mod error;
pub mod geometry;
pub mod locator;
pub mod policy;
pub mod resolver;
pub mod screenshot;
pub mod session;
pub mod transport;
pub mod types;

pub use client::Client;
pub use config::ClientConfig;
pub use element::{ElementHandle, ElementState};
pub use error::{Error, Result};
pub use locator::{Locator, Strategy};
