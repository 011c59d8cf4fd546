//! # attachvault-oauth
//!
//! `OAuth2` credentials for the Gmail and Drive REST clients.
//!
//! An [`InstalledApp`] hands out bearer tokens: from the `token.json`
//! cache while they have enough lifetime left, through a refresh grant
//! when they do not, and through the browser consent flow (PKCE, loopback
//! redirect) when there is nothing to refresh.
//!
//! ```ignore
//! use attachvault_oauth::{ClientSecret, InstalledApp};
//!
//! let secret = ClientSecret::from_file("client_secret.json".as_ref())?;
//! let app = InstalledApp::new(secret.client()?, Vec::new(), "token.json");
//! let token = app.token(|url| println!("Visit: {url}")).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod installed;
mod loopback;
mod secret;
mod token;

pub use client::{ConsentRequest, OAuthClient};
pub use error::{Error, Result};
pub use installed::{DRIVE_FILE_SCOPE, GMAIL_READONLY_SCOPE, InstalledApp, REFRESH_MARGIN};
pub use secret::ClientSecret;
pub use token::Token;
