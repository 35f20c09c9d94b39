// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Client for the Tieba web interface, and the deletion categories built on
//! top of it

#![allow(clippy::module_name_repetitions)]

mod category;
mod connection;
mod error;
mod parse;
mod session;
mod token;

pub use self::{
    category::{CategoryKind, TiebaCategory, UnknownCategory},
    connection::TiebaConnection,
    error::{CollectError, SessionError, TokenError},
    session::Session,
    token::TokenRetry,
};
