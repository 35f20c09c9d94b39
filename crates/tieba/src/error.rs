// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use thiserror::Error;

/// Errors while listing the entities of a page
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to fetch the listing page")]
    Http(#[from] reqwest::Error),

    #[error("invalid listing URL")]
    InvalidUrl(#[from] url::ParseError),

    /// The page lists entities, but the token needed to act on them could not
    /// be found
    #[error("the listing page has entries but no anti-forgery token")]
    MissingToken,

    /// An element looked like an entry, but the ids needed to delete it are
    /// missing
    #[error("a {category} entry could not be parsed: {snippet}")]
    MalformedEntry {
        category: &'static str,
        snippet: String,
    },
}

/// Errors while setting up or checking the session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("the cookie does not contain any name=value pair")]
    Empty,

    #[error("the cookie contains characters which can't be sent in a header")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("the session is not logged in anymore, a fresh cookie is needed")]
    Expired,

    #[error("failed to reach the service to check the session")]
    Http(#[source] reqwest::Error),

    #[error("invalid session check URL")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors while fetching the anti-forgery token
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to fetch the anti-forgery token")]
    Request(#[from] reqwest::Error),

    #[error("invalid anti-forgery token URL")]
    InvalidUrl(#[from] url::ParseError),

    #[error("the service returned an empty anti-forgery token")]
    Empty,

    #[error("gave up fetching the anti-forgery token after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<TokenError>,
    },
}
