// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Extraction of entities from listing pages
//!
//! Everything here is synchronous: [`Html`] is not `Send`, so documents must
//! never be held across an await point.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use sweep_engine::Entity;
use tracing::debug;

use crate::{CategoryKind, CollectError};

static THREAD_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.thread_title").unwrap());
static REPLY_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a.b_reply").unwrap());
static FORUM_SPAN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span[balvid]").unwrap());
static UNFOLLOW_BUTTON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input.btn_unfollow").unwrap());
static FOLLOW_BUTTON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input.btn_follow").unwrap());

static THREAD_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/([0-9]+)").unwrap());
static POST_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"pid=([0-9]+)").unwrap());
static COMMENT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"cid=([0-9]+)").unwrap());
// The fans page carries its own, shorter, token in an inline script
static PAGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tbs : '([0-9a-zA-Z]{16})'").unwrap());

fn first_capture<'a>(regex: &Regex, haystack: &'a str) -> Option<&'a str> {
    regex
        .captures(haystack)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

fn attr<'a>(element: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    element.value().attr(name)
}

/// The markup of an entry which matched but could not be turned into an
/// entity, shortened for the error message
fn malformed(kind: CategoryKind, element: &ElementRef<'_>) -> CollectError {
    const MAX_SNIPPET: usize = 200;

    let mut snippet = element.html();
    if snippet.len() > MAX_SNIPPET {
        let mut cut = MAX_SNIPPET;
        while !snippet.is_char_boundary(cut) {
            cut -= 1;
        }
        snippet.truncate(cut);
        snippet.push('…');
    }

    CollectError::MalformedEntry {
        category: kind.name(),
        snippet,
    }
}

/// Extract the entities listed on a page of the given category
///
/// An element which looks like an entry but lacks the ids needed to delete
/// it fails the whole page, so that a change in the markup is never mistaken
/// for an empty listing.
pub(crate) fn entities(kind: CategoryKind, html: &str) -> Result<Vec<Entity>, CollectError> {
    let document = Html::parse_document(html);

    match kind {
        CategoryKind::Thread => threads(&document),
        CategoryKind::Reply => replies(&document),
        CategoryKind::FollowedBa => Ok(followed_forums(&document)),
        CategoryKind::Concern => followed_users(&document),
        CategoryKind::Fan => fans(&document, html),
    }
}

fn threads(document: &Html) -> Result<Vec<Entity>, CollectError> {
    document
        .select(&THREAD_LINK)
        .map(|link| {
            let href = attr(&link, "href");
            let tid = href.and_then(|href| first_capture(&THREAD_ID, href));
            let pid = href.and_then(|href| first_capture(&POST_ID, href));

            match (tid, pid) {
                (Some(tid), Some(pid)) => Ok(Entity::new().with("tid", tid).with("pid", pid)),
                _ => Err(malformed(CategoryKind::Thread, &link)),
            }
        })
        .collect()
}

fn replies(document: &Html) -> Result<Vec<Entity>, CollectError> {
    document
        .select(&REPLY_LINK)
        // Only links to a post are replies, the rest point at forums or users
        .filter_map(|link| {
            let href = attr(&link, "href")?;
            href.contains("pid").then_some((link, href))
        })
        .map(|(link, href)| {
            let tid = first_capture(&THREAD_ID, href);
            // A non-zero cid points at a comment inside a floor, which is
            // what actually needs deleting
            let pid = match first_capture(&COMMENT_ID, href) {
                Some(cid) if cid != "0" => Some(cid),
                _ => first_capture(&POST_ID, href),
            };

            match (tid, pid) {
                (Some(tid), Some(pid)) => Ok(Entity::new().with("tid", tid).with("pid", pid)),
                _ => Err(malformed(CategoryKind::Reply, &link)),
            }
        })
        .collect()
}

fn followed_forums(document: &Html) -> Vec<Entity> {
    // The selector only matches spans carrying a `balvid`
    document
        .select(&FORUM_SPAN)
        .filter_map(|span| {
            let mut entity = Entity::new().with("fid", attr(&span, "balvid")?);
            if let Some(tbs) = attr(&span, "tbs") {
                entity.insert("tbs", tbs);
            }
            if let Some(name) = attr(&span, "balvname") {
                entity.insert("fname", name);
            }
            Some(entity)
        })
        .collect()
}

fn followed_users(document: &Html) -> Result<Vec<Entity>, CollectError> {
    document
        .select(&UNFOLLOW_BUTTON)
        .map(|button| {
            let portrait =
                attr(&button, "portrait").ok_or_else(|| malformed(CategoryKind::Concern, &button))?;

            let mut entity = Entity::new().with("cmd", "unfollow");
            if let Some(tbs) = attr(&button, "tbs") {
                entity.insert("tbs", tbs);
            }
            entity.insert("id", portrait);
            Ok(entity)
        })
        .collect()
}

fn fans(document: &Html, html: &str) -> Result<Vec<Entity>, CollectError> {
    let portraits = document
        .select(&FOLLOW_BUTTON)
        .map(|button| {
            attr(&button, "portrait").ok_or_else(|| malformed(CategoryKind::Fan, &button))
        })
        .collect::<Result<Vec<&str>, _>>()?;

    if portraits.is_empty() {
        return Ok(Vec::new());
    }

    let Some(token) = first_capture(&PAGE_TOKEN, html) else {
        debug!(fans = portraits.len(), "Fans page without a page token");
        return Err(CollectError::MissingToken);
    };

    Ok(portraits
        .into_iter()
        .map(|portrait| {
            Entity::new()
                .with("cmd", "add_black_list")
                .with("tbs", token)
                .with("portrait", portrait)
        })
        .collect())
}
